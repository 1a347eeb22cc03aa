use crate::{bool_label, ResourceCollector};
use async_trait::async_trait;
use nbmon_api::{DnsSettings, NameserverGroup, NetBirdClient};
use prometheus::core::Collector as PromCollector;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collector for the DNS surface: nameserver groups and account-wide DNS
/// settings. The two fetches succeed or fail independently.
pub struct DnsCollector {
    client: Arc<NetBirdClient>,
    cycle: Mutex<()>,

    groups_total: IntGaugeVec,
    groups_enabled: IntGaugeVec,
    groups_primary: IntGaugeVec,
    group_domains: IntGaugeVec,
    nameservers: IntGaugeVec,
    nameservers_by_type: IntGaugeVec,
    nameservers_by_port: IntGaugeVec,
    management_disabled: IntGaugeVec,
    scrape_errors: IntCounterVec,
    scrape_duration: Histogram,
}

impl DnsCollector {
    pub fn new(client: Arc<NetBirdClient>) -> prometheus::Result<Self> {
        Ok(Self {
            client,
            cycle: Mutex::new(()),

            groups_total: IntGaugeVec::new(
                Opts::new(
                    "netbird_dns_nameserver_groups",
                    "Total number of NetBird nameserver groups",
                ),
                &[],
            )?,
            groups_enabled: IntGaugeVec::new(
                Opts::new(
                    "netbird_dns_nameserver_groups_enabled",
                    "Number of enabled NetBird nameserver groups",
                ),
                &["enabled"],
            )?,
            groups_primary: IntGaugeVec::new(
                Opts::new(
                    "netbird_dns_nameserver_groups_primary",
                    "Number of primary NetBird nameserver groups",
                ),
                &["primary"],
            )?,
            group_domains: IntGaugeVec::new(
                Opts::new(
                    "netbird_dns_nameserver_group_domains_count",
                    "Number of domains configured in each nameserver group",
                ),
                &["group_id", "group_name"],
            )?,
            nameservers: IntGaugeVec::new(
                Opts::new(
                    "netbird_dns_nameservers",
                    "Number of nameservers in each nameserver group",
                ),
                &["group_id", "group_name"],
            )?,
            nameservers_by_type: IntGaugeVec::new(
                Opts::new(
                    "netbird_dns_nameservers_by_type",
                    "Number of nameservers by type (UDP/TCP)",
                ),
                &["ns_type"],
            )?,
            nameservers_by_port: IntGaugeVec::new(
                Opts::new(
                    "netbird_dns_nameservers_by_port",
                    "Number of nameservers by port",
                ),
                &["port"],
            )?,
            management_disabled: IntGaugeVec::new(
                Opts::new(
                    "netbird_dns_management_disabled_groups_count",
                    "Number of groups with DNS management disabled",
                ),
                &[],
            )?,
            scrape_errors: IntCounterVec::new(
                Opts::new(
                    "netbird_dns_scrape_errors_total",
                    "Total number of errors encountered while scraping DNS data",
                ),
                &["error_type"],
            )?,
            scrape_duration: Histogram::with_opts(HistogramOpts::new(
                "netbird_dns_scrape_duration_seconds",
                "Time spent scraping DNS data from the NetBird API",
            ))?,
        })
    }

    fn gauges(&self) -> [&IntGaugeVec; 8] {
        [
            &self.groups_total,
            &self.groups_enabled,
            &self.groups_primary,
            &self.group_domains,
            &self.nameservers,
            &self.nameservers_by_type,
            &self.nameservers_by_port,
            &self.management_disabled,
        ]
    }

    fn reset(&self) {
        for gauge in self.gauges() {
            gauge.reset();
        }
    }

    fn fold_nameserver_groups(&self, groups: &[NameserverGroup]) {
        let mut enabled_counts: HashMap<bool, i64> = HashMap::new();
        let mut primary_counts: HashMap<bool, i64> = HashMap::new();
        // Type and port tallies are deliberately global across all groups,
        // not scoped per group.
        let mut type_counts: HashMap<String, i64> = HashMap::new();
        let mut port_counts: HashMap<u16, i64> = HashMap::new();

        for group in groups {
            *enabled_counts.entry(group.enabled).or_default() += 1;
            *primary_counts.entry(group.primary).or_default() += 1;

            let group_labels = [group.id.as_str(), group.name.as_str()];
            self.group_domains
                .with_label_values(&group_labels)
                .set(group.domains.len() as i64);
            self.nameservers
                .with_label_values(&group_labels)
                .set(group.nameservers.len() as i64);

            for nameserver in &group.nameservers {
                *type_counts.entry(nameserver.ns_type.clone()).or_default() += 1;
                *port_counts.entry(nameserver.port).or_default() += 1;
            }
        }

        self.groups_total
            .with_label_values(&[])
            .set(groups.len() as i64);
        for (value, count) in enabled_counts {
            self.groups_enabled
                .with_label_values(&[bool_label(value)])
                .set(count);
        }
        for (value, count) in primary_counts {
            self.groups_primary
                .with_label_values(&[bool_label(value)])
                .set(count);
        }
        for (ns_type, count) in type_counts {
            self.nameservers_by_type
                .with_label_values(&[&ns_type])
                .set(count);
        }
        for (port, count) in port_counts {
            self.nameservers_by_port
                .with_label_values(&[&port.to_string()])
                .set(count);
        }

        tracing::debug!(total = groups.len(), "Updated nameserver metrics");
    }

    fn fold_settings(&self, settings: &DnsSettings) {
        let disabled = settings.items.disabled_management_groups.len() as i64;
        self.management_disabled.with_label_values(&[]).set(disabled);

        tracing::debug!(
            disabled_management_groups = disabled,
            "Updated DNS settings metrics"
        );
    }
}

#[async_trait]
impl ResourceCollector for DnsCollector {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn instruments(&self) -> Vec<Box<dyn PromCollector>> {
        let mut instruments: Vec<Box<dyn PromCollector>> = self
            .gauges()
            .iter()
            .map(|gauge| Box::new((*gauge).clone()) as Box<dyn PromCollector>)
            .collect();
        instruments.push(Box::new(self.scrape_errors.clone()));
        instruments.push(Box::new(self.scrape_duration.clone()));
        instruments
    }

    async fn collect(&self) {
        let _cycle = self.cycle.lock().await;
        let timer = self.scrape_duration.start_timer();
        self.reset();

        match self.client.list_nameserver_groups().await {
            Ok(groups) => self.fold_nameserver_groups(&groups),
            Err(err) => {
                tracing::error!(error = %err, "Failed to fetch nameserver groups");
                self.scrape_errors
                    .with_label_values(&["fetch_nameserver_groups"])
                    .inc();
            }
        }

        match self.client.dns_settings().await {
            Ok(settings) => self.fold_settings(&settings),
            Err(err) => {
                tracing::error!(error = %err, "Failed to fetch DNS settings");
                self.scrape_errors
                    .with_label_values(&["fetch_dns_settings"])
                    .inc();
            }
        }

        timer.observe_duration();
    }
}
