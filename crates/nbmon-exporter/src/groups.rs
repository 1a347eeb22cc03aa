use crate::{ResourceCollector, UNKNOWN};
use async_trait::async_trait;
use nbmon_api::{Group, NetBirdClient};
use prometheus::core::Collector as PromCollector;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collector for `GET /api/groups`.
pub struct GroupsCollector {
    client: Arc<NetBirdClient>,
    cycle: Mutex<()>,

    total: IntGaugeVec,
    peers_count: IntGaugeVec,
    resources_count: IntGaugeVec,
    info: IntGaugeVec,
    resources_by_type: IntGaugeVec,
    scrape_errors: IntCounterVec,
    scrape_duration: Histogram,
}

impl GroupsCollector {
    pub fn new(client: Arc<NetBirdClient>) -> prometheus::Result<Self> {
        Ok(Self {
            client,
            cycle: Mutex::new(()),

            total: IntGaugeVec::new(
                Opts::new("netbird_groups", "Total number of NetBird groups"),
                &[],
            )?,
            peers_count: IntGaugeVec::new(
                Opts::new(
                    "netbird_group_peers_count",
                    "Number of peers in each NetBird group",
                ),
                &["group_id", "group_name", "issued"],
            )?,
            resources_count: IntGaugeVec::new(
                Opts::new(
                    "netbird_group_resources_count",
                    "Number of resources in each NetBird group",
                ),
                &["group_id", "group_name", "issued"],
            )?,
            info: IntGaugeVec::new(
                Opts::new(
                    "netbird_group_info",
                    "Information about NetBird groups (always 1)",
                ),
                &["group_id", "group_name", "issued"],
            )?,
            resources_by_type: IntGaugeVec::new(
                Opts::new(
                    "netbird_group_resources_by_type",
                    "Number of resources in each NetBird group by resource type",
                ),
                &["group_id", "group_name", "resource_type"],
            )?,
            scrape_errors: IntCounterVec::new(
                Opts::new(
                    "netbird_groups_scrape_errors_total",
                    "Total number of errors encountered while scraping groups",
                ),
                &["error_type"],
            )?,
            scrape_duration: Histogram::with_opts(HistogramOpts::new(
                "netbird_groups_scrape_duration_seconds",
                "Time spent scraping groups from the NetBird API",
            ))?,
        })
    }

    fn gauges(&self) -> [&IntGaugeVec; 5] {
        [
            &self.total,
            &self.peers_count,
            &self.resources_count,
            &self.info,
            &self.resources_by_type,
        ]
    }

    fn reset(&self) {
        for gauge in self.gauges() {
            gauge.reset();
        }
    }

    fn fold(&self, groups: &[Group]) {
        let mut resource_type_counts: HashMap<(String, String, String), i64> = HashMap::new();

        for group in groups {
            let issued = if group.issued.is_empty() {
                UNKNOWN
            } else {
                group.issued.as_str()
            };
            let labels = [group.id.as_str(), group.name.as_str(), issued];

            self.peers_count
                .with_label_values(&labels)
                .set(group.peers_count);
            self.resources_count
                .with_label_values(&labels)
                .set(group.resources_count);
            self.info.with_label_values(&labels).set(1);

            for resource in &group.resources {
                *resource_type_counts
                    .entry((
                        group.id.clone(),
                        group.name.clone(),
                        resource.resource_type.clone(),
                    ))
                    .or_default() += 1;
            }
        }

        for ((group_id, group_name, resource_type), count) in resource_type_counts {
            self.resources_by_type
                .with_label_values(&[&group_id, &group_name, &resource_type])
                .set(count);
        }
        self.total.with_label_values(&[]).set(groups.len() as i64);

        tracing::debug!(total = groups.len(), "Updated group metrics");
    }
}

#[async_trait]
impl ResourceCollector for GroupsCollector {
    fn name(&self) -> &'static str {
        "groups"
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

        match self.client.list_groups().await {
            Ok(groups) => self.fold(&groups),
            Err(err) => {
                tracing::error!(error = %err, "Failed to fetch groups");
                self.scrape_errors
                    .with_label_values(&["fetch_groups"])
                    .inc();
            }
        }

        timer.observe_duration();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{offline_client, series_count, series_value};
    use nbmon_api::GroupResource;

    fn collector() -> GroupsCollector {
        GroupsCollector::new(offline_client()).unwrap()
    }

    fn group(id: &str, name: &str, issued: &str) -> Group {
        Group {
            id: id.to_string(),
            name: name.to_string(),
            issued: issued.to_string(),
            ..Group::default()
        }
    }

    fn resource(id: &str, resource_type: &str) -> GroupResource {
        GroupResource {
            id: id.to_string(),
            resource_type: resource_type.to_string(),
        }
    }

    #[test]
    fn should_set_per_group_counts_and_info() {
        let collector = collector();
        let mut servers = group("g1", "servers", "api");
        servers.peers_count = 4;
        servers.resources_count = 2;

        collector.fold(&[servers, group("g2", "laptops", "integration")]);

        assert_eq!(series_value(&collector.total, &[]), Some(2.0));
        assert_eq!(
            series_value(
                &collector.peers_count,
                &[("group_id", "g1"), ("group_name", "servers"), ("issued", "api")]
            ),
            Some(4.0)
        );
        assert_eq!(
            series_value(
                &collector.resources_count,
                &[("group_id", "g1"), ("group_name", "servers"), ("issued", "api")]
            ),
            Some(2.0)
        );
        assert_eq!(
            series_value(
                &collector.info,
                &[("group_id", "g2"), ("group_name", "laptops"), ("issued", "integration")]
            ),
            Some(1.0)
        );
        assert_eq!(series_count(&collector.info), 2);
    }

    #[test]
    fn should_count_resources_by_type_per_group() {
        let collector = collector();
        let mut servers = group("g1", "servers", "api");
        servers.resources = vec![
            resource("r1", "host"),
            resource("r2", "host"),
            resource("r3", "subnet"),
        ];
        let mut laptops = group("g2", "laptops", "api");
        laptops.resources = vec![resource("r4", "host")];

        collector.fold(&[servers, laptops]);

        assert_eq!(
            series_value(
                &collector.resources_by_type,
                &[("group_id", "g1"), ("group_name", "servers"), ("resource_type", "host")]
            ),
            Some(2.0)
        );
        assert_eq!(
            series_value(
                &collector.resources_by_type,
                &[("group_id", "g1"), ("group_name", "servers"), ("resource_type", "subnet")]
            ),
            Some(1.0)
        );
        assert_eq!(
            series_value(
                &collector.resources_by_type,
                &[("group_id", "g2"), ("group_name", "laptops"), ("resource_type", "host")]
            ),
            Some(1.0)
        );
    }

    #[test]
    fn should_normalize_missing_issued_to_unknown() {
        let collector = collector();
        collector.fold(&[group("g1", "servers", "")]);

        assert_eq!(
            series_value(
                &collector.info,
                &[("group_id", "g1"), ("group_name", "servers"), ("issued", "unknown")]
            ),
            Some(1.0)
        );
    }

    #[test]
    fn should_emit_no_series_for_empty_collection() {
        let collector = collector();
        collector.fold(&[]);

        assert_eq!(series_value(&collector.total, &[]), Some(0.0));
        assert_eq!(series_count(&collector.info), 0);
        assert_eq!(series_count(&collector.resources_by_type), 0);
    }
}
