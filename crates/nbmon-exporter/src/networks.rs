use crate::ResourceCollector;
use async_trait::async_trait;
use nbmon_api::{NetBirdClient, Network};
use prometheus::core::Collector as PromCollector;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collector for `GET /api/networks`.
pub struct NetworksCollector {
    client: Arc<NetBirdClient>,
    cycle: Mutex<()>,

    total: IntGaugeVec,
    routers_count: IntGaugeVec,
    resources_count: IntGaugeVec,
    policies_count: IntGaugeVec,
    routing_peers_count: IntGaugeVec,
    info: IntGaugeVec,
    scrape_errors: IntCounterVec,
    scrape_duration: Histogram,
}

impl NetworksCollector {
    pub fn new(client: Arc<NetBirdClient>) -> prometheus::Result<Self> {
        Ok(Self {
            client,
            cycle: Mutex::new(()),

            total: IntGaugeVec::new(
                Opts::new("netbird_networks", "Total number of NetBird networks"),
                &[],
            )?,
            routers_count: IntGaugeVec::new(
                Opts::new(
                    "netbird_network_routers_count",
                    "Number of routers in each NetBird network",
                ),
                &["network_id", "network_name"],
            )?,
            resources_count: IntGaugeVec::new(
                Opts::new(
                    "netbird_network_resources_count",
                    "Number of resources in each NetBird network",
                ),
                &["network_id", "network_name"],
            )?,
            policies_count: IntGaugeVec::new(
                Opts::new(
                    "netbird_network_policies_count",
                    "Number of policies in each NetBird network",
                ),
                &["network_id", "network_name"],
            )?,
            routing_peers_count: IntGaugeVec::new(
                Opts::new(
                    "netbird_network_routing_peers_count",
                    "Number of routing peers in each NetBird network",
                ),
                &["network_id", "network_name"],
            )?,
            info: IntGaugeVec::new(
                Opts::new(
                    "netbird_network_info",
                    "Information about NetBird networks (always 1)",
                ),
                &["network_id", "network_name", "description"],
            )?,
            scrape_errors: IntCounterVec::new(
                Opts::new(
                    "netbird_networks_scrape_errors_total",
                    "Total number of errors encountered while scraping networks",
                ),
                &["error_type"],
            )?,
            scrape_duration: Histogram::with_opts(HistogramOpts::new(
                "netbird_networks_scrape_duration_seconds",
                "Time spent scraping networks from the NetBird API",
            ))?,
        })
    }

    fn gauges(&self) -> [&IntGaugeVec; 6] {
        [
            &self.total,
            &self.routers_count,
            &self.resources_count,
            &self.policies_count,
            &self.routing_peers_count,
            &self.info,
        ]
    }

    fn reset(&self) {
        for gauge in self.gauges() {
            gauge.reset();
        }
    }

    fn fold(&self, networks: &[Network]) {
        for network in networks {
            let labels = [network.id.as_str(), network.name.as_str()];

            self.routers_count
                .with_label_values(&labels)
                .set(network.routers.len() as i64);
            self.resources_count
                .with_label_values(&labels)
                .set(network.resources.len() as i64);
            self.policies_count
                .with_label_values(&labels)
                .set(network.policies.len() as i64);
            self.routing_peers_count
                .with_label_values(&labels)
                .set(network.routing_peers_count);
            self.info
                .with_label_values(&[&network.id, &network.name, &network.description])
                .set(1);
        }

        self.total.with_label_values(&[]).set(networks.len() as i64);

        tracing::debug!(total = networks.len(), "Updated network metrics");
    }
}

#[async_trait]
impl ResourceCollector for NetworksCollector {
    fn name(&self) -> &'static str {
        "networks"
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

        match self.client.list_networks().await {
            Ok(networks) => self.fold(&networks),
            Err(err) => {
                tracing::error!(error = %err, "Failed to fetch networks");
                self.scrape_errors
                    .with_label_values(&["fetch_networks"])
                    .inc();
            }
        }

        timer.observe_duration();
    }
}
