use crate::{bool_label, ResourceCollector, UNKNOWN};
use async_trait::async_trait;
use nbmon_api::{NetBirdClient, Peer};
use prometheus::core::Collector as PromCollector;
use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Collector for `GET /api/peers`.
pub struct PeersCollector {
    client: Arc<NetBirdClient>,
    cycle: Mutex<()>,

    total: IntGaugeVec,
    connected: IntGaugeVec,
    last_seen: IntGaugeVec,
    by_os: IntGaugeVec,
    by_country: IntGaugeVec,
    by_group: IntGaugeVec,
    ssh_enabled: IntGaugeVec,
    login_expired: IntGaugeVec,
    approval_required: IntGaugeVec,
    accessible_peers: IntGaugeVec,
    connection_status: IntGaugeVec,
    scrape_errors: IntCounterVec,
    scrape_duration: Histogram,
}

impl PeersCollector {
    pub fn new(client: Arc<NetBirdClient>) -> prometheus::Result<Self> {
        Ok(Self {
            client,
            cycle: Mutex::new(()),

            // Zero-label vec rather than a plain gauge: reset() drops the
            // series entirely when a scrape fails.
            total: IntGaugeVec::new(
                Opts::new("netbird_peers", "Total number of NetBird peers"),
                &[],
            )?,
            connected: IntGaugeVec::new(
                Opts::new(
                    "netbird_peers_connected",
                    "Number of connected NetBird peers",
                ),
                &["connected"],
            )?,
            last_seen: IntGaugeVec::new(
                Opts::new(
                    "netbird_peer_last_seen_timestamp",
                    "Last seen timestamp of NetBird peers",
                ),
                &["peer_id", "peer_name", "hostname"],
            )?,
            by_os: IntGaugeVec::new(
                Opts::new(
                    "netbird_peers_by_os",
                    "Number of NetBird peers by operating system",
                ),
                &["os"],
            )?,
            by_country: IntGaugeVec::new(
                Opts::new(
                    "netbird_peers_by_country",
                    "Number of NetBird peers by country",
                ),
                &["country_code", "city_name"],
            )?,
            by_group: IntGaugeVec::new(
                Opts::new(
                    "netbird_peers_by_group",
                    "Number of NetBird peers by group",
                ),
                &["group_id", "group_name"],
            )?,
            ssh_enabled: IntGaugeVec::new(
                Opts::new(
                    "netbird_peers_ssh_enabled",
                    "Number of NetBird peers with SSH enabled",
                ),
                &["ssh_enabled"],
            )?,
            login_expired: IntGaugeVec::new(
                Opts::new(
                    "netbird_peers_login_expired",
                    "Number of NetBird peers with expired login",
                ),
                &["login_expired"],
            )?,
            approval_required: IntGaugeVec::new(
                Opts::new(
                    "netbird_peers_approval_required",
                    "Number of NetBird peers requiring approval",
                ),
                &["approval_required"],
            )?,
            accessible_peers: IntGaugeVec::new(
                Opts::new(
                    "netbird_peer_accessible_peers_count",
                    "Number of accessible peers for each peer",
                ),
                &["peer_id", "peer_name"],
            )?,
            connection_status: IntGaugeVec::new(
                Opts::new(
                    "netbird_peer_connection_status_by_name",
                    "Connection status of each peer by name (1 for connected, 0 for disconnected)",
                ),
                &["peer_name", "peer_id", "connected"],
            )?,
            scrape_errors: IntCounterVec::new(
                Opts::new(
                    "netbird_peers_scrape_errors_total",
                    "Total number of errors encountered while scraping peers",
                ),
                &["error_type"],
            )?,
            scrape_duration: Histogram::with_opts(HistogramOpts::new(
                "netbird_peers_scrape_duration_seconds",
                "Time spent scraping peers from the NetBird API",
            ))?,
        })
    }

    fn gauges(&self) -> [&IntGaugeVec; 11] {
        [
            &self.total,
            &self.connected,
            &self.last_seen,
            &self.by_os,
            &self.by_country,
            &self.by_group,
            &self.ssh_enabled,
            &self.login_expired,
            &self.approval_required,
            &self.accessible_peers,
            &self.connection_status,
        ]
    }

    fn reset(&self) {
        for gauge in self.gauges() {
            gauge.reset();
        }
    }

    fn fold(&self, peers: &[Peer]) {
        let mut connected_counts: HashMap<bool, i64> = HashMap::new();
        let mut os_counts: HashMap<String, i64> = HashMap::new();
        let mut country_counts: HashMap<(String, String), i64> = HashMap::new();
        let mut group_counts: HashMap<(String, String), i64> = HashMap::new();
        let mut ssh_counts: HashMap<bool, i64> = HashMap::new();
        let mut login_counts: HashMap<bool, i64> = HashMap::new();
        let mut approval_counts: HashMap<bool, i64> = HashMap::new();

        for peer in peers {
            *connected_counts.entry(peer.connected).or_default() += 1;
            *ssh_counts.entry(peer.ssh_enabled).or_default() += 1;
            *login_counts.entry(peer.login_expired).or_default() += 1;
            *approval_counts.entry(peer.approval_required).or_default() += 1;

            if let Some(last_seen) = peer.last_seen {
                self.last_seen
                    .with_label_values(&[&peer.id, &peer.name, &peer.hostname])
                    .set(last_seen.timestamp());
            }

            let os = if peer.os.is_empty() {
                UNKNOWN
            } else {
                peer.os.as_str()
            };
            *os_counts.entry(os.to_string()).or_default() += 1;

            // An unset country code makes the whole location unknown; the
            // city is not trusted on its own.
            let country_key = if peer.country_code.is_empty() {
                (UNKNOWN.to_string(), UNKNOWN.to_string())
            } else {
                (peer.country_code.clone(), peer.city_name.clone())
            };
            *country_counts.entry(country_key).or_default() += 1;

            for group in &peer.groups {
                *group_counts
                    .entry((group.id.clone(), group.name.clone()))
                    .or_default() += 1;
            }

            self.accessible_peers
                .with_label_values(&[&peer.id, &peer.name])
                .set(peer.accessible_peers_count);
            self.connection_status
                .with_label_values(&[&peer.name, &peer.id, bool_label(peer.connected)])
                .set(i64::from(peer.connected));
        }

        self.total.with_label_values(&[]).set(peers.len() as i64);
        for (value, count) in connected_counts {
            self.connected
                .with_label_values(&[bool_label(value)])
                .set(count);
        }
        for (os, count) in os_counts {
            self.by_os.with_label_values(&[&os]).set(count);
        }
        for ((country, city), count) in country_counts {
            self.by_country
                .with_label_values(&[&country, &city])
                .set(count);
        }
        for ((group_id, group_name), count) in group_counts {
            self.by_group
                .with_label_values(&[&group_id, &group_name])
                .set(count);
        }
        for (value, count) in ssh_counts {
            self.ssh_enabled
                .with_label_values(&[bool_label(value)])
                .set(count);
        }
        for (value, count) in login_counts {
            self.login_expired
                .with_label_values(&[bool_label(value)])
                .set(count);
        }
        for (value, count) in approval_counts {
            self.approval_required
                .with_label_values(&[bool_label(value)])
                .set(count);
        }

        tracing::debug!(total = peers.len(), "Updated peer metrics");
    }
}

#[async_trait]
impl ResourceCollector for PeersCollector {
    fn name(&self) -> &'static str {
        "peers"
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

        match self.client.list_peers().await {
            Ok(peers) => self.fold(&peers),
            Err(err) => {
                tracing::error!(error = %err, "Failed to fetch peers");
                self.scrape_errors.with_label_values(&["fetch_peers"]).inc();
            }
        }

        timer.observe_duration();
    }
}
