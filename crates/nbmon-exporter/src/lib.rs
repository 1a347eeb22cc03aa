//! Prometheus collectors for the NetBird management API.
//!
//! Each domain collector owns a private set of instruments and runs one
//! reset → fetch → fold cycle per scrape. The [`Exporter`] composes the
//! collectors, serializes scrapes, and renders the registry in the text
//! exposition format.

pub mod dns;
pub mod groups;
pub mod networks;
pub mod peers;
pub mod users;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use nbmon_api::NetBirdClient;
use prometheus::core::{Collector as PromCollector, Desc};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};
use std::sync::Arc;
use tokio::sync::Mutex;

pub use dns::DnsCollector;
pub use groups::GroupsCollector;
pub use networks::NetworksCollector;
pub use peers::PeersCollector;
pub use prometheus::TEXT_FORMAT;
pub use users::UsersCollector;

/// Label value used for empty/unset categorical fields, so absent data
/// never produces an empty-string label.
pub(crate) const UNKNOWN: &str = "unknown";

pub(crate) fn bool_label(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// One domain collector: a set of instruments plus the fetch-and-fold
/// cycle that populates them.
///
/// Implementations must serialize their own collect cycles: two concurrent
/// `collect` calls on the same instance may not interleave reset and fold.
/// Every collector here holds a cycle mutex for the whole
/// reset → fetch → fold span; that lock is a hard contract, not an
/// incidental detail.
#[async_trait]
pub trait ResourceCollector: Send + Sync {
    /// Short name used for log and error attribution.
    fn name(&self) -> &'static str;

    /// Clones of every instrument this collector owns, for registration.
    fn instruments(&self) -> Vec<Box<dyn PromCollector>>;

    /// Static descriptors of every owned instrument. Side-effect free and
    /// idempotent regardless of prior collect cycles.
    fn descs(&self) -> Vec<Desc> {
        self.instruments()
            .iter()
            .flat_map(|instrument| instrument.desc().into_iter().cloned())
            .collect()
    }

    /// Run one full collect cycle: reset gauges, fetch, fold. Fetch errors
    /// are handled internally (logged and counted), never returned.
    async fn collect(&self);
}

/// Aggregate exporter over all domain collectors.
///
/// Holds the registry, the process-wide scrape instruments, and a scrape
/// lock so concurrent `/metrics` requests are served one cycle at a time.
pub struct Exporter {
    registry: Registry,
    collectors: Vec<Arc<dyn ResourceCollector>>,
    scrape_duration: Histogram,
    scrape_errors: IntCounter,
    scrape_lock: Mutex<()>,
}

impl Exporter {
    /// Build the exporter with the five domain collectors in their fixed
    /// order (peers, groups, users, dns, networks) and register every
    /// instrument.
    pub fn new(client: Arc<NetBirdClient>) -> prometheus::Result<Self> {
        let collectors: Vec<Arc<dyn ResourceCollector>> = vec![
            Arc::new(PeersCollector::new(Arc::clone(&client))?),
            Arc::new(GroupsCollector::new(Arc::clone(&client))?),
            Arc::new(UsersCollector::new(Arc::clone(&client))?),
            Arc::new(DnsCollector::new(Arc::clone(&client))?),
            Arc::new(NetworksCollector::new(client)?),
        ];
        Self::from_parts(collectors)
    }

    fn from_parts(collectors: Vec<Arc<dyn ResourceCollector>>) -> prometheus::Result<Self> {
        let registry = Registry::new();
        for collector in &collectors {
            for instrument in collector.instruments() {
                registry.register(instrument)?;
            }
        }

        let scrape_duration = Histogram::with_opts(HistogramOpts::new(
            "netbird_exporter_scrape_duration_seconds",
            "Time spent scraping the NetBird API",
        ))?;
        let scrape_errors = IntCounter::new(
            "netbird_exporter_scrape_errors_total",
            "Total number of scrape errors",
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(scrape_errors.clone()))?;

        Ok(Self {
            registry,
            collectors,
            scrape_duration,
            scrape_errors,
            scrape_lock: Mutex::new(()),
        })
    }

    /// Run one scrape cycle across all collectors and render the registry.
    ///
    /// The scrape lock is held across collect and encode, so a concurrent
    /// scrape can never observe a half-reset instrument set. Sub-collectors
    /// run on their own tasks: their fetches proceed concurrently, and a
    /// panic inside one fold is absorbed at the join boundary instead of
    /// unwinding the whole scrape.
    pub async fn scrape(&self) -> prometheus::Result<String> {
        let _guard = self.scrape_lock.lock().await;
        let timer = self.scrape_duration.start_timer();

        let mut tasks = Vec::with_capacity(self.collectors.len());
        for collector in &self.collectors {
            let name = collector.name();
            let collector = Arc::clone(collector);
            tasks.push((name, tokio::spawn(async move { collector.collect().await })));
        }
        for (name, task) in tasks {
            if let Err(err) = task.await {
                tracing::error!(collector = name, error = %err, "Collector task failed");
                self.scrape_errors.inc();
            }
        }

        timer.observe_duration();
        self.render()
    }

    /// Descriptors of every registered instrument, sub-collectors first,
    /// then the process-wide scrape instruments.
    pub fn descs(&self) -> Vec<Desc> {
        let mut descs: Vec<Desc> = self
            .collectors
            .iter()
            .flat_map(|collector| collector.descs())
            .collect();
        descs.extend(self.scrape_duration.desc().into_iter().cloned());
        descs.extend(self.scrape_errors.desc().into_iter().cloned());
        descs
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|err| prometheus::Error::Msg(err.to_string()))
    }
}
