use nbmon_exporter::Exporter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<Exporter>,
    pub metrics_path: String,
}
