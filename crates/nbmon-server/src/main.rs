use anyhow::Result;
use nbmon_api::NetBirdClient;
use nbmon_exporter::Exporter;
use nbmon_server::app;
use nbmon_server::config::Config;
use nbmon_server::state::AppState;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  nbmon-server    Start the exporter (configured via environment)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  NETBIRD_API_TOKEN    NetBird API access token (required)");
    eprintln!("  NETBIRD_API_URL      API base URL (default: https://api.netbird.io)");
    eprintln!("  LISTEN_ADDRESS       Bind address (default: 0.0.0.0:8080)");
    eprintln!("  METRICS_PATH         Metrics endpoint path (default: /metrics)");
    eprintln!("  LOG_LEVEL            Log filter (default: info)");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if matches!(args.get(1).map(|s| s.as_str()), Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }

    let config = Config::from_env()?;

    let (filter, invalid_level) = match EnvFilter::try_new(&config.log_level) {
        Ok(filter) => (filter, false),
        Err(_) => (EnvFilter::new("info"), true),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    if invalid_level {
        tracing::warn!(level = %config.log_level, "Invalid LOG_LEVEL, falling back to info");
    }

    tracing::info!(
        api_url = %config.api_url,
        listen = %config.listen_address,
        metrics_path = %config.metrics_path,
        "nbmon-server starting"
    );

    let client = Arc::new(NetBirdClient::new(&config.api_url, &config.api_token)?);
    let exporter = Arc::new(Exporter::new(client)?);
    let state = AppState {
        exporter,
        metrics_path: config.metrics_path.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.listen_address).await?;
    tracing::info!(addr = %config.listen_address, "Server started");

    app::serve(listener, state, shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down gracefully"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down gracefully"),
    }
}
