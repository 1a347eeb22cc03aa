use crate::logging;
use crate::state::AppState;
use anyhow::Result;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::middleware;
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;

/// Window granted to in-flight connections once shutdown is requested.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Serve until `shutdown` resolves, then drain in-flight connections for at
/// most [`SHUTDOWN_GRACE`] before closing them.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    serve_with_grace(listener, state, shutdown, SHUTDOWN_GRACE).await
}

async fn serve_with_grace(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()>,
    grace: Duration,
) -> Result<()> {
    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let app = build_app(state);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                drain_rx.await.ok();
            })
            .await
    });

    tokio::select! {
        result = &mut server => return Ok(result??),
        _ = shutdown => {}
    }

    let _ = drain_tx.send(());
    match tokio::time::timeout(grace, &mut server).await {
        Ok(result) => result??,
        Err(_) => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "Graceful shutdown window elapsed, closing remaining connections"
            );
            server.abort();
        }
    }
    Ok(())
}

pub fn build_app(state: AppState) -> Router {
    let mut router = Router::new()
        .route(&state.metrics_path, get(metrics))
        .route("/health", get(health));
    // The landing page only exists when it does not shadow the metrics path.
    if state.metrics_path != "/" {
        router = router.route("/", get(index));
    }
    router
        .with_state(state)
        .layer(middleware::from_fn(logging::request_logging))
}

/// Run one scrape cycle and return the rendered registry.
async fn metrics(State(state): State<AppState>) -> Response {
    match state.exporter.scrape().await {
        Ok(body) => (
            [(header::CONTENT_TYPE, nbmon_exporter::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to render metrics",
            )
                .into_response()
        }
    }
}

/// Liveness only; never talks to the upstream API.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html><head><title>NetBird Exporter</title></head>\
         <body><h1>NetBird Exporter</h1>\
         <p><a href=\"{}\">Metrics</a></p>\
         <p><a href=\"/health\">Health</a></p></body></html>",
        state.metrics_path
    ))
}
