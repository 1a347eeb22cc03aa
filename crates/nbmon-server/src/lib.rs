//! HTTP surface of the NetBird exporter: configuration from the
//! environment, the axum router, and request logging.

pub mod app;
pub mod config;
pub mod logging;
pub mod state;
