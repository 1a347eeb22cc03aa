use std::net::ToSocketAddrs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("NETBIRD_API_TOKEN must be set to a NetBird API access token")]
    MissingToken,
    #[error("LISTEN_ADDRESS '{address}' is not a valid socket address")]
    InvalidListenAddress { address: String },
}

/// Runtime configuration, read entirely from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_token: String,
    pub listen_address: String,
    pub metrics_path: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_token = std::env::var("NETBIRD_API_TOKEN")
            .ok()
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let listen_address =
            normalize_listen_address(&env_with_default("LISTEN_ADDRESS", "0.0.0.0:8080"));
        // ToSocketAddrs rather than SocketAddr: hostname forms like
        // `localhost:8080` must stay valid.
        match listen_address.to_socket_addrs().map(|mut resolved| resolved.next()) {
            Ok(Some(_)) => {}
            _ => {
                return Err(ConfigError::InvalidListenAddress {
                    address: listen_address,
                })
            }
        }

        Ok(Self {
            api_url: env_with_default("NETBIRD_API_URL", "https://api.netbird.io"),
            api_token,
            listen_address,
            metrics_path: normalize_metrics_path(&env_with_default("METRICS_PATH", "/metrics")),
            log_level: env_with_default("LOG_LEVEL", "info"),
        })
    }
}

fn env_with_default(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Accepts the `:8080` shorthand and expands it to a bindable address.
fn normalize_listen_address(address: &str) -> String {
    if let Some(port) = address.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        address.to_string()
    }
}

fn normalize_metrics_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
