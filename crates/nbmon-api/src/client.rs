use crate::error::{ApiError, Result};
use crate::types::{DnsSettings, Group, NameserverGroup, Network, Peer, User};
use reqwest::header;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Every request is bounded by this client-wide timeout. A timeout is a
/// normal error outcome, not a cancellation signal.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Thin authenticated HTTP transport for the NetBird management API.
///
/// The client holds no mutable state beyond reqwest's connection pool and
/// may be shared across collectors behind an `Arc`.
pub struct NetBirdClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl NetBirdClient {
    /// Build a client for `base_url` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue an authenticated GET to `path` and decode the JSON body.
    ///
    /// A non-200 status is surfaced as [`ApiError::Status`] without reading
    /// the body; a body that fails to decode as `T` is [`ApiError::Decode`].
    /// One attempt per call, no retries.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Token {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn list_peers(&self) -> Result<Vec<Peer>> {
        self.get("/api/peers").await
    }

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.get("/api/groups").await
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.get("/api/users").await
    }

    pub async fn list_nameserver_groups(&self) -> Result<Vec<NameserverGroup>> {
        self.get("/api/dns/nameservers").await
    }

    pub async fn dns_settings(&self) -> Result<DnsSettings> {
        self.get("/api/dns/settings").await
    }

    pub async fn list_networks(&self) -> Result<Vec<Network>> {
        self.get("/api/networks").await
    }
}
