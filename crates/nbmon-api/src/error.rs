/// Errors raised when talking to the NetBird management API.
///
/// The client makes a single attempt per call; retry and backoff are the
/// caller's responsibility.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The API answered with a non-200 status code. The body is not decoded.
    #[error("API returned status {status}")]
    Status { status: u16 },

    /// An underlying HTTP transport error from `reqwest` (connection
    /// refused, timeout, DNS failure).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered 200 but the body was not the expected JSON shape.
    #[error("decoding response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, ApiError>;
