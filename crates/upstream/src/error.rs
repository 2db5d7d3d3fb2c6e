//! Upstream client error types.

use thiserror::Error;

/// Errors raised while talking to the remote directory.
///
/// These stay inside the crate's public operations, which degrade to an
/// unavailable page or `None` instead of failing.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request rejected with status {0} after re-authentication")]
    Unauthorized(u16),

    #[error("no directory credentials configured")]
    MissingCredentials,

    #[error("no auth token available")]
    NoToken,

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;
