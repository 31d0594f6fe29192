//! Request-layer error types.

use thiserror::Error;

pub type HttpResult<T> = Result<T, HttpError>;

/// Everything that can go wrong before a response body is in hand.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("unsupported protocol {scheme:?} (only http and https)")]
    UnsupportedProtocol { scheme: String },

    #[error("invalid url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header {name:?}")]
    InvalidHeader { name: String },

    #[error("invalid proxy {proxy:?}: {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    /// The per-request deadline fired.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The caller's cancellation token fired; distinct from a timeout.
    #[error("request cancelled")]
    Cancelled,

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),
}

impl HttpError {
    /// True for the deadline error, and only for it.
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpError::Timeout { .. })
    }
}
