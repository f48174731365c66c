//! Fetch error type.

use std::time::Duration;

use thiserror::Error;

/// Errors returned by [`DevOpsApi`](super::DevOpsApi) calls.
///
/// The collection core treats every variant the same way (keep the stale
/// snapshot, retry on the next tick). [`is_transient`](Self::is_transient) only
/// decides how loudly the failure is logged.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (connect, TLS, body read).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// Response body did not match the expected shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The call or the whole cycle exceeded its deadline.
    #[error("timeout elapsed after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Whether a retry has a reasonable chance of succeeding without intervention.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. } => false,
            Self::Timeout(_) => true,
        }
    }
}
