use std::time::Duration;

use geodisc_core::BackendError;
use thiserror::Error;

/// Errors returned by the discovery backend client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, TLS or body-read failure, including timeouts. Statuses are
    /// classified separately.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429. `retry_after` is the server's `Retry-After`, when it sent one.
    #[error("rate limited by backend{}", fmt_retry_after(.retry_after.as_ref()))]
    RateLimited { retry_after: Option<Duration> },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// The body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

fn fmt_retry_after(retry_after: Option<&Duration>) -> String {
    retry_after
        .map(|d| format!(" (retry after {}s)", d.as_secs()))
        .unwrap_or_default()
}

impl ClientError {
    /// Whether sending the same request again may succeed.
    ///
    /// Deserialization failures and 4xx statuses other than 429 are final.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::Http(_) | ClientError::RateLimited { .. } => true,
            ClientError::Status { status, .. } => *status >= 500,
            ClientError::Deserialize { .. } | ClientError::InvalidBaseUrl { .. } => false,
        }
    }
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Deserialize { .. } => BackendError::Malformed {
                message: err.to_string(),
            },
            ClientError::Http(_)
            | ClientError::RateLimited { .. }
            | ClientError::Status { .. }
            | ClientError::InvalidBaseUrl { .. } => BackendError::Transient {
                message: err.to_string(),
            },
        }
    }
}
