//! Errors raised at the data-provider boundary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success status returned by the provider
    #[error("HTTP error {status} from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    /// Login rejected or no session token returned
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Body was not valid JSON
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// JSON was valid but not in any accepted shape
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl ProviderError {
    /// Whether a retry has a chance of succeeding.
    ///
    /// Connection problems, 5xx and 429 are transient. Auth failures, other 4xx and
    /// undecodable bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Request(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            ProviderError::HttpStatus { status, .. } => {
                status.is_server_error() || status.as_u16() == 429
            }
            _ => false,
        }
    }
}
