use scoring::UpstreamError;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ActivityError>;

#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    StatusError { status: u16, url: String },

    #[error("Invalid base URL: {0}")]
    ConfigError(String),
}

impl ActivityError {
    /// Converts a client failure into the engine's upstream error for `source_name`.
    pub fn into_upstream(self, source_name: &'static str, timeout: Duration) -> UpstreamError {
        match self {
            ActivityError::RequestError(e) if e.is_timeout() => UpstreamError::Timeout {
                source_name,
                millis: timeout.as_millis(),
            },
            other => UpstreamError::unavailable(source_name, other.to_string()),
        }
    }
}
