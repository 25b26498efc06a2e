use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend throttled the request. Deferred availability, not a
    /// permanent failure; retry policy is decided by the call site.
    #[error("request was rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}
