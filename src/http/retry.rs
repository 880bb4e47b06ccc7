//! Retry classification for source downloads.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of attempts for a download.
pub const MAX_RETRIES: usize = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// Responses that will not change on retry.
#[derive(Debug, Error)]
pub enum NonRetryableError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied to {url} (HTTP {status})")]
    AccessDenied { url: String, status: u16 },

    #[error("Request rejected by {url} (HTTP {status})")]
    ClientError { url: String, status: u16 },
}

/// Classifies an error as retryable or non-retryable.
/// Returns Ok(()) if the error is worth another attempt.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let Some(status) = error.status() else {
        // Connection errors, timeouts, etc.
        return Ok(());
    };
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "<unknown>".to_string());

    match status {
        // Mirrors commonly throttle; worth waiting for
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => Ok(()),
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(NonRetryableError::NotFound(url)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(NonRetryableError::AccessDenied {
            url,
            status: status.as_u16(),
        }),
        s if s.is_client_error() => Err(NonRetryableError::ClientError {
            url,
            status: s.as_u16(),
        }),
        _ => Ok(()),
    }
}

/// Converts an `error_for_status()` failure, keeping retryable errors as-is.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(non_retryable) => anyhow::Error::from(non_retryable),
    }
}
