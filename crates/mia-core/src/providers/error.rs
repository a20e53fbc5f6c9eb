//! Typed errors for LLM operations

use thiserror::Error;

/// LLM operation errors with typed variants
///
/// Lets callers tell apart failures worth retrying (rate limits, 5xx,
/// network, timeouts) from ones that are not (bad request, bad response).
#[derive(Debug, Error)]
pub enum LlmError {
    /// API key missing, expired or invalid (HTTP 401/403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed request (HTTP 400 and other 4xx)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side error (HTTP 5xx)
    #[error("Service error: {0}")]
    ServiceError(String),

    /// Connection refused, DNS failure, reset
    #[error("Network error: {0}")]
    Network(String),

    /// No complete response within the deadline
    #[error("LLM request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The endpoint answered with something we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Check if this error is retryable (after a delay)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited(_)
                | LlmError::ServiceError(_)
                | LlmError::Network(_)
                | LlmError::Timeout(_)
        )
    }

    /// Map an HTTP error status and body to a typed error
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status, truncate(body, 500));
        match status {
            401 | 403 => LlmError::Unauthorized(detail),
            429 => LlmError::RateLimited(detail),
            500..=599 => LlmError::ServiceError(detail),
            _ => LlmError::BadRequest(detail),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
