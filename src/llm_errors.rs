//! # Generation Error Types Module
//!
//! Classified failures of the chat completion API. A rate limit is its own
//! variant so callers can answer it with the backoff-and-fallback path
//! instead of a generic error message.

/// Errors returned by a reply generator
#[derive(Debug, Clone, PartialEq)]
pub enum LlmError {
    /// 429 from the API; optional `Retry-After` seconds
    RateLimited(Option<u64>),
    /// 401/403; the API key is wrong
    Auth(String),
    /// Non-success HTTP status other than 429/401/403
    Http { status: u16, message: String },
    /// Connection failures
    Network(String),
    /// Request exceeded the configured timeout
    Timeout(String),
    /// The response body did not contain a reply
    InvalidResponse(String),
    /// The circuit breaker is open after repeated failures
    CircuitOpen,
    /// No API key configured
    NotConfigured,
}

/// Longest error body kept in messages and logs
const MAX_ERROR_BODY_CHARS: usize = 300;

impl LlmError {
    /// Classify a failed HTTP response
    pub fn from_status(status: u16, body: &str, retry_after: Option<u64>) -> Self {
        let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        match status {
            429 => LlmError::RateLimited(retry_after),
            401 | 403 => LlmError::Auth(message),
            408 => LlmError::Timeout(message),
            _ => LlmError::Http { status, message },
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }

    /// Worth repeating the same request
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Counts toward opening the circuit breaker
    pub fn is_service_failure(&self) -> bool {
        self.is_retryable() || matches!(self, LlmError::InvalidResponse(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited(_))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::RateLimited(Some(secs)) => write!(f, "Rate limited, retry after {secs}s"),
            LlmError::RateLimited(None) => write!(f, "Rate limited"),
            LlmError::Auth(msg) => write!(f, "Authentication error: {msg}"),
            LlmError::Http { status, message } => write!(f, "HTTP error {status}: {message}"),
            LlmError::Network(msg) => write!(f, "Network error: {msg}"),
            LlmError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            LlmError::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
            LlmError::CircuitOpen => write!(f, "Generation API temporarily disabled"),
            LlmError::NotConfigured => write!(f, "Generation API key is not configured"),
        }
    }
}

impl std::error::Error for LlmError {}
