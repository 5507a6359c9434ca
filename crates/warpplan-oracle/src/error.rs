//! Oracle error types.

use thiserror::Error;

/// Why an oracle round trip did not produce a decision.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// The oracle refused the call because of rate limiting. The backoff
    /// window has already been extended when this is returned.
    #[error("llm_429")]
    RateLimited { retry_after: Option<f64> },

    /// Transport failure, timeout, non-2xx status, or an unusable body.
    #[error("{0}")]
    Unavailable(String),
}

impl OracleError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, OracleError::RateLimited { .. })
    }

    /// Short cause for `llm_fallback: <cause>` annotations.
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl From<TransportError> for OracleError {
    fn from(e: TransportError) -> Self {
        OracleError::Unavailable(e.to_string())
    }
}

/// Failures below the HTTP status line.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("invalid oracle url: {0}")]
    InvalidUrl(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("oracle timed out after {0}s")]
    Timeout(f64),

    #[error("invalid oracle timeout: {0}s")]
    InvalidTimeout(f64),
}
