//! Classified errors for gateway calls

use thiserror::Error;

/// Error returned by catalog gateway operations.
///
/// The transient/permanent split is part of the contract: the
/// synchronizer retries transient failures with backoff and fails
/// permanent ones immediately.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by platform")]
    RateLimited,

    #[error("platform error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("gateway configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether retrying the call can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Network(_)
                | GatewayError::Timeout(_)
                | GatewayError::RateLimited
                | GatewayError::Server { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_matches_retry_contract() {
        assert!(GatewayError::Network("reset".into()).is_transient());
        assert!(GatewayError::RateLimited.is_transient());
        assert!(GatewayError::Server {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());

        assert!(!GatewayError::Rejected {
            status: 422,
            message: "missing color".into()
        }
        .is_transient());
        assert!(!GatewayError::InvalidResponse("not json".into()).is_transient());
        assert!(!GatewayError::Config("no token".into()).is_transient());
    }
}
