//! Client error types for the overseer SDK

use std::time::Duration;

/// Error type for announce and resolve operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request error: status={status} {reason}")]
    HttpStatus { status: u16, reason: String },

    #[error("overseer did not answer within {0:?}")]
    Timeout(Duration),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("malformed overseer response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("registration abandoned after {attempts} failed attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("announce task failed: {0}")]
    TaskFailed(String),
}

impl ClientError {
    pub(crate) fn http_status(status: reqwest::StatusCode) -> Self {
        Self::HttpStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::http_status(reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.to_string(), "request error: status=503 Service Unavailable");

        let err = ClientError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "overseer did not answer within 3s");

        let err = ClientError::config("OVERSEER_HOST not set");
        assert_eq!(err.to_string(), "configuration error: OVERSEER_HOST not set");

        let err = ClientError::RetriesExhausted { attempts: 5 };
        assert_eq!(
            err.to_string(),
            "registration abandoned after 5 failed attempts"
        );
    }
}
