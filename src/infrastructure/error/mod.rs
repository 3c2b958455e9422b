use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Invocation-level failures. Per-device delivery failures never surface here;
/// they are folded into the dispatch summary instead.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid envelope shape: expected a `message` wrapper or a `data` field")]
    InvalidEnvelopeShape,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Device registry unavailable: {0}")]
    RegistryUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether the failure was caused by the caller's input
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::InvalidEnvelopeShape | RelayError::MalformedPayload(_)
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidEnvelopeShape => "INVALID_ENVELOPE_SHAPE",
            RelayError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            RelayError::RegistryUnavailable(_) => "REGISTRY_UNAVAILABLE",
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

/// Check if running in production mode (based on RUN_MODE env var)
fn is_production() -> bool {
    std::env::var("RUN_MODE")
        .map(|m| m == "production" || m == "prod")
        .unwrap_or(false)
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let log_message = self.to_string();

        // Input errors are safe to echo; operational details stay in the logs in production
        let client_message = if self.is_client_error() || !is_production() {
            log_message.clone()
        } else {
            match self {
                RelayError::RegistryUnavailable(_) => "Service temporarily unavailable".to_string(),
                _ => "Internal server error".to_string(),
            }
        };

        if self.is_client_error() {
            tracing::warn!(code = %code, status = %status.as_u16(), message = %log_message, "Rejected event");
        } else {
            tracing::error!(code = %code, status = %status.as_u16(), message = %log_message, "Relay error");
        }

        let body = ErrorResponse {
            error: code.to_string(),
            message: client_message,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_client_errors() {
        assert_eq!(RelayError::InvalidEnvelopeShape.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            RelayError::MalformedPayload("bad base64".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_registry_outage_is_server_error() {
        let err = RelayError::RegistryUnavailable("circuit open".into());
        assert!(!err.is_client_error());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "REGISTRY_UNAVAILABLE");
    }

    #[test]
    fn test_malformed_payload_keeps_diagnostic_text() {
        let err = RelayError::MalformedPayload("expected value at line 1 column 1".into());
        assert!(err.to_string().contains("line 1 column 1"));
    }
}
