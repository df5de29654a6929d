//! Webhook request errors and their HTTP responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Result type for webhook handlers.
pub type HookResult<T> = Result<T, HookError>;

/// Everything that can stop a delivery from reaching, or finishing in, a plugin.
#[derive(Debug, Error)]
pub enum HookError {
    // 400 Bad Request
    #[error("missing header: {0}")]
    MissingHeader(&'static str),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // 403 Forbidden
    #[error("invalid signature")]
    InvalidSignature,

    // 404 Not Found
    #[error("no plugin is registered for {0}")]
    NotFound(String),

    // 405 Method Not Allowed
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    // 500 Internal Server Error
    #[error("plugin {plugin} failed")]
    Handler {
        plugin: &'static str,
        event: String,
        delivery: String,
        #[source]
        source: anyhow::Error,
    },

    // 503 Service Unavailable
    #[error("server is shutting down")]
    ShuttingDown,
}

impl HookError {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_) | Self::UnsupportedContentType(_) | Self::InvalidPayload(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidSignature => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Handler { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get error code for client handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingHeader(_) => "missing_header",
            Self::UnsupportedContentType(_) => "unsupported_content_type",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::InvalidSignature => "invalid_signature",
            Self::NotFound(_) => "not_found",
            Self::MethodNotAllowed(_) => "method_not_allowed",
            Self::Handler { .. } => "internal_error",
            Self::ShuttingDown => "shutting_down",
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

impl IntoResponse for HookError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Handler {
                plugin,
                event,
                delivery,
                source,
            } => {
                error!(
                    plugin = %plugin,
                    event = %event,
                    delivery = %delivery,
                    error = format!("{source:#}"),
                    "Plugin failed"
                );
                // Plugin internals stay in the logs.
                "An internal error occurred".to_string()
            }
            Self::InvalidSignature => {
                warn!(code = self.error_code(), "Rejected delivery with invalid signature");
                self.to_string()
            }
            _ => self.to_string(),
        };

        let status = self.status_code();
        let mut response = (
            status,
            Json(ErrorResponse {
                error: self.error_code(),
                message,
            }),
        )
            .into_response();

        if let Self::MethodNotAllowed(_) = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static("POST"));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HookError::MissingHeader("X-GitHub-Event").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(HookError::InvalidSignature.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(HookError::NotFound("/x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(HookError::MethodNotAllowed("GET".into()).status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(HookError::ShuttingDown.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_handler_error_hides_details() {
        let err = HookError::Handler {
            plugin: "jira-checker",
            event: "pull_request".into(),
            delivery: "abc".into(),
            source: anyhow::anyhow!("token ghp_secret rejected"),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("ghp_secret"));
    }

    #[test]
    fn test_method_not_allowed_sets_allow_header() {
        let response = HookError::MethodNotAllowed("GET".into()).into_response();
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "POST");
    }
}
