//! Transport-level errors and their JSON-RPC envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use miette::Diagnostic;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::auth::AuthError;
use crate::session::ExchangeError;

/// Failures answered by the HTTP layer itself, before or instead of a
/// dispatcher reply.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Authorization header with Bearer token is required")]
    #[diagnostic(code(superthread_mcp::transport::missing_credential))]
    MissingCredential,

    #[error("Invalid or missing session ID")]
    #[diagnostic(code(superthread_mcp::transport::invalid_session))]
    InvalidSession,

    #[error("Bad Request: No valid session ID provided")]
    #[diagnostic(code(superthread_mcp::transport::handshake_rejected))]
    HandshakeRejected,

    #[error("Parse error: {0}")]
    #[diagnostic(code(superthread_mcp::transport::malformed_message))]
    MalformedMessage(String),

    /// The detail is logged, never sent to the client.
    #[error("Internal server error")]
    #[diagnostic(code(superthread_mcp::transport::internal))]
    InternalFailure(String),
}

impl TransportError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingCredential => StatusCode::UNAUTHORIZED,
            Self::InvalidSession | Self::HandshakeRejected | Self::MalformedMessage(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::InternalFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON-RPC error code.
    pub fn code(&self) -> i32 {
        match self {
            Self::MissingCredential => -32001,
            Self::InvalidSession | Self::HandshakeRejected => -32000,
            Self::MalformedMessage(_) => -32700,
            Self::InternalFailure(_) => -32603,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    jsonrpc: &'static str,
    error: ErrorBody,
    id: Value,
}

#[derive(Serialize)]
struct ErrorBody {
    code: i32,
    message: String,
}

impl IntoResponse for TransportError {
    fn into_response(self) -> Response {
        if let Self::InternalFailure(detail) = &self {
            error!(%detail, "internal transport failure");
        }

        let envelope = ErrorEnvelope {
            jsonrpc: "2.0",
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
            id: Value::Null,
        };
        (self.status(), Json(envelope)).into_response()
    }
}

impl From<AuthError> for TransportError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingCredential => Self::MissingCredential,
        }
    }
}

impl From<ExchangeError> for TransportError {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::Malformed(reason) => Self::MalformedMessage(reason),
            duplicate @ ExchangeError::DuplicateRequest(_) => {
                Self::MalformedMessage(duplicate.to_string())
            }
            ExchangeError::Closed => Self::InvalidSession,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn envelope(err: TransportError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_missing_credential_envelope() {
        let (status, body) = envelope(TransportError::MissingCredential).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            serde_json::json!({
                "jsonrpc": "2.0",
                "error": {
                    "code": -32001,
                    "message": "Authorization header with Bearer token is required"
                },
                "id": null
            })
        );
    }

    #[tokio::test]
    async fn test_malformed_message_includes_reason() {
        let (status, body) =
            envelope(TransportError::MalformedMessage("expected value".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["error"]["message"], "Parse error: expected value");
    }

    #[tokio::test]
    async fn test_internal_failure_hides_detail() {
        let (status, body) =
            envelope(TransportError::InternalFailure("secret detail".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], -32603);
        assert_eq!(body["error"]["message"], "Internal server error");
    }

    #[test]
    fn test_exchange_error_mapping() {
        assert_eq!(
            TransportError::from(ExchangeError::Closed),
            TransportError::InvalidSession
        );
        assert!(matches!(
            TransportError::from(ExchangeError::Malformed("x".into())),
            TransportError::MalformedMessage(reason) if reason == "x"
        ));
    }

    #[test]
    fn test_session_errors_share_code() {
        assert_eq!(TransportError::InvalidSession.code(), -32000);
        assert_eq!(TransportError::HandshakeRejected.code(), -32000);
        assert_eq!(
            TransportError::HandshakeRejected.status(),
            StatusCode::BAD_REQUEST
        );
    }
}
