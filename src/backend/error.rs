//! Backend client error types.

use miette::Diagnostic;
use thiserror::Error;

/// Errors from calls to the Superthread REST API.
#[derive(Error, Diagnostic, Debug)]
pub enum BackendError {
    #[error(
        "Authorization token is required. Please provide a valid Superthread Personal Access Token."
    )]
    #[diagnostic(code(superthread_mcp::backend::missing_token))]
    MissingToken,

    #[error("API request failed: {status} {reason} - {body}")]
    #[diagnostic(code(superthread_mcp::backend::status))]
    Status {
        status: u16,
        reason: String,
        body: String,
    },

    #[error("Failed to reach the Superthread API: {source}")]
    #[diagnostic(
        code(superthread_mcp::backend::transport),
        help("Check network connectivity and the configured API URL (SUPERTHREAD_API_URL).")
    )]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid response from the Superthread API: {message}")]
    #[diagnostic(code(superthread_mcp::backend::invalid_response))]
    InvalidResponse { message: String },
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::InvalidResponse {
                message: e.to_string(),
            }
        } else {
            BackendError::Transport { source: e }
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::InvalidResponse {
            message: e.to_string(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
