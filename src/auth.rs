//! Bearer credential extraction.

use std::fmt;

use axum::http::{HeaderMap, header::AUTHORIZATION};
use miette::Diagnostic;
use sha2::{Digest, Sha256};
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

/// Authentication failures.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header with Bearer token is required")]
    #[diagnostic(
        code(superthread_mcp::auth::missing_credential),
        help("Send `Authorization: Bearer <personal access token>` with every POST /mcp")
    )]
    MissingCredential,
}

/// Opaque bearer credential.
///
/// `Debug` and `Display` are redacted so the secret cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret, for the outbound `Authorization` header only.
    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 of the secret. Lets a session recognise its own credential
    /// without keeping a second copy of it.
    pub fn fingerprint(&self) -> Vec<u8> {
        Sha256::digest(self.0.as_bytes()).to_vec()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(<redacted>)")
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Extract the bearer token from the `Authorization` header.
///
/// Absent, non-UTF-8, non-`Bearer` and empty credentials are all rejected
/// with [`AuthError::MissingCredential`].
pub fn authenticate(headers: &HeaderMap) -> Result<BearerToken, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredential)?;

    let secret = value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingCredential)?;

    Ok(BearerToken::new(secret))
}
