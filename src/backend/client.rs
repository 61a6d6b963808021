use reqwest::{Client, Method, StatusCode, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::error::{BackendError, BackendResult};
use crate::auth::BearerToken;

/// Public Superthread API root.
pub const DEFAULT_BASE_URL: &str = "https://api.superthread.com/v1";

/// Install the ring crypto provider for rustls.
///
/// reqwest is built without a bundled provider, so one must be installed
/// before the first client is constructed. Installing twice is harmless.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Method, query string and JSON body of one backend call.
#[derive(Debug, Default, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn patch(body: Value) -> Self {
        Self {
            method: Method::PATCH,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }
}

/// Client for the Superthread REST API.
///
/// Cheap to clone; clones share one connection pool. The bearer token is
/// passed per call, so one client serves every session.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// Create a client rooted at `base_url` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> BackendResult<Self> {
        install_crypto_provider();

        let http = Client::builder()
            .user_agent(concat!("superthread-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Get the base URL being used
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform an authenticated call.
    ///
    /// Returns `Ok(None)` for `204 No Content`. Any non-2xx status becomes
    /// [`BackendError::Status`] with the response body embedded.
    pub async fn request(
        &self,
        path: &str,
        token: &BearerToken,
        options: RequestOptions,
    ) -> BackendResult<Option<Value>> {
        if token.is_empty() {
            return Err(BackendError::MissingToken);
        }

        let url = format!("{}{}", self.base_url, path);
        debug!(method = %options.method, %path, "backend request");

        let mut builder = self
            .http
            .request(options.method, &url)
            .bearer_auth(token.secret())
            .header(CONTENT_TYPE, "application/json");

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
                body,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        Ok(Some(response.json().await?))
    }

    /// Perform an authenticated call and deserialize the body into `T`.
    pub async fn request_as<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &BearerToken,
        options: RequestOptions,
    ) -> BackendResult<T> {
        let value = self
            .request(path, token, options)
            .await?
            .ok_or_else(|| BackendError::InvalidResponse {
                message: format!("empty response body for {path}"),
            })?;
        Ok(serde_json::from_value(value)?)
    }
}
