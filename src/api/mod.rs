//! HTTP front end: `/health` plus the MCP Streamable HTTP endpoint.

pub mod error;
mod handlers;
mod routes;
pub mod state;

#[cfg(test)]
mod mcp_test;

use std::env;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use miette::Diagnostic;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::backend::{ApiClient, BackendError, DEFAULT_BASE_URL};
use crate::session::SessionRegistry;

pub use error::TransportError;
pub use handlers::SESSION_ID_HEADER;
pub use routes::create_router;
pub use state::AppState;

pub const DEFAULT_PORT: u16 = 3000;

/// Server startup failures.
#[derive(Error, Diagnostic, Debug)]
pub enum ApiError {
    #[error("Failed to bind {addr}: {source}")]
    #[diagnostic(
        code(superthread_mcp::api::bind),
        help("Is another process already listening on this port? Try --port or PORT.")
    )]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Server error: {0}")]
    #[diagnostic(code(superthread_mcp::api::serve))]
    Serve(#[source] io::Error),

    #[error("Backend client error: {0}")]
    #[diagnostic(code(superthread_mcp::api::backend))]
    Backend(#[from] BackendError),
}

/// API server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Host address to bind to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Root of the Superthread REST API
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            api_base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Defaults overridden by `PORT` and `SUPERTHREAD_API_URL`.
    ///
    /// Unparseable or empty values are ignored.
    pub fn new() -> Self {
        let defaults = Self::default();
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            api_base_url: env::var("SUPERTHREAD_API_URL")
                .ok()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(defaults.api_base_url),
            ..defaults
        }
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Initialize tracing subscriber with env filter
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "superthread_mcp=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the server until Ctrl-C or SIGTERM.
///
/// On shutdown every session is closed (releasing its dispatcher) before
/// the listener finishes draining.
pub async fn run(config: Config) -> Result<(), ApiError> {
    init_tracing();

    let client = ApiClient::new(config.api_base_url.as_str())?;
    let sessions = Arc::new(SessionRegistry::new(CancellationToken::new()));
    let app = create_router(AppState::new(Arc::clone(&sessions), client));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ApiError::Bind { addr, source })?;

    info!("Superthread MCP server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);
    info!("MCP endpoint: http://{}/mcp", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await
        .map_err(ApiError::Serve)?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal(sessions: Arc<SessionRegistry>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutting down, closing sessions");
    sessions.shutdown().await;
}
