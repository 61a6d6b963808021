//! Superthread MCP server binary.

use std::net::IpAddr;

use clap::Parser;
use miette::Diagnostic;
use superthread_mcp::api::{self, ApiError, Config};
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
enum BinaryError {
    #[error("API server error: {0}")]
    #[diagnostic(code(superthread_mcp::binary::api))]
    Api(#[from] ApiError),
}

#[derive(Parser)]
#[command(name = "superthread-mcp")]
#[command(author, version, about = "MCP server for the Superthread API", long_about = None)]
struct Cli {
    /// Host address to bind to (default: 0.0.0.0)
    #[arg(long)]
    host: Option<IpAddr>,

    /// Port to listen on (default: $PORT or 3000)
    #[arg(short, long)]
    port: Option<u16>,

    /// Superthread API base URL (default: $SUPERTHREAD_API_URL or the public API)
    #[arg(long)]
    api_url: Option<String>,
}

impl Cli {
    /// CLI flags win over environment, which wins over defaults.
    fn into_config(self) -> Config {
        let mut config = Config::new();
        if let Some(host) = self.host {
            config = config.with_host(host);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(url) = self.api_url {
            config = config.with_api_base_url(url);
        }
        config
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let config = Cli::parse().into_config();
    api::run(config).await.map_err(BinaryError::from)?;
    Ok(())
}
