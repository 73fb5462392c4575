//! MCP server entrypoint (stdio transport).
//!
//! Launches an MCP server that exposes the Reltio tools and resources over stdio for
//! editor/agent integrations. Configuration comes from the environment, optionally seeded from
//! an env file.
use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use reltio_mcp::{config, logging, mcp::ReltioMcpServer, reltio::ReltioClient};
use rmcp::{service::ServiceExt, transport::stdio};

#[derive(Parser)]
#[command(name = "reltio-mcp", version, about = "MCP server for the Reltio MDM platform")]
struct Cli {
    /// Load environment variables from this file before reading the configuration.
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(path) = &cli.env_file {
        dotenvy::from_path(path)
            .with_context(|| format!("failed to load env file {}", path.display()))?;
    }
    logging::init_tracing();
    let config = config::init_config().context("failed to load configuration")?;

    let client = ReltioClient::new(Arc::new(config.clone()))
        .context("failed to build the Reltio HTTP client")?;
    let server = ReltioMcpServer::new(Arc::new(client));
    tracing::info!(
        tenant = %config.default_tenant,
        environment = %config.environment,
        "Starting Reltio MCP server on stdio"
    );

    let service = server
        .serve(stdio())
        .await
        .context("failed to start MCP server over stdio")?;

    service
        .waiting()
        .await
        .context("MCP server terminated unexpectedly")?;

    Ok(())
}
