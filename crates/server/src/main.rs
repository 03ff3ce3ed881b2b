//! lantern server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use lantern_client::{FetchClient, FetchConfig};
use lantern_core::{AppConfig, CacheDb, CacheStore, MemoryStore, Registration, WorkerConfig};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(version = %config.version, scope = %config.scope, "Starting lantern server on stdio transport");

    let store: Arc<dyn CacheStore> = match &config.db_path {
        Some(path) => Arc::new(CacheDb::open(path).await?),
        None => Arc::new(MemoryStore::new()),
    };
    let network = Arc::new(FetchClient::new(FetchConfig::from_app(&config))?);
    let registration = Arc::new(Registration::new(store, network));

    // A failed install leaves the server up without an active worker; sw_install retries.
    match registration.install(WorkerConfig::from_app(&config)?).await {
        Ok(report) => tracing::info!(core = report.core_cached.len(), large = report.large_cached.len(), "installed"),
        Err(e) => tracing::warn!(error = %e, "initial install failed"),
    }

    let handler = handler::LanternServer::new(config, registration);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
