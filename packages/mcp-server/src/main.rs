//! Blueprint MCP Server
//!
//! Standalone stdio MCP (Model Context Protocol) server for blueprint
//! outlines. AI agents write JSON-RPC requests to stdin and read responses
//! from stdout; logs go to stderr.
//!
//! Architecture:
//!   AI Agent → stdio → MCP Server → BlueprintService → TreeEngine → TursoStore (libsql file)
//!
//! # Configuration
//!
//! - `BLUEPRINT_DB_PATH`: database file, defaults to `~/.blueprint/blueprint.db`
//! - `BLUEPRINT_WEIGHT_POLICY`: `ignore`, `warn` (default) or `enforce`
//! - `BLUEPRINT_DELETE_POLICY`: `cascade` (default), `promote` or `reject`
//! - `RUST_LOG`: log filter, defaults to `blueprint_mcp=info,blueprint_core=info`
//!
//! # Usage
//!
//! ```bash
//! BLUEPRINT_DB_PATH=/tmp/blueprints.db cargo run --bin blueprint-mcp
//! ```

use anyhow::Context;
use blueprint_core::db::{DatabaseService, TursoStore};
use blueprint_core::mcp::run_mcp_server;
use blueprint_core::services::{BlueprintService, ServiceConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries JSON-RPC, so logs must go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("blueprint_mcp=info,blueprint_core=info")),
        )
        .init();

    let config = ServiceConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let db_path = config
        .resolve_database_path()
        .context("Failed to resolve database path")?;

    tracing::info!("🔧 Opening blueprint database at {}", db_path.display());
    let database = DatabaseService::new(db_path.clone())
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    let store = Arc::new(TursoStore::new(Arc::new(database)));

    let service = BlueprintService::new(store, config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize BlueprintService: {}", e))?;

    tracing::info!("🚀 blueprint-mcp ready on stdio");
    run_mcp_server(Arc::new(service)).await
}
