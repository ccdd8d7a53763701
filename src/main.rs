//! F1 MCP Gateway - Main entry point.
//!
//! This server provides MCP (Model Context Protocol) tools for AI assistants
//! to query and chart Formula 1 data in a Databricks SQL warehouse.

use clap::Parser;
use f1_mcp_gateway::config::{Config, TransportMode};
use f1_mcp_gateway::db::DatabricksExecutor;
use f1_mcp_gateway::tools::QueryRunner;
use f1_mcp_gateway::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter = if config.enable_logs {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    } else {
        EnvFilter::new("off")
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    let (settings, connection) = match config.settings().and_then(|settings| {
        config
            .warehouse()
            .map(|connection| (settings, connection))
    }) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Usage: f1-mcp-gateway --databricks-host <url> --databricks-token <token> --warehouse-id <id>");
            eprintln!();
            eprintln!("Every flag can also come from the environment:");
            eprintln!("  DATABRICKS_HOST, DATABRICKS_TOKEN, DATABRICKS_WAREHOUSE_ID,");
            eprintln!("  DATABRICKS_CATALOG (default workspace), DATABRICKS_SCHEMA (default f1)");
            std::process::exit(1);
        }
    };

    info!(
        transport = %config.transport,
        scope = %settings.qualified_schema(),
        warehouse = ?connection,
        "Starting F1 MCP Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let settings = Arc::new(settings);
    let executor = Arc::new(DatabricksExecutor::new(&connection, &settings)?);
    let runner = Arc::new(QueryRunner::new(executor, settings));

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(runner).run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                runner,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
