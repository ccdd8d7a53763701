//! F1 MCP Gateway Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to explore, query and chart Formula 1 data held in a Databricks SQL
//! warehouse, read-only.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::GatewayError;
pub use mcp::GatewayService;
