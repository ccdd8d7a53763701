//! MCP server integration module.
//!
//! This module provides the integration between the MCP protocol and
//! the F1 tool handlers using the rmcp framework.

pub mod params;
pub mod service;

pub use service::GatewayService;
