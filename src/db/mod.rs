//! Warehouse access layer.
//!
//! This module provides everything between a validated statement and the
//! Databricks SQL warehouse:
//! - The executor boundary handlers are written against
//! - Named parameter binding
//! - Warehouse type mappings
//! - The Statement Execution API client

pub mod executor;
pub mod params;
pub mod types;
pub mod warehouse;

pub use executor::{ExecutionFailure, ExecutionFailureKind, QueryExecutor};
pub use warehouse::DatabricksExecutor;
