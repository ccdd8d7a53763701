//! Data models for the F1 MCP gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod chart;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use chart::{
    ChartArtifact, ChartKind, ChartOptions, ChartSpec, DEFAULT_CHART_HEIGHT, DEFAULT_CHART_WIDTH,
    MAX_CHART_HEIGHT, MAX_CHART_WIDTH, PNG_MIME_TYPE,
};
pub use query::{
    ColumnMetadata, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, NamedParam, ResultSet, SqlParam,
    SqlStatement, numeric_value,
};
pub use schema::{ColumnDefinition, DataLayer, TableInfo, TableType};
