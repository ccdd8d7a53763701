//! Ad-hoc query tool.
//!
//! This module implements the `query_f1_data` MCP tool and the tabular output
//! shape shared by every data tool.

use crate::error::GatewayResult;
use crate::models::{ResultSet, SqlStatement};
use crate::tools::format::OutputFormat;
use crate::tools::runner::QueryRunner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for the query_f1_data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryInput {
    /// Read-only SQL to run. Must start with SELECT, WITH, SHOW or DESCRIBE.
    /// Example: SELECT driverName, total_points FROM f1.f1_gold_driver_season_stats WHERE season = 2023
    pub query: String,
    /// Maximum rows to return. Default: 1000, max: 10000
    #[serde(default)]
    pub max_rows: Option<u32>,
    /// Output format: "text" (default), "markdown", "table" or "json"
    #[serde(default)]
    pub format: OutputFormat,
}

/// Tabular result returned by the data tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TabularOutput {
    /// Rendered rows in the requested format
    pub formatted: String,
    pub format: OutputFormat,
    /// Rows returned by the warehouse
    pub row_count: usize,
    /// Rows present in `formatted`
    pub rendered_rows: usize,
    /// True if the warehouse result was capped at the row limit
    pub truncated: bool,
    /// True if rows were left out of `formatted` to fit the output budget
    pub truncated_for_display: bool,
    pub execution_time_ms: u64,
}

impl TabularOutput {
    pub fn from_result(runner: &QueryRunner, result: &ResultSet, format: OutputFormat) -> Self {
        let formatted = runner.format(result, format);
        Self {
            formatted: formatted.text,
            format,
            row_count: formatted.row_count,
            rendered_rows: formatted.rendered_rows,
            truncated: result.truncated,
            truncated_for_display: formatted.truncated_for_display,
            execution_time_ms: result.execution_time_ms,
        }
    }
}

/// Handler for ad-hoc queries.
pub struct QueryToolHandler {
    runner: Arc<QueryRunner>,
}

impl QueryToolHandler {
    pub fn new(runner: Arc<QueryRunner>) -> Self {
        Self { runner }
    }

    /// Validate and run a caller-written statement.
    pub async fn query(&self, input: QueryInput) -> GatewayResult<TabularOutput> {
        let limit = self.runner.row_limit(input.max_rows)?;
        let result = self
            .runner
            .run("query_f1_data", SqlStatement::new(input.query), limit)
            .await?;

        info!(row_count = result.row_count, format = ?input.format, "Ad-hoc query served");
        Ok(TabularOutput::from_result(&self.runner, &result, input.format))
    }
}
