//! Validate-then-execute pipeline shared by every tool handler.
//!
//! A statement reaches the executor only after it passed the validator with
//! the configured scope policy. The executor call is the single suspension
//! point of a request. It runs under the configured timeout and is never
//! retried.

use crate::config::GatewaySettings;
use crate::db::executor::QueryExecutor;
use crate::error::{GatewayError, GatewayResult};
use crate::models::{ResultSet, SqlStatement};
use crate::tools::format::{FormattedResult, OutputFormat, format_result};
use crate::tools::sql_validator::{self, ValidatorPolicy};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

pub struct QueryRunner {
    executor: Arc<dyn QueryExecutor>,
    settings: Arc<GatewaySettings>,
    policy: ValidatorPolicy,
}

impl QueryRunner {
    pub fn new(executor: Arc<dyn QueryExecutor>, settings: Arc<GatewaySettings>) -> Self {
        let policy = settings.validator_policy();
        Self {
            executor,
            settings,
            policy,
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Fully qualified name of a table in the configured schema.
    pub fn table(&self, name: &str) -> String {
        self.settings.table(name)
    }

    /// Resolve a caller-supplied row limit against the configured bounds.
    pub fn row_limit(&self, requested: Option<u32>) -> GatewayResult<u32> {
        match requested {
            None => Ok(self.settings.default_row_limit),
            Some(0) => Err(GatewayError::invalid_argument(
                "max_rows",
                "must be at least 1",
            )),
            Some(n) if n > self.settings.max_result_rows => Err(GatewayError::invalid_argument(
                "max_rows",
                format!("must be at most {}", self.settings.max_result_rows),
            )),
            Some(n) => Ok(n),
        }
    }

    /// Run the validator alone.
    pub fn validate(&self, sql: &str) -> GatewayResult<()> {
        sql_validator::validate_readonly(sql, &self.policy)
    }

    /// Validate and execute `statement` on behalf of `tool`.
    pub async fn run(
        &self,
        tool: &'static str,
        statement: SqlStatement,
        row_limit: u32,
    ) -> GatewayResult<ResultSet> {
        let request_id = uuid::Uuid::new_v4();
        let span = info_span!("query", %request_id, tool);
        self.run_validated(statement, row_limit)
            .instrument(span)
            .await
    }

    async fn run_validated(&self, statement: SqlStatement, row_limit: u32) -> GatewayResult<ResultSet> {
        if let Err(err) = self.validate(&statement.text) {
            warn!(kind = err.kind(), reason = %err, "Statement rejected");
            return Err(err);
        }

        debug!(
            statement = %sql_validator::normalize(&statement.text),
            params = statement.params.len(),
            executor = self.executor.name(),
            "Executing statement"
        );

        let start = Instant::now();
        let timeout = self.settings.query_timeout;
        let outcome = tokio::time::timeout(timeout, self.executor.execute(&statement, row_limit)).await;

        let result = match outcome {
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Query timed out");
                return Err(GatewayError::query_timeout(timeout.as_secs()));
            }
            Ok(Err(failure)) => return Err(failure.into()),
            Ok(Ok(result)) => result,
        };

        let mut result = result.cap(row_limit as usize);
        if result.execution_time_ms == 0 {
            result.execution_time_ms = start.elapsed().as_millis() as u64;
        }
        info!(
            row_count = result.row_count,
            truncated = result.truncated,
            execution_time_ms = result.execution_time_ms,
            "Query completed"
        );
        Ok(result)
    }

    /// Format `result` within the configured output budget.
    pub fn format(&self, result: &ResultSet, format: OutputFormat) -> FormattedResult {
        format_result(result, format, self.settings.max_output_bytes)
    }
}
