//! Test doubles for handler tests.

use crate::config::GatewaySettings;
use crate::db::executor::{ExecutionFailure, QueryExecutor};
use crate::models::{ColumnMetadata, ResultSet, SqlStatement};
use crate::tools::runner::QueryRunner;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};

/// Executor returning a fixed result and recording every call.
pub struct StubExecutor {
    result: ResultSet,
    seen: Mutex<Vec<(SqlStatement, u32)>>,
}

impl StubExecutor {
    pub fn new(columns: &[(&str, &str)], rows: Vec<JsonValue>) -> Arc<Self> {
        let columns = columns
            .iter()
            .map(|(name, ty)| ColumnMetadata::new(*name, *ty, true))
            .collect();
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                JsonValue::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        Arc::new(Self {
            result: ResultSet::new(columns, rows),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Columns inferred from the first row, all typed by their JSON value.
    pub fn with_rows(rows: Vec<JsonValue>) -> Arc<Self> {
        let columns: Vec<(String, &str)> = rows
            .first()
            .and_then(JsonValue::as_object)
            .map(|first| {
                first
                    .iter()
                    .map(|(name, value)| {
                        let ty = match value {
                            JsonValue::Number(n) if n.is_i64() => "bigint",
                            JsonValue::Number(_) => "double",
                            JsonValue::Bool(_) => "boolean",
                            _ => "string",
                        };
                        (name.clone(), ty)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let refs: Vec<(&str, &str)> = columns.iter().map(|(n, t)| (n.as_str(), *t)).collect();
        Self::new(&refs, rows)
    }

    pub fn result(&self) -> ResultSet {
        self.result.clone()
    }

    pub fn statements(&self) -> Vec<(SqlStatement, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn execute(
        &self,
        statement: &SqlStatement,
        row_limit: u32,
    ) -> Result<ResultSet, ExecutionFailure> {
        self.seen
            .lock()
            .unwrap()
            .push((statement.clone(), row_limit));
        Ok(self.result.clone())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub fn runner_with(executor: Arc<StubExecutor>) -> Arc<QueryRunner> {
    Arc::new(QueryRunner::new(executor, Arc::new(GatewaySettings::default())))
}
