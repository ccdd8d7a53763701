//! Databricks SQL warehouse executor.
//!
//! Statements go to the Statement Execution API in a single synchronous call:
//! the request asks the warehouse to wait up to `wait_timeout` and cancel the
//! statement when that expires, so there is no polling loop and no partial
//! result is ever observed.

use crate::config::{GatewaySettings, WarehouseConnection};
use crate::db::executor::{ExecutionFailure, ExecutionFailureKind, QueryExecutor};
use crate::db::params::{StatementParameter, statement_parameters};
use crate::db::types::{TypeCategory, categorize_type, decode_row};
use crate::error::{GatewayError, GatewayResult};
use crate::models::{ColumnMetadata, ResultSet, SqlStatement};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::{Duration, Instant};
use tracing::debug;

const STATEMENTS_PATH: &str = "api/2.0/sql/statements";

/// Bounds the API accepts for `wait_timeout`, in seconds.
const MIN_WAIT_SECS: u64 = 5;
const MAX_WAIT_SECS: u64 = 50;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    warehouse_id: &'a str,
    catalog: &'a str,
    schema: &'a str,
    statement: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<StatementParameter>,
    row_limit: u32,
    disposition: &'static str,
    format: &'static str,
    wait_timeout: String,
    on_wait_timeout: &'static str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    #[serde(default)]
    statement_id: Option<String>,
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultData>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Default, Deserialize)]
struct ServiceError {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    schema: Option<ManifestSchema>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ManifestColumn>,
}

#[derive(Debug, Deserialize)]
struct ManifestColumn {
    name: String,
    #[serde(default)]
    type_name: Option<String>,
    #[serde(default)]
    type_text: Option<String>,
    #[serde(default)]
    position: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ResultData {
    #[serde(default)]
    data_array: Vec<Vec<JsonValue>>,
}

/// [`QueryExecutor`] backed by a Databricks SQL warehouse.
pub struct DatabricksExecutor {
    client: Client,
    endpoint: String,
    token: String,
    warehouse_id: String,
    catalog: String,
    schema: String,
    wait_timeout_secs: u64,
}

impl std::fmt::Debug for DatabricksExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabricksExecutor")
            .field("endpoint", &self.endpoint)
            .field("warehouse_id", &self.warehouse_id)
            .field("catalog", &self.catalog)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl DatabricksExecutor {
    /// Build an executor for `connection`, scoped to the configured catalog/schema.
    pub fn new(connection: &WarehouseConnection, settings: &GatewaySettings) -> GatewayResult<Self> {
        let timeout_secs = settings.query_timeout.as_secs().max(1);
        // The handler-side timeout must fire before the HTTP client gives up.
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs + 10))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/{}",
                connection.host.as_str().trim_end_matches('/'),
                STATEMENTS_PATH
            ),
            token: connection.token.clone(),
            warehouse_id: connection.warehouse_id.clone(),
            catalog: settings.catalog.clone(),
            schema: settings.schema.clone(),
            wait_timeout_secs: timeout_secs.clamp(MIN_WAIT_SECS, MAX_WAIT_SECS),
        })
    }

    fn request<'a>(&'a self, statement: &'a SqlStatement, row_limit: u32) -> StatementRequest<'a> {
        StatementRequest {
            warehouse_id: &self.warehouse_id,
            catalog: &self.catalog,
            schema: &self.schema,
            statement: &statement.text,
            parameters: statement_parameters(statement),
            row_limit,
            disposition: "INLINE",
            format: "JSON_ARRAY",
            wait_timeout: format!("{}s", self.wait_timeout_secs),
            on_wait_timeout: "CANCEL",
        }
    }
}

#[async_trait]
impl QueryExecutor for DatabricksExecutor {
    async fn execute(
        &self,
        statement: &SqlStatement,
        row_limit: u32,
    ) -> Result<ResultSet, ExecutionFailure> {
        let start = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&self.request(statement, row_limit))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_status(status, &body));
        }

        let body: StatementResponse = response.json().await.map_err(|e| {
            ExecutionFailure::new(
                ExecutionFailureKind::WarehouseUnavailable,
                format!("Unreadable statement response: {}", e),
            )
        })?;
        debug!(
            statement_id = body.statement_id.as_deref().unwrap_or("-"),
            state = %body.status.state,
            "Statement finished"
        );

        let mut result = into_result_set(body)?.cap(row_limit as usize);
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "databricks"
    }
}

fn classify_transport_error(err: reqwest::Error) -> ExecutionFailure {
    let kind = if err.is_timeout() {
        ExecutionFailureKind::Timeout
    } else {
        ExecutionFailureKind::Connectivity
    };
    ExecutionFailure::new(kind, err.to_string())
}

fn classify_http_status(status: StatusCode, body: &str) -> ExecutionFailure {
    let kind = match status {
        StatusCode::UNAUTHORIZED => ExecutionFailureKind::Authentication,
        StatusCode::FORBIDDEN => ExecutionFailureKind::PermissionDenied,
        StatusCode::NOT_FOUND | StatusCode::TOO_MANY_REQUESTS => {
            ExecutionFailureKind::WarehouseUnavailable
        }
        s if s.is_server_error() => ExecutionFailureKind::WarehouseUnavailable,
        _ => ExecutionFailureKind::StatementFailed,
    };
    let parsed: ServiceError = serde_json::from_str(body).unwrap_or_default();
    let failure = ExecutionFailure::new(
        kind,
        format!("HTTP {}: {}", status, parsed.message.as_deref().unwrap_or(body)),
    );
    match parsed.error_code {
        Some(code) => failure.with_error_code(code),
        None => failure,
    }
}

fn classify_statement_error(error: Option<ServiceError>) -> ExecutionFailure {
    let error = error.unwrap_or_default();
    let code = error.error_code.unwrap_or_default();
    let kind = if code.contains("PERMISSION") || code.contains("UNAUTHORIZED") {
        ExecutionFailureKind::PermissionDenied
    } else {
        ExecutionFailureKind::StatementFailed
    };
    ExecutionFailure::new(
        kind,
        error
            .message
            .unwrap_or_else(|| "statement failed without a message".to_string()),
    )
    .with_error_code(code)
}

fn into_result_set(body: StatementResponse) -> Result<ResultSet, ExecutionFailure> {
    match body.status.state.as_str() {
        "SUCCEEDED" => {}
        "FAILED" => return Err(classify_statement_error(body.status.error)),
        "CANCELED" | "CLOSED" => {
            return Err(ExecutionFailure::new(
                ExecutionFailureKind::Timeout,
                format!("statement {}", body.status.state.to_lowercase()),
            ));
        }
        // PENDING/RUNNING after the wait window: the warehouse cancels it
        other => {
            return Err(ExecutionFailure::new(
                ExecutionFailureKind::Timeout,
                format!("statement still {} after wait timeout", other.to_lowercase()),
            ));
        }
    }

    let (mut manifest_columns, truncated) = match body.manifest {
        Some(m) => (m.schema.map(|s| s.columns).unwrap_or_default(), m.truncated),
        None => (Vec::new(), false),
    };
    manifest_columns.sort_by_key(|c| c.position.unwrap_or(usize::MAX));

    let columns: Vec<ColumnMetadata> = manifest_columns
        .into_iter()
        .map(|c| {
            let type_name = c
                .type_name
                .or(c.type_text)
                .unwrap_or_else(|| "STRING".to_string());
            ColumnMetadata::new(c.name, type_name, true)
        })
        .collect();
    let categories: Vec<TypeCategory> = columns
        .iter()
        .map(|c| categorize_type(&c.type_name))
        .collect();

    let rows = body
        .result
        .map(|r| r.data_array)
        .unwrap_or_default()
        .iter()
        .map(|cells| decode_row(&columns, &categories, cells))
        .collect();

    let mut result = ResultSet::new(columns, rows);
    result.truncated = truncated;
    Ok(result)
}
