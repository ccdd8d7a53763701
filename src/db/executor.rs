//! Query executor boundary.
//!
//! Handlers talk to the warehouse only through [`QueryExecutor`]. Implementations
//! receive statements that already passed validation and perform no safety
//! checks of their own. They return either a [`ResultSet`] or an
//! [`ExecutionFailure`] whose `message` may contain raw warehouse text; callers
//! classify it before anything reaches the agent.

use crate::models::{ResultSet, SqlStatement};
use async_trait::async_trait;
use serde::Serialize;

/// Category of a failed warehouse call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ExecutionFailureKind {
    Connectivity,
    Authentication,
    PermissionDenied,
    WarehouseUnavailable,
    Timeout,
    StatementFailed,
}

impl ExecutionFailureKind {
    /// Taxonomy name exposed to callers.
    pub fn taxonomy_name(&self) -> &'static str {
        match self {
            Self::Connectivity => "ConnectivityFailure",
            Self::Authentication => "AuthenticationFailure",
            Self::PermissionDenied => "PermissionDenied",
            Self::WarehouseUnavailable => "WarehouseUnavailable",
            Self::Timeout => "QueryTimeout",
            Self::StatementFailed => "StatementFailed",
        }
    }

    /// Fixed caller-facing description.
    pub fn caller_message(&self) -> &'static str {
        match self {
            Self::Connectivity => "Could not reach the SQL warehouse",
            Self::Authentication => "The SQL warehouse rejected the configured access token",
            Self::PermissionDenied => "The configured credentials lack permission for this query",
            Self::WarehouseUnavailable => "The SQL warehouse is unavailable or still starting",
            Self::Timeout => "The SQL warehouse did not finish the statement in time",
            Self::StatementFailed => "The SQL warehouse could not run the statement",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Connectivity => "Check network connectivity and the configured host",
            Self::Authentication => "Verify the access token configured for the gateway",
            Self::PermissionDenied => "Query a table the configured credentials can read",
            Self::WarehouseUnavailable => "Wait for the warehouse to start, then call the tool again",
            Self::Timeout => "Narrow the query with filters or a smaller limit",
            Self::StatementFailed => {
                "Check table and column names with list_f1_tables and describe_table"
            }
        }
    }
}

/// A failed warehouse call. `message` is for logs only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionFailure {
    pub kind: ExecutionFailureKind,
    pub message: String,
    /// Machine-readable error class reported by the warehouse, if any.
    pub error_code: Option<String>,
}

impl ExecutionFailure {
    pub fn new(kind: ExecutionFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            error_code: None,
        }
    }

    /// Attach a warehouse error code. Only `[A-Z0-9_]` characters are kept.
    pub fn with_error_code(mut self, code: impl AsRef<str>) -> Self {
        let cleaned: String = code
            .as_ref()
            .chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '_')
            .take(64)
            .collect();
        self.error_code = (!cleaned.is_empty()).then_some(cleaned);
        self
    }
}

impl std::fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ExecutionFailure {}

/// Runs validated statements against the warehouse.
///
/// One call is one suspension point: no partial results are observable before
/// it returns.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Execute `statement`, returning at most `row_limit` rows.
    ///
    /// When the warehouse holds more rows than `row_limit`, the excess is
    /// dropped and `truncated` is set.
    async fn execute(
        &self,
        statement: &SqlStatement,
        row_limit: u32,
    ) -> Result<ResultSet, ExecutionFailure>;

    /// Name of this executor for logging.
    fn name(&self) -> &'static str;
}
