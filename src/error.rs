//! Error types for the F1 MCP gateway.
//!
//! Every failure that crosses the tool surface is a `GatewayError`. Each variant
//! maps onto one stable taxonomy name (see [`GatewayError::kind`]) and carries a
//! message fit for the calling agent. Raw warehouse error text is logged, never
//! returned.

use crate::db::executor::{ExecutionFailure, ExecutionFailureKind};
use crate::tools::chart::ChartError;
use crate::tools::sql_validator::RejectionKind;
use schemars::JsonSchema;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Query rejected ({kind}): {message}")]
    Rejected {
        kind: RejectionKind,
        message: String,
    },

    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    #[error("Query timed out after {elapsed_secs}s")]
    QueryTimeout { elapsed_secs: u64 },

    #[error("{message}")]
    Execution {
        kind: ExecutionFailureKind,
        message: String,
    },

    #[error(transparent)]
    Render(#[from] ChartError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Create a validation rejection.
    pub fn rejected(kind: RejectionKind, message: impl Into<String>) -> Self {
        Self::Rejected {
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Create a query timeout error.
    pub fn query_timeout(elapsed_secs: u64) -> Self {
        Self::QueryTimeout { elapsed_secs }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Stable taxonomy name of this failure.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected { kind, .. } => kind.as_str(),
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::QueryTimeout { .. } => "QueryTimeout",
            Self::Execution { kind, .. } => kind.taxonomy_name(),
            Self::Render(err) => err.kind(),
            Self::Configuration { .. } => "ConfigurationError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Rejected { kind, .. } => Some(kind.suggestion()),
            Self::InvalidArgument { .. } => Some("Check the argument against the tool's schema"),
            Self::QueryTimeout { .. } => Some(
                "Narrow the query with filters or a smaller limit; the statement was not retried",
            ),
            Self::Execution { kind, .. } => Some(kind.suggestion()),
            Self::Render(err) => Some(err.suggestion()),
            Self::Configuration { .. } => None,
            Self::Internal { .. } => None,
        }
    }

    /// True for failures the caller can fix by changing the request.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Rejected { .. } | Self::InvalidArgument { .. } | Self::Render(_)
        )
    }

    /// Caller-visible `{kind, message}` payload.
    pub fn payload(&self) -> FailurePayload {
        FailurePayload {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Classify an executor failure. The raw message stays in the logs.
impl From<ExecutionFailure> for GatewayError {
    fn from(failure: ExecutionFailure) -> Self {
        tracing::warn!(
            kind = failure.kind.taxonomy_name(),
            detail = %failure.message,
            "Warehouse call failed"
        );
        let mut message = failure.kind.caller_message().to_string();
        if let Some(code) = failure.error_code.as_deref() {
            message.push_str(&format!(" (error code: {})", code));
        }
        Self::Execution {
            kind: failure.kind,
            message,
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failure shape returned to the calling agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct FailurePayload {
    pub kind: String,
    pub message: String,
}

/// Build the `data` object attached to MCP errors.
fn error_data(err: &GatewayError) -> Option<serde_json::Value> {
    Some(match err.suggestion() {
        Some(s) => serde_json::json!({ "kind": err.kind(), "suggestion": s }),
        None => serde_json::json!({ "kind": err.kind() }),
    })
}

/// Convert GatewayError to MCP ErrorData for semantic error categorization.
/// The `data` object carries the taxonomy kind and, when available, a suggestion.
impl From<GatewayError> for rmcp::ErrorData {
    fn from(err: GatewayError) -> Self {
        let data = error_data(&err);
        match &err {
            // Caller-correctable -> invalid_params
            GatewayError::Rejected { .. }
            | GatewayError::InvalidArgument { .. }
            | GatewayError::Render(_) => rmcp::ErrorData::invalid_params(err.to_string(), data),

            GatewayError::Execution { kind, .. } => match kind {
                ExecutionFailureKind::PermissionDenied | ExecutionFailureKind::StatementFailed => {
                    rmcp::ErrorData::invalid_params(err.to_string(), data)
                }
                _ => rmcp::ErrorData::internal_error(err.to_string(), data),
            },

            GatewayError::QueryTimeout { .. }
            | GatewayError::Configuration { .. }
            | GatewayError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), data)
            }
        }
    }
}
