//! MCP tool implementations.
//!
//! This module contains the gateway's tool handlers and the pipeline they share:
//! - `sql_validator`: read-only statement validation
//! - `runner`: validate, execute under a timeout, format
//! - `format`: size-bounded rendering of result sets
//! - `chart`: PNG rendering of result sets
//! - `query`: the ad-hoc `query_f1_data` tool
//! - `stats`: pre-built season, race and pit-stop statistics
//! - `schema`: table listing, description, sampling and overview
//! - `visualization`: chart tools
//! - `prediction`: placeholder pit-stop predictions

pub mod args;
pub mod chart;
pub mod filters;
pub mod format;
pub mod prediction;
pub mod query;
pub mod runner;
pub mod schema;
pub mod sql_validator;
pub mod stats;
pub mod visualization;

#[cfg(test)]
pub(crate) mod testing;

pub use format::{FormattedResult, OutputFormat, format_result};
pub use prediction::{PredictPitStopsInput, PredictionToolHandler};
pub use query::{QueryInput, QueryToolHandler, TabularOutput};
pub use runner::QueryRunner;
pub use schema::SchemaToolHandler;
pub use sql_validator::{RejectionKind, ValidationVerdict, ValidatorPolicy, validate};
pub use stats::StatsToolHandler;
pub use visualization::VisualizationToolHandler;
