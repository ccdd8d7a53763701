//! Schema-related data models.
//!
//! Tables in the F1 schema follow a bronze/silver/gold naming convention
//! (`f1_bronze_*`, `f1_silver_*`, `f1_gold_*`).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Refinement layer of a table, derived from its name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DataLayer {
    Bronze,
    Silver,
    Gold,
}

impl DataLayer {
    pub const ALL: [DataLayer; 3] = [Self::Bronze, Self::Silver, Self::Gold];

    /// Table-name prefix used by this layer.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Bronze => "f1_bronze",
            Self::Silver => "f1_silver",
            Self::Gold => "f1_gold",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|layer| lower.starts_with(layer.prefix()))
    }
}

impl std::fmt::Display for DataLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bronze => write!(f, "bronze"),
            Self::Silver => write!(f, "silver"),
            Self::Gold => write!(f, "gold"),
        }
    }
}

/// Type of table object as reported by `information_schema.tables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TableType {
    Table,
    View,
    MaterializedView,
    StreamingTable,
}

impl TableType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "VIEW" => Self::View,
            "MATERIALIZED_VIEW" | "MATERIALIZED VIEW" => Self::MaterializedView,
            "STREAMING_TABLE" | "STREAMING TABLE" => Self::StreamingTable,
            // MANAGED, EXTERNAL, BASE TABLE and anything unknown
            _ => Self::Table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableInfo {
    pub name: String,
    pub table_type: TableType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, table_type: TableType) -> Self {
        Self {
            name: name.into(),
            table_type,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn layer(&self) -> Option<DataLayer> {
        DataLayer::from_table_name(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}
