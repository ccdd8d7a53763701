//! Query-related data models.
//!
//! Statements travel to the warehouse as text plus named parameters; results
//! come back as ordered columns and JSON rows.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row limit for query results.
pub const DEFAULT_ROW_LIMIT: u32 = 1000;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u32 = 10_000;

/// A value bound to a named `:marker` in a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl SqlParam {
    /// Warehouse type name used when binding this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "BOOLEAN",
            Self::Int(_) => "BIGINT",
            Self::Float(_) => "DOUBLE",
            Self::String(_) => "STRING",
        }
    }

    /// Textual form sent on the wire. Parameter values always travel as strings.
    pub fn value_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
        }
    }
}

impl From<i64> for SqlParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for SqlParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for SqlParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for SqlParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for SqlParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedParam {
    pub name: String,
    pub value: SqlParam,
}

/// SQL text plus the values bound to its named markers.
///
/// Caller-supplied strings only ever enter a statement through [`SqlStatement::bind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlStatement {
    pub text: String,
    #[serde(default)]
    pub params: Vec<NamedParam>,
}

impl SqlStatement {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Bind a value to the `:name` marker.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<SqlParam>) -> Self {
        self.params.push(NamedParam {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn param(&self, name: &str) -> Option<&SqlParam> {
        self.params
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }
}

impl From<&str> for SqlStatement {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Warehouse type (e.g., "INT", "DOUBLE", "STRING")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }

    /// True for integral, floating and decimal column types.
    pub fn is_numeric(&self) -> bool {
        let upper = self.type_name.to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();
        matches!(
            base,
            "TINYINT"
                | "BYTE"
                | "SMALLINT"
                | "SHORT"
                | "INT"
                | "INTEGER"
                | "BIGINT"
                | "LONG"
                | "FLOAT"
                | "REAL"
                | "DOUBLE"
                | "DECIMAL"
                | "DEC"
                | "NUMERIC"
        )
    }
}

/// Rows and column metadata returned by the warehouse for one statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub row_count: usize,
    /// True when the warehouse had more rows than the requested limit.
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<serde_json::Map<String, JsonValue>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
            truncated: false,
            execution_time_ms: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Drop rows beyond `limit`, marking the result truncated when any were dropped.
    pub fn cap(mut self, limit: usize) -> Self {
        if self.rows.len() > limit {
            self.rows.truncate(limit);
            self.truncated = true;
        }
        self.row_count = self.rows.len();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Numeric view of a cell: JSON numbers, or strings that parse as finite floats.
pub fn numeric_value(value: &JsonValue) -> Option<f64> {
    let n = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}
