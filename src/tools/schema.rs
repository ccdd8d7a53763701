//! Schema introspection tools.
//!
//! This module implements the `list_f1_tables`, `describe_table`,
//! `get_table_sample` and `get_f1_data_overview` MCP tools.

use crate::error::{GatewayError, GatewayResult};
use crate::models::{ColumnDefinition, DataLayer, ResultSet, SqlStatement, TableInfo, TableType};
use crate::tools::args;
use crate::tools::format::OutputFormat;
use crate::tools::query::TabularOutput;
use crate::tools::runner::QueryRunner;
use crate::tools::stats::{CONSTRUCTOR_STATS_TABLE, DRIVER_STATS_TABLE, RACE_FEATURES_TABLE};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

const MAX_SAMPLE_ROWS: u32 = 20;
const DEFAULT_SAMPLE_ROWS: u32 = 5;

/// Gold tables summarized by get_f1_data_overview: (short name, table, description, use case).
const GOLD_TABLES: [(&str, &str, &str, &str); 3] = [
    (
        "driver_season_stats",
        DRIVER_STATS_TABLE,
        "Aggregated driver performance by season: wins, podiums, points, championship \
         position, average grid/finish positions.",
        "Driver performance analysis, championship trends",
    ),
    (
        "constructor_season_stats",
        CONSTRUCTOR_STATS_TABLE,
        "Aggregated team/constructor performance by season: total points, wins, podiums, \
         championship standings.",
        "Team performance analysis, constructor comparisons",
    ),
    (
        "race_driver_features",
        RACE_FEATURES_TABLE,
        "Detailed race-level features for each driver: grid position, finish position, pit \
         stops, lap times, qualifying data.",
        "Race predictions, pit stop analysis, detailed insights",
    ),
];

fn default_true() -> bool {
    true
}

/// Input for the list_f1_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Include raw bronze layer tables. Default: false
    #[serde(default)]
    pub include_bronze: bool,
    /// Include cleaned silver layer tables. Default: true
    #[serde(default = "default_true")]
    pub include_silver: bool,
    /// Include aggregated gold layer tables. Default: true
    #[serde(default = "default_true")]
    pub include_gold: bool,
}

impl Default for ListTablesInput {
    fn default() -> Self {
        Self {
            include_bronze: false,
            include_silver: true,
            include_gold: true,
        }
    }
}

impl ListTablesInput {
    fn layers(&self) -> Vec<DataLayer> {
        DataLayer::ALL
            .into_iter()
            .filter(|layer| match layer {
                DataLayer::Bronze => self.include_bronze,
                DataLayer::Silver => self.include_silver,
                DataLayer::Gold => self.include_gold,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct TablesByLayer {
    pub bronze: Vec<TableInfo>,
    pub silver: Vec<TableInfo>,
    pub gold: Vec<TableInfo>,
}

impl TablesByLayer {
    fn push(&mut self, table: TableInfo) {
        match table.layer() {
            Some(DataLayer::Bronze) => self.bronze.push(table),
            Some(DataLayer::Silver) => self.silver.push(table),
            Some(DataLayer::Gold) => self.gold.push(table),
            None => {}
        }
    }
}

/// Output from the list_f1_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    /// Schema the tables live in (`catalog.schema`)
    pub schema: String,
    pub tables_by_layer: TablesByLayer,
    /// Total number of tables returned
    pub count: usize,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table name, e.g. "f1_gold_driver_season_stats". A catalog/schema prefix is ignored.
    pub table_name: String,
}

/// Output from the describe_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    pub table_name: String,
    pub full_table_name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Readable column listing
    pub formatted: String,
}

/// Input for the get_table_sample tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableSampleInput {
    /// Table name, e.g. "f1_silver_results". A catalog/schema prefix is ignored.
    pub table_name: String,
    /// Number of sample rows. Default: 5, max: 20
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TableOverview {
    pub table_name: String,
    pub full_table_name: String,
    pub row_count: Option<i64>,
    pub min_season: Option<i64>,
    pub max_season: Option<i64>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct RecommendedTable {
    pub name: String,
    pub use_case: String,
}

/// Output from the get_f1_data_overview tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DataOverviewOutput {
    pub tables: Vec<TableOverview>,
    pub recommended_tables: Vec<RecommendedTable>,
}

/// Handler for schema introspection.
pub struct SchemaToolHandler {
    runner: Arc<QueryRunner>,
}

impl SchemaToolHandler {
    pub fn new(runner: Arc<QueryRunner>) -> Self {
        Self { runner }
    }

    /// List F1 tables of the requested layers, grouped by layer.
    pub async fn list_tables(&self, input: ListTablesInput) -> GatewayResult<ListTablesOutput> {
        let layers = input.layers();
        if layers.is_empty() {
            return Err(GatewayError::invalid_argument(
                "include_gold",
                "at least one layer must be included",
            ));
        }

        let settings = self.runner.settings();
        let layer_filter = layers
            .iter()
            .map(|layer| format!("table_name LIKE '{}%'", layer.prefix()))
            .collect::<Vec<_>>()
            .join(" OR ");
        let sql = format!(
            "SELECT table_name, table_type, comment FROM {}.information_schema.tables \
             WHERE table_schema = :schema AND ({}) ORDER BY table_name",
            settings.catalog, layer_filter
        );
        let stmt = SqlStatement::new(sql).bind("schema", settings.schema.as_str());

        let limit = settings.max_result_rows;
        let result = self.runner.run("list_f1_tables", stmt, limit).await?;

        let mut tables_by_layer = TablesByLayer::default();
        for row in &result.rows {
            let Some(name) = text(row.get("table_name")) else {
                continue;
            };
            let table_type = text(row.get("table_type"))
                .map(|t| TableType::parse(&t))
                .unwrap_or(TableType::Table);
            let mut table = TableInfo::new(name, table_type);
            if let Some(comment) = text(row.get("comment")) {
                table = table.with_comment(comment);
            }
            tables_by_layer.push(table);
        }

        let count =
            tables_by_layer.bronze.len() + tables_by_layer.silver.len() + tables_by_layer.gold.len();
        info!(count, layers = ?layers, "Listed tables");

        Ok(ListTablesOutput {
            schema: settings.qualified_schema(),
            tables_by_layer,
            count,
        })
    }

    /// Column definitions of one table from `information_schema.columns`.
    pub async fn describe_table(
        &self,
        input: DescribeTableInput,
    ) -> GatewayResult<DescribeTableOutput> {
        let table_name = args::table_identifier(&input.table_name)?;
        let settings = self.runner.settings();

        let sql = format!(
            "SELECT column_name, data_type, is_nullable, comment \
             FROM {}.information_schema.columns \
             WHERE table_schema = :schema AND table_name = :table_name \
             ORDER BY ordinal_position",
            settings.catalog
        );
        let stmt = SqlStatement::new(sql)
            .bind("schema", settings.schema.as_str())
            .bind("table_name", table_name.as_str());

        let result = self
            .runner
            .run("describe_table", stmt, settings.max_result_rows)
            .await?;

        let columns = column_definitions(&result);
        let formatted = describe_text(&table_name, &columns);
        Ok(DescribeTableOutput {
            full_table_name: self.runner.table(&table_name),
            table_name,
            columns,
            formatted,
        })
    }

    /// First rows of a table, at most 20.
    pub async fn table_sample(&self, input: TableSampleInput) -> GatewayResult<TabularOutput> {
        let table_name = args::table_identifier(&input.table_name)?;
        let limit = args::bounded("limit", input.limit, DEFAULT_SAMPLE_ROWS, MAX_SAMPLE_ROWS)?;

        let sql = format!("SELECT * FROM {} LIMIT {}", self.runner.table(&table_name), limit);
        let result = self
            .runner
            .run("get_table_sample", SqlStatement::new(sql), limit)
            .await?;
        Ok(TabularOutput::from_result(&self.runner, &result, input.format))
    }

    /// Row counts and season ranges of the gold tables.
    pub async fn data_overview(&self) -> GatewayResult<DataOverviewOutput> {
        let sql = GOLD_TABLES
            .iter()
            .map(|(short, table, _, _)| {
                format!(
                    "SELECT '{}' AS table_name, COUNT(*) AS row_count, MIN(season) AS min_season, \
                     MAX(season) AS max_season FROM {}",
                    short,
                    self.runner.table(table)
                )
            })
            .collect::<Vec<_>>()
            .join(" UNION ALL ");

        let result = self
            .runner
            .run("get_f1_data_overview", SqlStatement::new(sql), GOLD_TABLES.len() as u32)
            .await?;

        let tables = GOLD_TABLES
            .iter()
            .map(|(short, table, description, _)| {
                let row = result
                    .rows
                    .iter()
                    .find(|row| row.get("table_name").and_then(JsonValue::as_str) == Some(*short));
                let int = |column: &str| row.and_then(|r| r.get(column)).and_then(integer);
                TableOverview {
                    table_name: short.to_string(),
                    full_table_name: self.runner.table(table),
                    row_count: int("row_count"),
                    min_season: int("min_season"),
                    max_season: int("max_season"),
                    description: description.to_string(),
                }
            })
            .collect();

        let recommended_tables = GOLD_TABLES
            .iter()
            .map(|(_, table, _, use_case)| RecommendedTable {
                name: self.runner.table(table),
                use_case: use_case.to_string(),
            })
            .collect();

        Ok(DataOverviewOutput {
            tables,
            recommended_tables,
        })
    }
}

fn text(value: Option<&JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn integer(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn column_definitions(result: &ResultSet) -> Vec<ColumnDefinition> {
    result
        .rows
        .iter()
        .filter_map(|row| {
            let name = text(row.get("column_name"))?;
            let data_type = text(row.get("data_type")).unwrap_or_else(|| "unknown".to_string());
            let nullable = text(row.get("is_nullable"))
                .map(|v| v.eq_ignore_ascii_case("YES"))
                .unwrap_or(true);
            let column = ColumnDefinition::new(name, data_type, nullable);
            Some(match text(row.get("comment")) {
                Some(comment) => column.with_comment(comment),
                None => column,
            })
        })
        .collect()
}

fn describe_text(table_name: &str, columns: &[ColumnDefinition]) -> String {
    if columns.is_empty() {
        return format!("No columns found for table '{}'.", table_name);
    }
    let mut lines = vec![format!("Schema for '{}':", table_name), String::new()];
    for column in columns {
        let nullability = if column.nullable { "NULL" } else { "NOT NULL" };
        let mut line = format!("  - {}: {} ({})", column.name, column.data_type, nullability);
        if let Some(comment) = &column.comment {
            line.push_str(" -- ");
            line.push_str(comment);
        }
        lines.push(line);
    }
    lines.join("\n")
}
