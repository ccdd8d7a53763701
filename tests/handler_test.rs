//! End-to-end tests of the tool handlers against a stub warehouse.

use async_trait::async_trait;
use f1_mcp_gateway::config::GatewaySettings;
use f1_mcp_gateway::db::{ExecutionFailure, ExecutionFailureKind, QueryExecutor};
use f1_mcp_gateway::models::{ColumnMetadata, ResultSet, SqlParam, SqlStatement};
use f1_mcp_gateway::tools::query::QueryInput;
use f1_mcp_gateway::tools::sql_validator::{ValidatorPolicy, validate};
use f1_mcp_gateway::tools::stats::DriverSeasonStatsInput;
use f1_mcp_gateway::tools::visualization::{CustomChartInput, DriverPerformanceInput};
use f1_mcp_gateway::tools::{
    OutputFormat, QueryRunner, QueryToolHandler, StatsToolHandler, VisualizationToolHandler,
};
use serde_json::{Map, Value as JsonValue, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Behavior {
    Rows(ResultSet),
    Sleep(Duration),
    Fail(ExecutionFailure),
}

/// Records every statement it receives.
struct StubWarehouse {
    behavior: Behavior,
    calls: AtomicUsize,
    statements: Mutex<Vec<(SqlStatement, u32)>>,
}

impl StubWarehouse {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            statements: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn statements(&self) -> Vec<(SqlStatement, u32)> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for StubWarehouse {
    async fn execute(
        &self,
        statement: &SqlStatement,
        row_limit: u32,
    ) -> Result<ResultSet, ExecutionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.statements
            .lock()
            .unwrap()
            .push((statement.clone(), row_limit));
        match &self.behavior {
            Behavior::Rows(result) => Ok(result.clone()),
            Behavior::Sleep(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(ResultSet::empty())
            }
            Behavior::Fail(failure) => Err(failure.clone()),
        }
    }

    fn name(&self) -> &'static str {
        "stub-warehouse"
    }
}

fn runner(warehouse: Arc<StubWarehouse>, settings: GatewaySettings) -> Arc<QueryRunner> {
    Arc::new(QueryRunner::new(warehouse, Arc::new(settings)))
}

fn result(columns: &[(&str, &str)], rows: Vec<JsonValue>) -> ResultSet {
    ResultSet::new(
        columns
            .iter()
            .map(|(name, ty)| ColumnMetadata::new(*name, *ty, true))
            .collect(),
        rows.into_iter()
            .filter_map(|row| match row {
                JsonValue::Object(map) => Some(map),
                _ => None,
            })
            .collect::<Vec<Map<String, JsonValue>>>(),
    )
}

fn driver_stats_rows() -> ResultSet {
    result(
        &[
            ("season", "INT"),
            ("driverName", "STRING"),
            ("teamName", "STRING"),
            ("total_points", "DOUBLE"),
        ],
        vec![
            json!({"season": 2023, "driverName": "Lewis Hamilton", "teamName": "Mercedes", "total_points": 234.0}),
            json!({"season": 2023, "driverName": "Hamza Test", "teamName": "Williams", "total_points": 3.0}),
            json!({"season": 2023, "driverName": "Graham Example", "teamName": "Haas", "total_points": 12.0}),
        ],
    )
}

#[tokio::test]
async fn test_driver_season_stats_end_to_end() {
    let warehouse = StubWarehouse::new(Behavior::Rows(driver_stats_rows()));
    let handler = StatsToolHandler::new(runner(warehouse.clone(), GatewaySettings::default()));

    let output = handler
        .driver_season_stats(DriverSeasonStatsInput {
            driver: Some("HAM".to_string()),
            season: Some(2023),
            ..Default::default()
        })
        .await
        .unwrap();

    let statements = warehouse.statements();
    assert_eq!(statements.len(), 1);
    let (statement, row_limit) = &statements[0];
    assert_eq!(*row_limit, 50);

    // Filters are bound, never spliced into the text
    assert!(validate(&statement.text, &ValidatorPolicy::default()).allowed);
    assert!(!statement.text.contains("HAM"));
    assert!(statement.text.contains("workspace.f1.f1_gold_driver_season_stats"));
    assert_eq!(
        statement.param("driver_name"),
        Some(&SqlParam::String("HAM".to_string()))
    );
    assert_eq!(statement.param("season"), Some(&SqlParam::Int(2023)));

    assert_eq!(output.row_count, 3);
    assert_eq!(output.rendered_rows, 3);
    assert_eq!(output.format, OutputFormat::Text);
    let rows: Vec<&str> = output
        .formatted
        .lines()
        .filter(|l| l.starts_with('['))
        .collect();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].starts_with("[1] season: 2023 | driverName: Lewis Hamilton"));
    assert!(rows[1].contains("Hamza Test"));
    assert!(rows[2].contains("Graham Example"));
}

#[tokio::test]
async fn test_timeout_is_reported_and_not_retried() {
    let warehouse = StubWarehouse::new(Behavior::Sleep(Duration::from_secs(5)));
    let settings = GatewaySettings {
        query_timeout: Duration::from_millis(50),
        ..GatewaySettings::default()
    };
    let handler = QueryToolHandler::new(runner(warehouse.clone(), settings));

    let err = handler
        .query(QueryInput {
            query: "SELECT * FROM f1_gold_driver_season_stats".to_string(),
            max_rows: None,
            format: OutputFormat::Text,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "QueryTimeout");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(warehouse.calls(), 1);
}

#[tokio::test]
async fn test_rejected_statement_never_reaches_warehouse() {
    let warehouse = StubWarehouse::new(Behavior::Rows(driver_stats_rows()));
    let runner = runner(warehouse.clone(), GatewaySettings::default());

    let err = QueryToolHandler::new(runner.clone())
        .query(QueryInput {
            query: "SELECT 1; DROP TABLE f1_gold_driver_season_stats".to_string(),
            max_rows: None,
            format: OutputFormat::Text,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "MultipleStatements");

    let err = VisualizationToolHandler::new(runner)
        .custom_chart(CustomChartInput {
            query: "DELETE FROM f1_silver_results".to_string(),
            x_column: "season".to_string(),
            y_column: "points".to_string(),
            chart_type: Default::default(),
            title: None,
            group_column: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "DisallowedStatementKind");
    assert_eq!(warehouse.calls(), 0);
}

#[tokio::test]
async fn test_invalid_argument_never_reaches_warehouse() {
    let warehouse = StubWarehouse::new(Behavior::Rows(driver_stats_rows()));
    let handler = StatsToolHandler::new(runner(warehouse.clone(), GatewaySettings::default()));

    let err = handler
        .driver_season_stats(DriverSeasonStatsInput {
            season: Some(1890),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidArgument");
    assert_eq!(warehouse.calls(), 0);
}

#[tokio::test]
async fn test_execution_failure_is_classified() {
    let failure = ExecutionFailure::new(
        ExecutionFailureKind::PermissionDenied,
        "User alice@corp lacks SELECT on catalog hr",
    )
    .with_error_code("PERMISSION_DENIED");
    let warehouse = StubWarehouse::new(Behavior::Fail(failure));
    let handler = QueryToolHandler::new(runner(warehouse.clone(), GatewaySettings::default()));

    let err = handler
        .query(QueryInput {
            query: "SELECT 1".to_string(),
            max_rows: Some(10),
            format: OutputFormat::Json,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "PermissionDenied");
    let payload = err.payload();
    assert!(!payload.message.contains("alice"));
    assert!(payload.message.contains("PERMISSION_DENIED"));
    assert_eq!(warehouse.calls(), 1);
}

#[tokio::test]
async fn test_driver_performance_chart() {
    let rows = result(
        &[
            ("season", "INT"),
            ("driverName", "STRING"),
            ("teamName", "STRING"),
            ("total_points", "DOUBLE"),
        ],
        vec![
            json!({"season": 2021, "driverName": "Max Verstappen", "teamName": "Red Bull", "total_points": 395.5}),
            json!({"season": 2022, "driverName": "Max Verstappen", "teamName": "Red Bull", "total_points": 454.0}),
            json!({"season": 2023, "driverName": "Max Verstappen", "teamName": "Red Bull", "total_points": 575.0}),
        ],
    );
    let warehouse = StubWarehouse::new(Behavior::Rows(rows));
    let handler = VisualizationToolHandler::new(runner(warehouse.clone(), GatewaySettings::default()));

    let output = handler
        .driver_performance(DriverPerformanceInput {
            driver: "Verstappen".to_string(),
            metric: Default::default(),
            chart_type: Default::default(),
        })
        .await
        .unwrap();

    assert_eq!(output.driver, "Max Verstappen");
    assert_eq!(output.seasons_covered, vec![2021, 2023]);
    assert_eq!(output.chart.mime_type, "image/png");
    assert!(output.chart.description.contains("2021, 2022, 2023"));

    let statements = warehouse.statements();
    assert!(!statements[0].0.text.contains("Verstappen"));
}

#[tokio::test]
async fn test_row_limit_bounds() {
    let warehouse = StubWarehouse::new(Behavior::Rows(driver_stats_rows()));
    let handler = QueryToolHandler::new(runner(warehouse.clone(), GatewaySettings::default()));

    let err = handler
        .query(QueryInput {
            query: "SELECT 1".to_string(),
            max_rows: Some(50_000),
            format: OutputFormat::Text,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "InvalidArgument");

    let output = handler
        .query(QueryInput {
            query: "SELECT * FROM f1_gold_driver_season_stats".to_string(),
            max_rows: Some(2),
            format: OutputFormat::Text,
        })
        .await
        .unwrap();
    assert_eq!(output.row_count, 2);
    assert!(output.truncated);
    assert_eq!(warehouse.statements()[0].1, 2);
}
