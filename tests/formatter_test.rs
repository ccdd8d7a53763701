//! Tests for tabular result formatting: column order, NULL marking and the
//! display byte budget.

use f1_mcp_gateway::models::{ColumnMetadata, ResultSet};
use f1_mcp_gateway::tools::format::{NULL_MARKER, OutputFormat, format_result};
use serde_json::{Map, Value as JsonValue, json};

const BUDGET: usize = 64 * 1024;

/// Columns deliberately out of alphabetical order.
fn standings(n: usize) -> ResultSet {
    let columns = vec![
        ColumnMetadata::new("season", "INT", false),
        ColumnMetadata::new("driver", "STRING", false),
        ColumnMetadata::new("points", "DOUBLE", true),
    ];
    let rows = (0..n)
        .map(|i| {
            let mut row = Map::new();
            row.insert("season".into(), json!(2023));
            row.insert("driver".into(), json!(format!("Driver {}", i + 1)));
            row.insert("points".into(), json!(400.5 - i as f64));
            row
        })
        .collect();
    ResultSet::new(columns, rows)
}

fn numbered_lines(text: &str) -> usize {
    text.lines().filter(|l| l.starts_with('[')).count()
}

#[test]
fn test_text_renders_every_row_in_column_order() {
    let result = standings(7);
    let formatted = format_result(&result, OutputFormat::Text, BUDGET);

    assert_eq!(formatted.rendered_rows, 7);
    assert_eq!(formatted.row_count, 7);
    assert!(!formatted.truncated_for_display);
    assert_eq!(numbered_lines(&formatted.text), 7);
    assert!(formatted.text.contains("Columns: season, driver, points"));
    assert!(
        formatted
            .text
            .contains("[1] season: 2023 | driver: Driver 1 | points: 400.5")
    );
    assert!(formatted.text.contains("[7] season: 2023 | driver: Driver 7"));
}

#[test]
fn test_markdown_and_table_keep_column_order() {
    let result = standings(3);

    let markdown = format_result(&result, OutputFormat::Markdown, BUDGET);
    assert!(markdown.text.starts_with("| season | driver | points |"));
    assert_eq!(markdown.rendered_rows, 3);

    let table = format_result(&result, OutputFormat::Table, BUDGET);
    let header = table.text.lines().nth(1).unwrap_or_default();
    let season = header.find("season").unwrap();
    let driver = header.find("driver").unwrap();
    let points = header.find("points").unwrap();
    assert!(season < driver && driver < points);
    assert!(table.text.contains("3 rows in set"));
}

#[test]
fn test_json_keeps_column_list_order() {
    let formatted = format_result(&standings(2), OutputFormat::Json, BUDGET);
    let parsed: JsonValue = serde_json::from_str(&formatted.text).unwrap();
    let names: Vec<&str> = parsed["columns"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["name"].as_str())
        .collect();
    assert_eq!(names, vec!["season", "driver", "points"]);
    assert_eq!(formatted.rendered_rows, 2);

    let keys: Vec<&str> = parsed["rows"][0]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["season", "driver", "points"]);
}

#[test]
fn test_json_row_keys_follow_columns_not_row_map() {
    let columns = vec![
        ColumnMetadata::new("season", "INT", false),
        ColumnMetadata::new("driverName", "STRING", false),
    ];
    let mut row = Map::new();
    row.insert("driverName".into(), json!("HAM"));
    row.insert("season".into(), json!(2023));
    let result = ResultSet::new(columns, vec![row]);

    let formatted = format_result(&result, OutputFormat::Json, BUDGET);
    assert!(
        formatted
            .text
            .contains(r#""rows":[{"season":2023,"driverName":"HAM"}]"#),
        "{}",
        formatted.text
    );
}

#[test]
fn test_null_is_distinct_from_empty_string() {
    let columns = vec![
        ColumnMetadata::new("driver", "STRING", true),
        ColumnMetadata::new("status", "STRING", true),
    ];
    let mut missing = Map::new();
    missing.insert("driver".into(), json!("Driver A"));
    missing.insert("status".into(), JsonValue::Null);
    let mut empty = Map::new();
    empty.insert("driver".into(), json!("Driver B"));
    empty.insert("status".into(), json!(""));
    let mut absent = Map::new();
    absent.insert("driver".into(), json!("Driver C"));
    let result = ResultSet::new(columns, vec![missing, empty, absent]);

    let text = format_result(&result, OutputFormat::Text, BUDGET).text;
    assert!(text.contains(&format!("driver: Driver A | status: {}", NULL_MARKER)));
    assert!(text.contains("driver: Driver B | status: \"\""));
    assert!(text.contains(&format!("driver: Driver C | status: {}", NULL_MARKER)));
}

#[test]
fn test_over_budget_truncates_rows_and_reports_true_count() {
    let result = standings(500);
    for format in [OutputFormat::Text, OutputFormat::Markdown, OutputFormat::Table] {
        let formatted = format_result(&result, format, 4096);
        assert!(formatted.truncated_for_display, "{:?}", format);
        assert!(formatted.rendered_rows < 500, "{:?}", format);
        assert!(formatted.rendered_rows > 0, "{:?}", format);
        assert_eq!(formatted.row_count, 500);
        assert!(
            formatted.text.contains(&format!(
                "showing {} of 500 rows",
                formatted.rendered_rows
            )),
            "{:?}",
            format
        );
    }

    let text = format_result(&result, OutputFormat::Text, 4096);
    assert_eq!(numbered_lines(&text.text), text.rendered_rows);
    // Whole rows are dropped; every shown row keeps all three columns
    for line in text.text.lines().filter(|l| l.starts_with('[')) {
        assert!(line.contains("season:") && line.contains("driver:") && line.contains("points:"));
    }
}

#[test]
fn test_row_limit_truncation_is_noted() {
    let result = standings(10).cap(4);
    assert!(result.truncated);
    let formatted = format_result(&result, OutputFormat::Text, BUDGET);
    assert_eq!(formatted.row_count, 4);
    assert!(formatted.text.contains("(result capped at the row limit)"));
}

#[test]
fn test_formatting_does_not_touch_input() {
    let result = standings(20);
    let before = result.clone();
    let _ = format_result(&result, OutputFormat::Table, 512);
    assert_eq!(result, before);
}
