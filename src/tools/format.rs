//! Output formatting for tabular tool results.
//!
//! Every data tool renders its [`ResultSet`] through [`format_result`]. Column
//! order is preserved, NULL is shown as a bare `NULL` (an empty string is `""`),
//! and output is held to a byte budget by dropping trailing rows, never columns.
//! When rows are dropped a notice reports how many were shown out of the true
//! row count.

use crate::models::ResultSet;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Marker for SQL NULL and missing cells.
pub const NULL_MARKER: &str = "NULL";

/// Bytes kept free for the truncation notice.
const NOTICE_RESERVE: usize = 160;

/// Output format for tabular results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Numbered `[i] column: value` lines (default)
    #[default]
    Text,
    /// Markdown table
    Markdown,
    /// ASCII table format (like MySQL CLI)
    Table,
    /// JSON object with columns and rows
    Json,
}

/// Rendered result plus what made it into the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedResult {
    pub text: String,
    /// Rows present in `text`
    pub rendered_rows: usize,
    /// Rows in the result set, regardless of display truncation
    pub row_count: usize,
    pub truncated_for_display: bool,
}

/// Display form of a single cell.
pub fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => NULL_MARKER.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                n.as_f64().map(format_float).unwrap_or_else(|| n.to_string())
            }
        }
        JsonValue::String(s) if needs_quoting(s) => serde_json::to_string(s).unwrap_or_default(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}

/// Strings that would otherwise read as NULL, as nothing, as a field
/// separator or row break, or as an already quoted value.
fn needs_quoting(s: &str) -> bool {
    s.is_empty() || s == NULL_MARKER || s.contains(['|', '"', '\n', '\r'])
}

/// Up to four decimals, trailing zeros trimmed.
pub fn format_float(f: f64) -> String {
    let s = format!("{:.4}", f);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "" | "-" | "-0" => "0".to_string(),
        t => t.to_string(),
    }
}

fn cell<'a>(row: &'a serde_json::Map<String, JsonValue>, column: &str) -> &'a JsonValue {
    row.get(column).unwrap_or(&JsonValue::Null)
}

/// Render `result` in `format` within `max_bytes`.
pub fn format_result(result: &ResultSet, format: OutputFormat, max_bytes: usize) -> FormattedResult {
    let layout = match format {
        OutputFormat::Text => text_layout(result),
        OutputFormat::Markdown => markdown_layout(result),
        OutputFormat::Table => table_layout(result),
        OutputFormat::Json => return format_as_json(result, max_bytes),
    };
    layout.assemble(result, max_bytes)
}

/// Header, one string per row and a footer.
struct Layout {
    header: String,
    rows: Vec<String>,
    footer: String,
}

impl Layout {
    fn assemble(self, result: &ResultSet, max_bytes: usize) -> FormattedResult {
        let fixed = self.header.len() + self.footer.len();
        let all_rows: usize = self.rows.iter().map(String::len).sum();
        let fits = fixed + all_rows <= max_bytes;

        let shown = if fits {
            self.rows.len()
        } else {
            rows_within(&self.rows, max_bytes.saturating_sub(fixed + NOTICE_RESERVE))
        };

        let mut text = self.header;
        for row in &self.rows[..shown] {
            text.push_str(row);
        }
        text.push_str(&self.footer);

        let notices = notices(result, shown, !fits, max_bytes);
        if !notices.is_empty() {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&notices.join("\n"));
        }

        FormattedResult {
            text,
            rendered_rows: shown,
            row_count: result.row_count,
            truncated_for_display: !fits,
        }
    }
}

fn rows_within(rows: &[String], budget: usize) -> usize {
    let mut used = 0;
    rows.iter()
        .take_while(|r| {
            used += r.len();
            used <= budget
        })
        .count()
}

fn notices(result: &ResultSet, shown: usize, display_truncated: bool, max_bytes: usize) -> Vec<String> {
    let mut notices = Vec::new();
    if display_truncated {
        notices.push(format!(
            "... showing {} of {} rows (display limit {} reached)",
            shown,
            result.row_count,
            humansize::format_size(max_bytes, humansize::WINDOWS)
        ));
    }
    if result.truncated {
        notices.push("(result capped at the row limit)".to_string());
    }
    notices
}

fn text_layout(result: &ResultSet) -> Layout {
    let noun = if result.row_count == 1 { "row" } else { "rows" };
    let mut header = format!("Query returned {} {}\n", result.row_count, noun);
    if !result.columns.is_empty() {
        header.push_str(&format!("Columns: {}\n", result.column_names().join(", ")));
    }

    let rows = result
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let fields: Vec<String> = result
                .columns
                .iter()
                .map(|c| format!("{}: {}", c.name, format_value(cell(row, &c.name))))
                .collect();
            format!("[{}] {}\n", i + 1, fields.join(" | "))
        })
        .collect();

    Layout {
        header,
        rows,
        footer: String::new(),
    }
}

fn escape_markdown(s: &str) -> String {
    s.replace('|', "\\|").replace('\n', " ")
}

fn markdown_layout(result: &ResultSet) -> Layout {
    if result.columns.is_empty() {
        return Layout {
            header: "*Empty set*".to_string(),
            rows: Vec::new(),
            footer: String::new(),
        };
    }

    let mut header: String = result
        .columns
        .iter()
        .map(|c| format!("| {} ", escape_markdown(&c.name)))
        .collect::<String>()
        + "|\n";
    header.push_str(&(result.columns.iter().map(|_| "|---").collect::<String>() + "|\n"));

    let rows = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|c| format!("| {} ", escape_markdown(&format_value(cell(row, &c.name)))))
                .collect::<String>()
                + "|\n"
        })
        .collect();

    Layout {
        header,
        rows,
        footer: format!("\n*{} rows*", result.row_count),
    }
}

fn table_layout(result: &ResultSet) -> Layout {
    if result.columns.is_empty() {
        return Layout {
            header: "Empty set".to_string(),
            rows: Vec::new(),
            footer: String::new(),
        };
    }

    let cells: Vec<Vec<(String, bool)>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|c| {
                    let value = cell(row, &c.name);
                    (format_value(value), value.is_number())
                })
                .collect()
        })
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.name.width()).collect();
    for row in &cells {
        for (i, (text, _)) in row.iter().enumerate() {
            widths[i] = widths[i].max(text.width());
        }
    }

    // `{:width$}` pads by char count, so pad by display width by hand
    let pad = |text: &str, width: usize, right: bool| {
        let fill = " ".repeat(width.saturating_sub(text.width()));
        if right {
            format!("| {}{} ", fill, text)
        } else {
            format!("| {}{} ", text, fill)
        }
    };

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut header = separator.clone();
    header.push_str(
        &(result
            .columns
            .iter()
            .zip(&widths)
            .map(|(c, w)| pad(&c.name, *w, false))
            .collect::<String>()
            + "|\n"),
    );
    header.push_str(&separator);

    let rows = cells
        .iter()
        .map(|row| {
            row.iter()
                .zip(&widths)
                .map(|((text, numeric), w)| pad(text, *w, *numeric))
                .collect::<String>()
                + "|\n"
        })
        .collect();

    let noun = if result.row_count == 1 { "row" } else { "rows" };
    let footer = format!(
        "{}{} {} in set ({:.2} sec)\n",
        separator,
        result.row_count,
        noun,
        result.execution_time_ms as f64 / 1000.0
    );

    Layout {
        header,
        rows,
        footer,
    }
}

fn format_as_json(result: &ResultSet, max_bytes: usize) -> FormattedResult {
    let columns: Vec<JsonValue> = result
        .columns
        .iter()
        .map(|c| serde_json::json!({ "name": c.name, "type": c.type_name }))
        .collect();

    // Keys follow the column list, not the row map
    let rows: Vec<JsonValue> = result
        .rows
        .iter()
        .map(|row| {
            JsonValue::Object(
                result
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), cell(row, &c.name).clone()))
                    .collect(),
            )
        })
        .collect();

    // Per-row cost: serialized row plus separator
    let costs: Vec<usize> = rows
        .iter()
        .map(|r| serde_json::to_string(r).map(|s| s.len() + 1).unwrap_or(0))
        .collect();
    let fixed = serde_json::to_string(&columns).map(|s| s.len()).unwrap_or(0) + 64;
    let fits = fixed + costs.iter().sum::<usize>() <= max_bytes;
    let shown = if fits {
        costs.len()
    } else {
        let budget = max_bytes.saturating_sub(fixed + NOTICE_RESERVE);
        let mut used = 0;
        costs
            .iter()
            .take_while(|c| {
                used += **c;
                used <= budget
            })
            .count()
    };

    let mut object = serde_json::json!({
        "columns": columns,
        "rows": &rows[..shown],
        "row_count": result.row_count,
        "truncated": result.truncated,
    });
    let notices = notices(result, shown, !fits, max_bytes);
    if !notices.is_empty() {
        object["notice"] = JsonValue::String(notices.join(" "));
    }

    FormattedResult {
        text: object.to_string(),
        rendered_rows: shown,
        row_count: result.row_count,
        truncated_for_display: !fits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnMetadata;
    use serde_json::json;

    fn result(rows: usize) -> ResultSet {
        let rows = (0..rows)
            .map(|i| {
                let mut m = serde_json::Map::new();
                m.insert("driverName".into(), json!(format!("Driver {}", i)));
                m.insert("points".into(), json!(100.5 + i as f64));
                m.insert("team".into(), JsonValue::Null);
                m
            })
            .collect();
        ResultSet::new(
            vec![
                ColumnMetadata::new("driverName", "STRING", true),
                ColumnMetadata::new("points", "DOUBLE", true),
                ColumnMetadata::new("team", "STRING", true),
            ],
            rows,
        )
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&JsonValue::Null), "NULL");
        assert_eq!(format_value(&json!("")), "\"\"");
        assert_eq!(format_value(&json!("NULL")), "\"NULL\"");
        assert_eq!(format_value(&json!(575.0)), "575");
        assert_eq!(format_value(&json!(2.123456)), "2.1235");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!(true)), "true");
    }

    #[test]
    fn test_ambiguous_strings_are_quoted() {
        assert_eq!(format_value(&json!("a | b")), "\"a | b\"");
        assert_eq!(format_value(&json!("line1\nline2")), "\"line1\\nline2\"");
        assert_eq!(format_value(&json!("\"NULL\"")), "\"\\\"NULL\\\"\"");
        assert_eq!(format_value(&json!("Red Bull")), "Red Bull");

        let rs = ResultSet::new(
            vec![
                ColumnMetadata::new("note", "STRING", true),
                ColumnMetadata::new("season", "INT", true),
            ],
            vec![
                json!({"note": "x | season: 1999\n[2] note: y", "season": 2023}),
                json!({"note": "\"NULL\"", "season": null}),
            ]
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect(),
        );
        let out = format_result(&rs, OutputFormat::Text, 65536);
        let lines: Vec<&str> = out.text.lines().filter(|l| l.starts_with('[')).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "[1] note: \"x | season: 1999\\n[2] note: y\" | season: 2023"
        );
        assert_eq!(lines[1], "[2] note: \"\\\"NULL\\\"\" | season: NULL");
    }

    #[test]
    fn test_format_float_negative_zero() {
        assert_eq!(format_float(-0.00001), "0");
        assert_eq!(format_float(-1.5), "-1.5");
    }

    #[test]
    fn test_text_preserves_column_order() {
        let out = format_result(&result(2), OutputFormat::Text, 65536);
        assert!(out.text.starts_with("Query returned 2 rows\n"));
        assert!(out.text.contains("Columns: driverName, points, team"));
        assert!(out.text.contains("[1] driverName: Driver 0 | points: 100.5 | team: NULL"));
        assert_eq!(out.rendered_rows, 2);
        assert!(!out.truncated_for_display);
    }

    #[test]
    fn test_budget_truncates_rows() {
        let out = format_result(&result(200), OutputFormat::Text, 2048);
        assert!(out.rendered_rows < 200);
        assert_eq!(out.row_count, 200);
        assert!(out.truncated_for_display);
        assert!(out.text.contains(&format!(
            "... showing {} of 200 rows",
            out.rendered_rows
        )));
        assert!(out.text.len() <= 2048);
    }

    #[test]
    fn test_capped_result_notice() {
        let mut rs = result(3);
        rs.truncated = true;
        let out = format_result(&rs, OutputFormat::Markdown, 65536);
        assert!(out.text.contains("(result capped at the row limit)"));
        assert!(!out.truncated_for_display);
    }

    #[test]
    fn test_markdown_layout() {
        let out = format_result(&result(1), OutputFormat::Markdown, 65536);
        assert!(out.text.starts_with("| driverName | points | team |\n|---|---|---|\n"));
        assert!(out.text.contains("| Driver 0 | 100.5 | NULL |"));
        assert!(out.text.ends_with("*1 rows*"));
    }

    #[test]
    fn test_table_layout() {
        let out = format_result(&result(1), OutputFormat::Table, 65536);
        assert!(out.text.contains("| driverName | points | team |"));
        assert!(out.text.contains("1 row in set"));
    }

    #[test]
    fn test_table_unicode_width() {
        let mut row = serde_json::Map::new();
        row.insert("circuit".into(), json!("鈴鹿"));
        let rs = ResultSet::new(vec![ColumnMetadata::new("circuit", "STRING", true)], vec![row]);
        let out = format_result(&rs, OutputFormat::Table, 65536);
        assert!(out.text.contains("| circuit |"));
        assert!(out.text.contains("| 鈴鹿    |"));
    }

    #[test]
    fn test_json_layout() {
        let out = format_result(&result(2), OutputFormat::Json, 65536);
        let parsed: JsonValue = serde_json::from_str(&out.text).unwrap();
        assert_eq!(parsed["row_count"], 2);
        assert_eq!(parsed["columns"][0]["name"], "driverName");
        assert!(parsed["rows"][0]["team"].is_null());
        assert!(parsed.get("notice").is_none());
    }

    #[test]
    fn test_json_budget() {
        let out = format_result(&result(500), OutputFormat::Json, 4096);
        let parsed: JsonValue = serde_json::from_str(&out.text).unwrap();
        assert_eq!(parsed["row_count"], 500);
        assert!(parsed["rows"].as_array().unwrap().len() < 500);
        assert!(parsed["notice"].as_str().unwrap().contains("of 500 rows"));
    }

    #[test]
    fn test_empty_result() {
        let out = format_result(&ResultSet::empty(), OutputFormat::Table, 65536);
        assert_eq!(out.text, "Empty set");
        let out = format_result(&ResultSet::empty(), OutputFormat::Text, 65536);
        assert!(out.text.starts_with("Query returned 0 rows"));
    }
}
