//! Tests for chart rendering: dataset filtering, typed failures and the
//! encoded PNG artifact.

use base64::Engine;
use f1_mcp_gateway::models::{
    ChartKind, ChartSpec, ColumnMetadata, MAX_CHART_HEIGHT, MAX_CHART_WIDTH, PNG_MIME_TYPE,
    ResultSet,
};
use f1_mcp_gateway::tools::chart::{ChartError, render};
use serde_json::{Map, Value as JsonValue, json};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

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

fn race_rows() -> ResultSet {
    result(
        &[
            ("driver", "STRING"),
            ("grid", "INT"),
            ("finish", "INT"),
            ("points", "DOUBLE"),
            ("pit_ms", "BIGINT"),
        ],
        vec![
            json!({"driver": "VER", "grid": 1, "finish": 1, "points": 25.0, "pit_ms": 2300}),
            json!({"driver": "PER", "grid": 3, "finish": 2, "points": 18.0, "pit_ms": 2500}),
            json!({"driver": "HAM", "grid": 5, "finish": 3, "points": 15.0, "pit_ms": 2700}),
            json!({"driver": "ALO", "grid": 4, "finish": 4, "points": 12.0, "pit_ms": 2400}),
            json!({"driver": "SAI", "grid": 2, "finish": 5, "points": 10.0, "pit_ms": null}),
            json!({"driver": "NOR", "grid": 9, "finish": 6, "points": 8.0, "pit_ms": 2600}),
        ],
    )
}

fn decode(encoded: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap()
}

/// Width and height from the PNG IHDR chunk.
fn png_dimensions(png: &[u8]) -> (u32, u32) {
    let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
    let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
    (width, height)
}

#[test]
fn test_scatter_with_every_row_incomplete_is_empty_dataset() {
    let rs = result(
        &[("grid", "INT"), ("finish", "INT")],
        vec![
            json!({"grid": null, "finish": 3}),
            json!({"grid": 4, "finish": null}),
            json!({"grid": "n/a", "finish": 2}),
            json!({"finish": 1}),
        ],
    );
    let err = render(&rs, &ChartSpec::new(ChartKind::Scatter, "grid", "finish")).unwrap_err();
    assert!(matches!(err, ChartError::EmptyDataset { .. }));
    assert_eq!(err.kind(), "EmptyDataset");
}

#[test]
fn test_scatter_renders_remaining_rows() {
    let spec = ChartSpec::new(ChartKind::Scatter, "points", "pit_ms").with_size(400, 300);
    let artifact = render(&race_rows(), &spec).unwrap();
    assert!(
        artifact
            .data_summary
            .starts_with("5 points (1 rows excluded for missing values)")
    );
    assert!(artifact.description.contains("x axis `points`, y axis `pit_ms`"));
}

#[test]
fn test_empty_result_is_empty_dataset() {
    let err = render(
        &ResultSet::empty(),
        &ChartSpec::new(ChartKind::Bar, "driver", "points"),
    )
    .unwrap_err();
    assert!(matches!(err, ChartError::EmptyDataset { .. }));
}

#[test]
fn test_artifact_is_self_contained_png() {
    let spec = ChartSpec::new(ChartKind::Bar, "driver", "points")
        .with_title("Points by driver")
        .with_size(640, 480);
    let artifact = render(&race_rows(), &spec).unwrap();

    assert_eq!(artifact.mime_type, PNG_MIME_TYPE);
    assert_eq!(artifact.chart_kind, ChartKind::Bar);
    assert_eq!(artifact.title, "Points by driver");
    assert_eq!((artifact.width, artifact.height), (640, 480));

    let png = decode(&artifact.encoded_image);
    assert_eq!(png[..8], PNG_SIGNATURE);
    assert_eq!(png_dimensions(&png), (640, 480));
    assert!(artifact.description.contains("VER, PER, HAM, ALO, SAI, NOR"));
}

#[test]
fn test_dimensions_are_bounded() {
    let spec = ChartSpec::new(ChartKind::Line, "driver", "points").with_size(20_000, 20_000);
    let artifact = render(&race_rows(), &spec).unwrap();
    assert_eq!((artifact.width, artifact.height), (MAX_CHART_WIDTH, MAX_CHART_HEIGHT));
    let png = decode(&artifact.encoded_image);
    assert_eq!(png_dimensions(&png), (MAX_CHART_WIDTH, MAX_CHART_HEIGHT));
}

#[test]
fn test_rendering_is_deterministic_and_pure() {
    let rs = race_rows();
    let before = rs.clone();
    let spec = ChartSpec::new(ChartKind::Line, "driver", "finish")
        .with_extra_series("grid")
        .with_size(320, 240);

    let first = render(&rs, &spec).unwrap();
    let second = render(&rs, &spec).unwrap();
    assert_eq!(first, second);
    assert_eq!(rs, before);
}

#[test]
fn test_box_plot_groups() {
    let rs = result(
        &[("team", "STRING"), ("duration_ms", "BIGINT")],
        vec![
            json!({"team": "Red Bull", "duration_ms": 2100}),
            json!({"team": "Red Bull", "duration_ms": 2300}),
            json!({"team": "Ferrari", "duration_ms": 2600}),
            json!({"team": null, "duration_ms": 2500}),
            json!({"team": "Ferrari", "duration_ms": 2400}),
        ],
    );
    let spec = ChartSpec::new(ChartKind::Box, "team", "duration_ms").with_size(400, 300);
    let artifact = render(&rs, &spec).unwrap();
    assert!(artifact.description.contains("left to right: Red Bull, Ferrari"));
    assert!(artifact.data_summary.contains("Red Bull: n=2"));
    assert!(artifact.data_summary.contains("Ferrari: n=2"));
}

#[test]
fn test_heatmap_excludes_non_numeric_fields() {
    let artifact = render(&race_rows(), &ChartSpec::heatmap(Vec::<String>::new())).unwrap();
    assert_eq!(artifact.chart_kind, ChartKind::Heatmap);
    assert!(artifact.description.contains("4x4 correlation matrix"));
    assert!(artifact.description.contains("Non-numeric fields left out: driver"));
    assert!(artifact.data_summary.contains("grid ~ finish: r="));
    assert!(artifact.data_summary.contains("points ~ pit_ms: r="));
    assert!(artifact.data_summary.contains("(n=5)"));
}

#[test]
fn test_heatmap_with_one_numeric_field_fails() {
    let err = render(
        &race_rows(),
        &ChartSpec::heatmap(["driver", "points"]),
    )
    .unwrap_err();
    assert_eq!(err, ChartError::InsufficientNumericFields { found: 1 });
}

#[test]
fn test_unknown_field_is_malformed_spec() {
    let err = render(
        &race_rows(),
        &ChartSpec::new(ChartKind::Scatter, "grid", "lap_time"),
    )
    .unwrap_err();
    assert_eq!(err.kind(), "MalformedChartSpec");
    assert!(err.to_string().contains("lap_time"));
}
