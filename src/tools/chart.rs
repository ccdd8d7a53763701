//! Chart rendering.
//!
//! [`render`] turns a [`ResultSet`] and a [`ChartSpec`] into a PNG
//! [`ChartArtifact`]. Drawing happens with `plotters` into an in-memory RGB
//! buffer, which is then PNG-encoded with `image` and base64-encoded. No text
//! is rasterized: titles, axis names, series colours and category labels are
//! returned in the artifact's `description`, and key statistics in
//! `data_summary`.
//!
//! Rendering is pure. The input rows are only read, canvas size is clamped to
//! fixed bounds, and every failure is a typed [`ChartError`] rather than a
//! partial image.

use crate::models::{ChartArtifact, ChartKind, ChartSpec, PNG_MIME_TYPE, ResultSet, numeric_value};
use crate::tools::format::{format_float, format_value};
use base64::Engine;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use plotters::coord::Shift;
use plotters::data::Quartiles;
use plotters::prelude::*;
use serde_json::Value as JsonValue;
use std::ops::Range;
use thiserror::Error;

const MARGIN: u32 = 40;

/// Categories listed by name in a description before the rest are counted.
const MAX_LISTED_CATEGORIES: usize = 30;

const PALETTE: [(u8, u8, u8); 10] = [
    (0xE1, 0x06, 0x00),
    (0x00, 0xD2, 0xBE),
    (0x06, 0x00, 0xEF),
    (0xFF, 0x87, 0x00),
    (0x00, 0x6F, 0x62),
    (0x2B, 0x45, 0x62),
    (0xB6, 0xBA, 0xBD),
    (0xC9, 0x2D, 0x4B),
    (0x00, 0x5A, 0xFF),
    (0xFF, 0x80, 0xC7),
];

const GRID: RGBColor = RGBColor(0xE4, 0xE4, 0xE4);
const AXIS: RGBColor = RGBColor(0x55, 0x55, 0x55);
const MISSING: RGBColor = RGBColor(0xBB, 0xBB, 0xBB);

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("No plottable rows: every row is missing a usable value for {fields}")]
    EmptyDataset { fields: String },

    #[error("Correlation needs at least two numeric fields, found {found}")]
    InsufficientNumericFields { found: usize },

    #[error("Malformed chart spec: {0}")]
    MalformedSpec(String),

    #[error("Chart rendering failed: {0}")]
    Backend(String),
}

impl ChartError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyDataset { .. } => "EmptyDataset",
            Self::InsufficientNumericFields { .. } => "InsufficientNumericFields",
            Self::MalformedSpec(_) => "MalformedChartSpec",
            Self::Backend(_) => "RenderFailure",
        }
    }

    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::EmptyDataset { .. } => {
                "Broaden the filters, or request the data as text to inspect the missing values"
            }
            Self::InsufficientNumericFields { .. } => "Include at least two numeric columns",
            Self::MalformedSpec(_) => "Use column names returned by the query",
            Self::Backend(_) => "Request the data as text instead",
        }
    }
}

fn backend_error<E: std::fmt::Display>(err: E) -> ChartError {
    ChartError::Backend(err.to_string())
}

/// Render `result` according to `spec`.
pub fn render(result: &ResultSet, spec: &ChartSpec) -> Result<ChartArtifact, ChartError> {
    check_fields(result, spec)?;
    let (width, height) = spec.options.dimensions();
    let title = chart_title(spec);

    let drawing = match spec.kind {
        ChartKind::Line | ChartKind::Bar => {
            let data = CategoricalData::collect(result, spec)?;
            let horizontal = spec.kind == ChartKind::Bar && spec.options.horizontal;
            let image = rasterize(width, height, |root| {
                if spec.kind == ChartKind::Line {
                    draw_lines(root, &data)
                } else {
                    draw_bars(root, &data, horizontal)
                }
            })?;
            Drawing {
                image,
                description: data.describe(spec, horizontal),
                summary: data.summarize(),
            }
        }
        ChartKind::Scatter => {
            let data = ScatterData::collect(result, spec)?;
            let image = rasterize(width, height, |root| draw_scatter(root, &data))?;
            Drawing {
                image,
                description: data.describe(spec),
                summary: data.summarize(),
            }
        }
        ChartKind::Box => {
            let data = BoxData::collect(result, spec)?;
            let image = rasterize(width, height, |root| draw_boxes(root, &data))?;
            Drawing {
                image,
                description: data.describe(spec),
                summary: data.summarize(),
            }
        }
        ChartKind::Heatmap => {
            let data = CorrelationData::collect(result, spec)?;
            let image = rasterize(width, height, |root| draw_heatmap(root, &data))?;
            Drawing {
                image,
                description: data.describe(),
                summary: data.summarize(),
            }
        }
    };

    Ok(ChartArtifact {
        encoded_image: base64::engine::general_purpose::STANDARD.encode(&drawing.image),
        mime_type: PNG_MIME_TYPE.to_string(),
        width,
        height,
        chart_kind: spec.kind,
        title: title.clone(),
        description: format!("{}. {}", title, drawing.description),
        data_summary: drawing.summary,
    })
}

struct Drawing {
    image: Vec<u8>,
    description: String,
    summary: String,
}

fn chart_title(spec: &ChartSpec) -> String {
    if !spec.title.trim().is_empty() {
        return spec.title.trim().to_string();
    }
    match spec.kind {
        ChartKind::Heatmap => "Correlation matrix".to_string(),
        _ => format!("{} by {}", spec.y_fields.join(", "), spec.x_field),
    }
}

fn has_field(result: &ResultSet, field: &str) -> bool {
    if result.columns.is_empty() {
        result.rows.iter().any(|r| r.contains_key(field))
    } else {
        result.column(field).is_some()
    }
}

fn check_fields(result: &ResultSet, spec: &ChartSpec) -> Result<(), ChartError> {
    let unknown = |field: &str| {
        ChartError::MalformedSpec(format!(
            "column '{}' is not in the result (available: {})",
            field,
            result.column_names().join(", ")
        ))
    };

    if spec.kind != ChartKind::Heatmap {
        if spec.x_field.is_empty() {
            return Err(ChartError::MalformedSpec("x field is required".into()));
        }
        if spec.y_fields.is_empty() {
            return Err(ChartError::MalformedSpec("a y field is required".into()));
        }
    }
    match spec.kind {
        ChartKind::Scatter | ChartKind::Box if spec.y_fields.len() > 1 => {
            return Err(ChartError::MalformedSpec(format!(
                "{} charts take exactly one y field",
                spec.kind
            )));
        }
        ChartKind::Line | ChartKind::Bar
            if spec.group_field.is_some() && spec.y_fields.len() > 1 =>
        {
            return Err(ChartError::MalformedSpec(
                "use either a group field or several y fields, not both".into(),
            ));
        }
        _ => {}
    }

    // An empty result cannot name its columns; that case is reported as empty
    if result.is_empty() {
        return Err(ChartError::EmptyDataset {
            fields: required_fields(spec),
        });
    }

    let fields = std::iter::once(spec.x_field.as_str())
        .filter(|f| !f.is_empty())
        .chain(spec.y_fields.iter().map(String::as_str))
        .chain(spec.group_field.as_deref());
    for field in fields {
        if !has_field(result, field) {
            return Err(unknown(field));
        }
    }
    Ok(())
}

fn required_fields(spec: &ChartSpec) -> String {
    let mut fields: Vec<&str> = Vec::new();
    if !spec.x_field.is_empty() {
        fields.push(&spec.x_field);
    }
    fields.extend(spec.y_fields.iter().map(String::as_str));
    if fields.is_empty() {
        "the requested fields".to_string()
    } else {
        fields.join(", ")
    }
}

fn cell<'a>(row: &'a serde_json::Map<String, JsonValue>, field: &str) -> &'a JsonValue {
    row.get(field).unwrap_or(&JsonValue::Null)
}

/// Display key for a categorical cell; None for NULL/missing.
fn category_key(value: &JsonValue) -> Option<String> {
    (!value.is_null()).then(|| match value {
        JsonValue::String(s) => s.clone(),
        other => format_value(other),
    })
}

/// Index of `key` in `keys`, appending it when first seen.
fn intern(keys: &mut Vec<String>, key: String) -> usize {
    match keys.iter().position(|k| *k == key) {
        Some(idx) => idx,
        None => {
            keys.push(key);
            keys.len() - 1
        }
    }
}

fn palette(idx: usize) -> RGBColor {
    let (r, g, b) = PALETTE[idx % PALETTE.len()];
    RGBColor(r, g, b)
}

fn palette_hex(idx: usize) -> String {
    let (r, g, b) = PALETTE[idx % PALETTE.len()];
    format!("#{:02X}{:02X}{:02X}", r, g, b)
}

fn list_categories(categories: &[String]) -> String {
    let listed: Vec<&str> = categories
        .iter()
        .take(MAX_LISTED_CATEGORIES)
        .map(String::as_str)
        .collect();
    let mut out = listed.join(", ");
    if categories.len() > MAX_LISTED_CATEGORIES {
        out.push_str(&format!(
            ", ... (+{} more)",
            categories.len() - MAX_LISTED_CATEGORIES
        ));
    }
    out
}

/// Pearson correlation of paired samples. None with fewer than two pairs or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

fn stats_line(name: &str, values: &[f64]) -> String {
    if values.is_empty() {
        return format!("{}: no values", name);
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    format!(
        "{}: n={}, min={}, max={}, mean={}",
        name,
        values.len(),
        format_float(min),
        format_float(max),
        format_float(mean)
    )
}

/// Padded axis range covering `values`.
fn value_range(values: impl IntoIterator<Item = f64>, include_zero: bool) -> Range<f64> {
    let (mut lo, mut hi) = values
        .into_iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    if hi - lo < f64::EPSILON {
        lo -= 1.0;
        hi += 1.0;
    }
    let pad = (hi - lo) * 0.05;
    let start = if include_zero && lo == 0.0 { 0.0 } else { lo - pad };
    let end = if include_zero && hi == 0.0 { 0.0 } else { hi + pad };
    start..end
}

/// Draw on a white canvas and return the PNG bytes.
fn rasterize<F>(width: u32, height: u32, draw: F) -> Result<Vec<u8>, ChartError>
where
    F: FnOnce(&Canvas<'_>) -> Result<(), ChartError>,
{
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(backend_error)?;
        draw(&root)?;
        root.present().map_err(backend_error)?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&buffer, width, height, image::ExtendedColorType::Rgb8)
        .map_err(backend_error)?;
    Ok(png)
}

/// Evenly spaced grid lines across `values`, horizontal unless `vertical`.
fn grid_lines(
    values: &Range<f64>,
    across: &Range<f64>,
    vertical: bool,
) -> Vec<PathElement<(f64, f64)>> {
    let steps = 5;
    let mut lines: Vec<PathElement<(f64, f64)>> = (0..=steps)
        .map(|i| {
            let v = values.start + (values.end - values.start) * i as f64 / steps as f64;
            let points = if vertical {
                vec![(v, across.start), (v, across.end)]
            } else {
                vec![(across.start, v), (across.end, v)]
            };
            PathElement::new(points, GRID.stroke_width(1))
        })
        .collect();

    // Zero baseline
    if (values.start < 0.0 && values.end > 0.0) || values.start == 0.0 {
        let points = if vertical {
            vec![(0.0, across.start), (0.0, across.end)]
        } else {
            vec![(across.start, 0.0), (across.end, 0.0)]
        };
        lines.push(PathElement::new(points, AXIS.stroke_width(1)));
    }
    lines
}

struct CategoricalData {
    x_field: String,
    y_label: String,
    categories: Vec<String>,
    series: Vec<Series>,
}

struct Series {
    name: String,
    /// One slot per category
    values: Vec<Option<f64>>,
}

impl CategoricalData {
    /// Categories keep result order. Within one series a repeated category keeps the last value.
    fn collect(result: &ResultSet, spec: &ChartSpec) -> Result<Self, ChartError> {
        let mut categories: Vec<String> = Vec::new();
        let mut series_names: Vec<String> = match &spec.group_field {
            Some(_) => Vec::new(),
            None => spec.y_fields.clone(),
        };
        let mut points: Vec<(usize, usize, f64)> = Vec::new();

        for row in &result.rows {
            let Some(category) = category_key(cell(row, &spec.x_field)) else {
                continue;
            };
            let cat_idx = intern(&mut categories, category);
            match &spec.group_field {
                Some(group) => {
                    let name =
                        category_key(cell(row, group)).unwrap_or_else(|| "NULL".to_string());
                    let series_idx = intern(&mut series_names, name);
                    if let Some(v) = numeric_value(cell(row, &spec.y_fields[0])) {
                        points.push((series_idx, cat_idx, v));
                    }
                }
                None => {
                    for (series_idx, field) in spec.y_fields.iter().enumerate() {
                        if let Some(v) = numeric_value(cell(row, field)) {
                            points.push((series_idx, cat_idx, v));
                        }
                    }
                }
            }
        }

        if points.is_empty() {
            return Err(ChartError::EmptyDataset {
                fields: required_fields(spec),
            });
        }

        let mut series: Vec<Series> = series_names
            .into_iter()
            .map(|name| Series {
                name,
                values: vec![None; categories.len()],
            })
            .collect();
        for (series_idx, cat_idx, v) in points {
            series[series_idx].values[cat_idx] = Some(v);
        }

        Ok(Self {
            x_field: spec.x_field.clone(),
            y_label: spec.y_fields.join(", "),
            categories,
            series,
        })
    }

    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.series.iter().flat_map(|s| s.values.iter().flatten().copied())
    }

    fn describe(&self, spec: &ChartSpec, horizontal: bool) -> String {
        let layout = if horizontal {
            format!(
                "Categories `{}` run top to bottom: {}. Bar length is `{}`",
                self.x_field,
                list_categories(&self.categories),
                self.y_label
            )
        } else {
            format!(
                "x axis `{}` left to right: {}. y axis `{}`",
                self.x_field,
                list_categories(&self.categories),
                self.y_label
            )
        };
        let series: Vec<String> = self
            .series
            .iter()
            .enumerate()
            .map(|(i, s)| format!("{} {}", s.name, palette_hex(i)))
            .collect();
        format!(
            "{} chart. {}. Series: {}",
            spec.kind,
            layout,
            series.join(", ")
        )
    }

    fn summarize(&self) -> String {
        self.series
            .iter()
            .map(|s| {
                let values: Vec<f64> = s.values.iter().flatten().copied().collect();
                stats_line(&s.name, &values)
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn draw_lines(root: &Canvas<'_>, data: &CategoricalData) -> Result<(), ChartError> {
    let n = data.categories.len() as f64;
    let x_range = -0.5..(n - 0.5);
    let y_range = value_range(data.values(), false);

    let mut chart = ChartBuilder::on(root)
        .margin(MARGIN)
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(backend_error)?;
    chart
        .draw_series(grid_lines(&y_range, &x_range, false))
        .map_err(backend_error)?;

    for (i, series) in data.series.iter().enumerate() {
        let color = palette(i);
        // A missing value breaks the line
        let mut segment: Vec<(f64, f64)> = Vec::new();
        let mut segments: Vec<Vec<(f64, f64)>> = Vec::new();
        for (idx, value) in series.values.iter().enumerate() {
            match value {
                Some(v) => segment.push((idx as f64, *v)),
                None if !segment.is_empty() => segments.push(std::mem::take(&mut segment)),
                None => {}
            }
        }
        if !segment.is_empty() {
            segments.push(segment);
        }

        for points in &segments {
            chart
                .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(3)))
                .map_err(backend_error)?;
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|p| Circle::new(*p, 4, color.filled())),
                )
                .map_err(backend_error)?;
        }
    }
    Ok(())
}

fn draw_bars(root: &Canvas<'_>, data: &CategoricalData, horizontal: bool) -> Result<(), ChartError> {
    let n = data.categories.len();
    let slots = -0.5..(n as f64 - 0.5);
    let values = value_range(data.values(), true);
    let (x_range, y_range) = if horizontal {
        (values.clone(), slots.clone())
    } else {
        (slots.clone(), values.clone())
    };

    let mut chart = ChartBuilder::on(root)
        .margin(MARGIN)
        .build_cartesian_2d(x_range, y_range)
        .map_err(backend_error)?;
    chart
        .draw_series(grid_lines(&values, &slots, horizontal))
        .map_err(backend_error)?;

    let width = 0.8 / data.series.len().max(1) as f64;
    for (s, series) in data.series.iter().enumerate() {
        let style = palette(s).filled();
        let bars = series.values.iter().enumerate().filter_map(|(c, value)| {
            let v = (*value)?;
            // First category at the top when bars are horizontal
            let slot = if horizontal { (n - 1 - c) as f64 } else { c as f64 };
            let lo = slot - 0.4 + s as f64 * width;
            let hi = lo + width * 0.92;
            let corners = if horizontal {
                [(0.0, lo), (v, hi)]
            } else {
                [(lo, 0.0), (hi, v)]
            };
            Some(Rectangle::new(corners, style))
        });
        chart.draw_series(bars).map_err(backend_error)?;
    }
    Ok(())
}

struct ScatterData {
    x_field: String,
    y_field: String,
    groups: Vec<String>,
    /// (x, y, group index)
    points: Vec<(f64, f64, usize)>,
    excluded: usize,
}

impl ScatterData {
    fn collect(result: &ResultSet, spec: &ChartSpec) -> Result<Self, ChartError> {
        let y_field = &spec.y_fields[0];
        let mut groups = Vec::new();
        let mut points = Vec::new();
        for row in &result.rows {
            let (Some(x), Some(y)) = (
                numeric_value(cell(row, &spec.x_field)),
                numeric_value(cell(row, y_field)),
            ) else {
                continue;
            };
            let group = match &spec.group_field {
                Some(field) => intern(
                    &mut groups,
                    category_key(cell(row, field)).unwrap_or_else(|| "NULL".to_string()),
                ),
                None => 0,
            };
            points.push((x, y, group));
        }

        if points.is_empty() {
            return Err(ChartError::EmptyDataset {
                fields: required_fields(spec),
            });
        }
        Ok(Self {
            x_field: spec.x_field.clone(),
            y_field: y_field.clone(),
            groups,
            excluded: result.rows.len() - points.len(),
            points,
        })
    }

    fn describe(&self, spec: &ChartSpec) -> String {
        let mut out = format!(
            "scatter chart. x axis `{}`, y axis `{}`",
            self.x_field, self.y_field
        );
        if let Some(group) = &spec.group_field {
            let legend: Vec<String> = self
                .groups
                .iter()
                .enumerate()
                .map(|(i, g)| format!("{} {}", g, palette_hex(i)))
                .collect();
            out.push_str(&format!(". Colour by `{}`: {}", group, legend.join(", ")));
        }
        out
    }

    fn summarize(&self) -> String {
        let xs: Vec<f64> = self.points.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = self.points.iter().map(|p| p.1).collect();
        let r = pearson(&xs, &ys)
            .map(format_float)
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "{} points ({} rows excluded for missing values); {}; {}; pearson r={}",
            self.points.len(),
            self.excluded,
            stats_line(&self.x_field, &xs),
            stats_line(&self.y_field, &ys),
            r
        )
    }
}

fn draw_scatter(root: &Canvas<'_>, data: &ScatterData) -> Result<(), ChartError> {
    let x_range = value_range(data.points.iter().map(|p| p.0), false);
    let y_range = value_range(data.points.iter().map(|p| p.1), false);

    let mut chart = ChartBuilder::on(root)
        .margin(MARGIN)
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(backend_error)?;
    chart
        .draw_series(grid_lines(&y_range, &x_range, false))
        .map_err(backend_error)?;
    chart
        .draw_series(grid_lines(&x_range, &y_range, true))
        .map_err(backend_error)?;
    chart
        .draw_series(
            data.points
                .iter()
                .map(|(x, y, g)| Circle::new((*x, *y), 4, palette(*g).mix(0.75).filled())),
        )
        .map_err(backend_error)?;
    Ok(())
}

struct BoxGroup {
    name: String,
    values: Vec<f64>,
}

struct BoxData {
    x_field: String,
    y_field: String,
    groups: Vec<BoxGroup>,
}

/// Five-number summary with Tukey whiskers clipped to the data.
struct BoxStats {
    whisker_low: f64,
    q1: f64,
    median: f64,
    q3: f64,
    whisker_high: f64,
    outliers: Vec<f64>,
}

impl BoxStats {
    fn of(values: &[f64]) -> Self {
        let quartiles = Quartiles::new(values);
        let [fence_low, q1, _, q3, fence_high] = quartiles.values();
        // Quartiles are stored as f32; widen the fences by the rounding error
        let slack = |f: f32| 1e-5 * (1.0 + f64::from(f).abs());
        let low_fence = f64::from(fence_low) - slack(fence_low);
        let high_fence = f64::from(fence_high) + slack(fence_high);
        let (inside, outliers): (Vec<f64>, Vec<f64>) = values
            .iter()
            .partition(|v| **v >= low_fence && **v <= high_fence);
        let (low, high) = inside
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            });
        Self {
            whisker_low: if low.is_finite() { low } else { f64::from(q1) },
            q1: f64::from(q1),
            median: quartiles.median(),
            q3: f64::from(q3),
            whisker_high: if high.is_finite() { high } else { f64::from(q3) },
            outliers,
        }
    }
}

impl BoxData {
    fn collect(result: &ResultSet, spec: &ChartSpec) -> Result<Self, ChartError> {
        let y_field = &spec.y_fields[0];
        let mut names: Vec<String> = Vec::new();
        let mut values: Vec<Vec<f64>> = Vec::new();
        for row in &result.rows {
            let (Some(group), Some(v)) = (
                category_key(cell(row, &spec.x_field)),
                numeric_value(cell(row, y_field)),
            ) else {
                continue;
            };
            let idx = intern(&mut names, group);
            if idx == values.len() {
                values.push(Vec::new());
            }
            values[idx].push(v);
        }

        if names.is_empty() {
            return Err(ChartError::EmptyDataset {
                fields: required_fields(spec),
            });
        }
        Ok(Self {
            x_field: spec.x_field.clone(),
            y_field: y_field.clone(),
            groups: names
                .into_iter()
                .zip(values)
                .map(|(name, values)| BoxGroup { name, values })
                .collect(),
        })
    }

    fn describe(&self, spec: &ChartSpec) -> String {
        let names: Vec<String> = self.groups.iter().map(|g| g.name.clone()).collect();
        format!(
            "{} chart. Groups of `{}` left to right: {}. y axis `{}`",
            spec.kind,
            self.x_field,
            list_categories(&names),
            self.y_field
        )
    }

    fn summarize(&self) -> String {
        self.groups
            .iter()
            .map(|g| {
                let stats = BoxStats::of(&g.values);
                format!(
                    "{}: n={}, q1={}, median={}, q3={}, whiskers {}..{}, outliers={}",
                    g.name,
                    g.values.len(),
                    format_float(stats.q1),
                    format_float(stats.median),
                    format_float(stats.q3),
                    format_float(stats.whisker_low),
                    format_float(stats.whisker_high),
                    stats.outliers.len()
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn draw_boxes(root: &Canvas<'_>, data: &BoxData) -> Result<(), ChartError> {
    let n = data.groups.len() as f64;
    let x_range = -0.5..(n - 0.5);
    let y_range = value_range(data.groups.iter().flat_map(|g| g.values.iter().copied()), false);

    let mut chart = ChartBuilder::on(root)
        .margin(MARGIN)
        .build_cartesian_2d(x_range.clone(), y_range.clone())
        .map_err(backend_error)?;
    chart
        .draw_series(grid_lines(&y_range, &x_range, false))
        .map_err(backend_error)?;

    for (i, group) in data.groups.iter().enumerate() {
        let stats = BoxStats::of(&group.values);
        let color = palette(i);
        let x = i as f64;
        let half = 0.3;

        chart
            .draw_series([
                PathElement::new(
                    vec![(x, stats.whisker_low), (x, stats.q1)],
                    color.stroke_width(2),
                ),
                PathElement::new(
                    vec![(x, stats.q3), (x, stats.whisker_high)],
                    color.stroke_width(2),
                ),
                PathElement::new(
                    vec![(x - half / 2.0, stats.whisker_low), (x + half / 2.0, stats.whisker_low)],
                    color.stroke_width(2),
                ),
                PathElement::new(
                    vec![(x - half / 2.0, stats.whisker_high), (x + half / 2.0, stats.whisker_high)],
                    color.stroke_width(2),
                ),
            ])
            .map_err(backend_error)?;
        chart
            .draw_series([
                Rectangle::new([(x - half, stats.q1), (x + half, stats.q3)], color.mix(0.35).filled()),
                Rectangle::new([(x - half, stats.q1), (x + half, stats.q3)], color.stroke_width(2)),
            ])
            .map_err(backend_error)?;
        chart
            .draw_series([PathElement::new(
                vec![(x - half, stats.median), (x + half, stats.median)],
                BLACK.stroke_width(3),
            )])
            .map_err(backend_error)?;
        chart
            .draw_series(
                stats
                    .outliers
                    .iter()
                    .map(|v| Circle::new((x, *v), 3, color.stroke_width(1))),
            )
            .map_err(backend_error)?;
    }
    Ok(())
}

struct CorrelationData {
    fields: Vec<String>,
    excluded: Vec<String>,
    /// Row-major, `fields.len()` squared
    matrix: Vec<Option<f64>>,
    /// Complete pairs behind each coefficient
    counts: Vec<usize>,
}

impl CorrelationData {
    fn collect(result: &ResultSet, spec: &ChartSpec) -> Result<Self, ChartError> {
        let candidates: Vec<String> = if spec.y_fields.is_empty() {
            if result.columns.is_empty() {
                result
                    .rows
                    .first()
                    .map(|r| r.keys().cloned().collect())
                    .unwrap_or_default()
            } else {
                result.column_names().into_iter().map(String::from).collect()
            }
        } else {
            spec.y_fields.clone()
        };

        let (fields, excluded): (Vec<String>, Vec<String>) = candidates
            .into_iter()
            .partition(|field| is_numeric_field(result, field));
        if fields.len() < 2 {
            return Err(ChartError::InsufficientNumericFields {
                found: fields.len(),
            });
        }

        let columns: Vec<Vec<Option<f64>>> = fields
            .iter()
            .map(|f| result.rows.iter().map(|r| numeric_value(cell(r, f))).collect())
            .collect();
        let n = fields.len();
        let mut matrix = vec![None; n * n];
        let mut counts = vec![0; n * n];
        for i in 0..n {
            for j in 0..n {
                let (xs, ys): (Vec<f64>, Vec<f64>) = columns[i]
                    .iter()
                    .zip(&columns[j])
                    .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
                    .unzip();
                counts[i * n + j] = xs.len();
                matrix[i * n + j] = if i == j && xs.len() >= 2 {
                    Some(1.0)
                } else {
                    pearson(&xs, &ys)
                };
            }
        }

        if counts.iter().all(|c| *c == 0) {
            return Err(ChartError::EmptyDataset {
                fields: fields.join(", "),
            });
        }
        Ok(Self {
            fields,
            excluded,
            matrix,
            counts,
        })
    }

    fn describe(&self) -> String {
        let mut out = format!(
            "heatmap chart. {}x{} correlation matrix; rows top to bottom and columns left to right: {}. \
             Red is positive, blue negative, white zero, grey undefined",
            self.fields.len(),
            self.fields.len(),
            self.fields.join(", ")
        );
        if !self.excluded.is_empty() {
            out.push_str(&format!(
                ". Non-numeric fields left out: {}",
                self.excluded.join(", ")
            ));
        }
        out
    }

    fn summarize(&self) -> String {
        let n = self.fields.len();
        let mut pairs: Vec<String> = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                let r = self.matrix[i * n + j]
                    .map(format_float)
                    .unwrap_or_else(|| "n/a".to_string());
                pairs.push(format!(
                    "{} ~ {}: r={} (n={})",
                    self.fields[i],
                    self.fields[j],
                    r,
                    self.counts[i * n + j]
                ));
            }
        }
        pairs.join("; ")
    }
}

fn is_numeric_field(result: &ResultSet, field: &str) -> bool {
    if let Some(column) = result.column(field) {
        return column.is_numeric();
    }
    let mut values = result
        .rows
        .iter()
        .map(|r| cell(r, field))
        .filter(|v| !v.is_null())
        .peekable();
    values.peek().is_some() && values.all(|v| numeric_value(v).is_some())
}

/// Blue (-1) through white (0) to red (+1).
fn correlation_color(r: Option<f64>) -> RGBColor {
    let Some(r) = r.filter(|r| r.is_finite()) else {
        return MISSING;
    };
    let t = r.clamp(-1.0, 1.0).abs();
    let fade = |c: u8| (255.0 + (f64::from(c) - 255.0) * t).round() as u8;
    if r < 0.0 {
        RGBColor(fade(0x21), fade(0x66), fade(0xAC))
    } else {
        RGBColor(fade(0xB2), fade(0x18), fade(0x2B))
    }
}

fn draw_heatmap(root: &Canvas<'_>, data: &CorrelationData) -> Result<(), ChartError> {
    let n = data.fields.len();
    let size = n as f64;

    let mut chart = ChartBuilder::on(root)
        .margin(MARGIN)
        .build_cartesian_2d(0.0..size, 0.0..size)
        .map_err(backend_error)?;

    let cells = (0..n).flat_map(|i| {
        (0..n).map(move |j| {
            // Row 0 at the top
            let top = (n - i) as f64;
            let left = j as f64;
            Rectangle::new(
                [(left, top - 1.0), (left + 1.0, top)],
                correlation_color(data.matrix[i * n + j]).filled(),
            )
        })
    });
    chart.draw_series(cells).map_err(backend_error)?;

    let borders = (0..=n).flat_map(|k| {
        let v = k as f64;
        [
            PathElement::new(vec![(v, 0.0), (v, size)], WHITE.stroke_width(2)),
            PathElement::new(vec![(0.0, v), (size, v)], WHITE.stroke_width(2)),
        ]
    });
    chart.draw_series(borders).map_err(backend_error)?;
    Ok(())
}
