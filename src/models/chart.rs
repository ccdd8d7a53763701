//! Chart specification and artifact models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default canvas size in pixels.
pub const DEFAULT_CHART_WIDTH: u32 = 1000;
pub const DEFAULT_CHART_HEIGHT: u32 = 600;

/// Hard bounds on canvas size.
pub const MIN_CHART_WIDTH: u32 = 200;
pub const MIN_CHART_HEIGHT: u32 = 150;
pub const MAX_CHART_WIDTH: u32 = 1600;
pub const MAX_CHART_HEIGHT: u32 = 1200;

pub const PNG_MIME_TYPE: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Scatter,
    Box,
    Heatmap,
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::Bar => write!(f, "bar"),
            Self::Scatter => write!(f, "scatter"),
            Self::Box => write!(f, "box"),
            Self::Heatmap => write!(f, "heatmap"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
    /// Bars grow along the x axis, categories run down the y axis.
    pub horizontal: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_CHART_WIDTH,
            height: DEFAULT_CHART_HEIGHT,
            horizontal: false,
        }
    }
}

impl ChartOptions {
    /// Canvas size after clamping to the supported bounds.
    pub fn dimensions(&self) -> (u32, u32) {
        (
            self.width.clamp(MIN_CHART_WIDTH, MAX_CHART_WIDTH),
            self.height.clamp(MIN_CHART_HEIGHT, MAX_CHART_HEIGHT),
        )
    }
}

/// What to draw and which result columns feed it.
///
/// For `heatmap` the `y_fields` list names the fields to correlate (all
/// columns when empty) and `x_field` is unused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x_field: String,
    pub y_fields: Vec<String>,
    pub group_field: Option<String>,
    pub title: String,
    pub options: ChartOptions,
}

impl ChartSpec {
    pub fn new(kind: ChartKind, x_field: impl Into<String>, y_field: impl Into<String>) -> Self {
        Self {
            kind,
            x_field: x_field.into(),
            y_fields: vec![y_field.into()],
            group_field: None,
            title: String::new(),
            options: ChartOptions::default(),
        }
    }

    pub fn heatmap<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: ChartKind::Heatmap,
            x_field: String::new(),
            y_fields: fields.into_iter().map(Into::into).collect(),
            group_field: None,
            title: String::new(),
            options: ChartOptions::default(),
        }
    }

    pub fn with_group(mut self, group_field: impl Into<String>) -> Self {
        self.group_field = Some(group_field.into());
        self
    }

    pub fn with_extra_series(mut self, y_field: impl Into<String>) -> Self {
        self.y_fields.push(y_field.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn horizontal(mut self) -> Self {
        self.options.horizontal = true;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.options.width = width;
        self.options.height = height;
        self
    }
}

/// A rendered chart, self-contained and ready for inline display.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ChartArtifact {
    /// Base64-encoded PNG
    pub encoded_image: String,
    /// Always "image/png"
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub chart_kind: ChartKind,
    pub title: String,
    /// Axis, series and category labels (the image carries no text)
    pub description: String,
    /// Key statistics of the plotted data
    pub data_summary: String,
}
