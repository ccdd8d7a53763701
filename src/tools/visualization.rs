//! Chart tools.
//!
//! Each tool fills a fixed statement template, runs it through the shared
//! runner and hands the rows to [`chart::render`]. Metric and feature names
//! are closed enums, so the only caller text that reaches a statement travels
//! as a bound parameter. `chart_custom` is the exception: its query is
//! caller-written and gated by the validator alone.

use crate::error::{GatewayError, GatewayResult};
use crate::models::{ChartArtifact, ChartKind, ChartSpec, ResultSet, SqlStatement, numeric_value};
use crate::tools::args::{self, title_case};
use crate::tools::chart::{self, ChartError};
use crate::tools::filters::Conditions;
use crate::tools::runner::QueryRunner;
use crate::tools::stats::{CONSTRUCTOR_STATS_TABLE, DRIVER_STATS_TABLE, RACE_FEATURES_TABLE};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

const PIT_ANALYSIS_LIMIT: u32 = 1000;
const HEATMAP_LIMIT: u32 = 5000;
const CUSTOM_CHART_LIMIT: u32 = 500;
const MAX_STANDINGS: u32 = 20;
/// Box plots keep teams with at least this many values.
const MIN_BOX_SAMPLES: usize = 5;
const MAX_BOX_TEAMS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DriverMetric {
    #[default]
    TotalPoints,
    Wins,
    Podiums,
    AvgFinishPosition,
    DnfCount,
    RacesCount,
}

impl DriverMetric {
    pub fn column(&self) -> &'static str {
        match self {
            Self::TotalPoints => "total_points",
            Self::Wins => "wins",
            Self::Podiums => "podiums",
            Self::AvgFinishPosition => "avg_finish_position",
            Self::DnfCount => "dnf_count",
            Self::RacesCount => "races_count",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TeamMetric {
    #[default]
    TeamTotalPoints,
    Wins,
    Podiums,
    DnfCount,
}

impl TeamMetric {
    pub fn column(&self) -> &'static str {
        match self {
            Self::TeamTotalPoints => "team_total_points",
            Self::Wins => "wins",
            Self::Podiums => "podiums",
            Self::DnfCount => "dnf_count",
        }
    }
}

/// Race-level features available to the correlation heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RaceFeature {
    Grid,
    RaceFinishPosition,
    RacePoints,
    PitStopCount,
    AvgPitStopMs,
    TotalPitStopMs,
    QualiBestPosition,
    Round,
}

impl RaceFeature {
    pub const DEFAULTS: [RaceFeature; 6] = [
        Self::Grid,
        Self::RaceFinishPosition,
        Self::RacePoints,
        Self::PitStopCount,
        Self::AvgPitStopMs,
        Self::QualiBestPosition,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::RaceFinishPosition => "race_finish_position",
            Self::RacePoints => "race_points",
            Self::PitStopCount => "pit_stop_count",
            Self::AvgPitStopMs => "avg_pit_stop_ms",
            Self::TotalPitStopMs => "total_pit_stop_ms",
            Self::QualiBestPosition => "quali_best_position",
            Self::Round => "round",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SeriesChartType {
    #[default]
    Line,
    Bar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PitChartType {
    #[default]
    Box,
    Scatter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StandingsEntity {
    #[default]
    Drivers,
    Constructors,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CustomChartType {
    #[default]
    Bar,
    Line,
    Scatter,
    HorizontalBar,
}

/// Input for the chart_driver_performance tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DriverPerformanceInput {
    /// Driver name, partial and case-insensitive (e.g. "Verstappen")
    #[serde(alias = "driver_name")]
    pub driver: String,
    /// Metric to chart. Default: total_points
    #[serde(default)]
    pub metric: DriverMetric,
    /// "line" (default) or "bar"
    #[serde(default)]
    pub chart_type: SeriesChartType,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DriverPerformanceOutput {
    pub driver: String,
    pub metric: DriverMetric,
    /// First and last season in the chart
    pub seasons_covered: Vec<i64>,
    #[serde(flatten)]
    pub chart: ChartArtifact,
}

/// Input for the chart_team_comparison tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TeamComparisonInput {
    /// At least two team names, partial and case-insensitive
    #[serde(alias = "team_names")]
    pub teams: Vec<String>,
    /// Season year. Without it, the latest five seasons are compared.
    #[serde(default)]
    pub season: Option<i64>,
    /// Metric to compare. Default: team_total_points
    #[serde(default)]
    pub metric: TeamMetric,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TeamComparisonOutput {
    pub teams: Vec<String>,
    pub metric: TeamMetric,
    pub seasons: Vec<i64>,
    #[serde(flatten)]
    pub chart: ChartArtifact,
}

/// Input for the chart_pit_stop_analysis tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct PitStopAnalysisInput {
    /// Season year (1950-2100)
    #[serde(default)]
    pub season: Option<i64>,
    /// Team name filter, partial and case-insensitive
    #[serde(default, alias = "team_name")]
    pub team: Option<String>,
    /// "box" (default) for duration distribution per team, "scatter" for duration vs finish
    #[serde(default)]
    pub chart_type: PitChartType,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PitStopAnalysisOutput {
    pub analysis_type: PitChartType,
    pub season: String,
    pub data_points: usize,
    #[serde(flatten)]
    pub chart: ChartArtifact,
}

/// Input for the chart_correlation_heatmap tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct CorrelationHeatmapInput {
    /// Features to correlate. Default: grid, race_finish_position, race_points,
    /// pit_stop_count, avg_pit_stop_ms, quali_best_position
    #[serde(default)]
    pub features: Option<Vec<RaceFeature>>,
    /// Season year (1950-2100)
    #[serde(default)]
    pub season: Option<i64>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CorrelationHeatmapOutput {
    pub features: Vec<RaceFeature>,
    pub data_points: usize,
    pub season: String,
    #[serde(flatten)]
    pub chart: ChartArtifact,
}

/// Input for the chart_season_standings tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SeasonStandingsInput {
    /// Season year (1950-2100)
    pub season: i64,
    /// Number of positions to show. Default: 10, max: 20
    #[serde(default)]
    pub top_n: Option<u32>,
    /// "drivers" (default) or "constructors"
    #[serde(default)]
    pub entity: StandingsEntity,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct StandingEntry {
    pub name: String,
    pub points: Option<f64>,
    pub wins: Option<f64>,
    pub position: Option<f64>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SeasonStandingsOutput {
    pub season: i64,
    pub entity: StandingsEntity,
    pub standings: Vec<StandingEntry>,
    #[serde(flatten)]
    pub chart: ChartArtifact,
}

/// Input for the chart_custom tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CustomChartInput {
    /// Read-only SQL producing the chart data (at most 500 rows are used)
    pub query: String,
    /// Column for the x axis
    pub x_column: String,
    /// Column for the y axis values
    pub y_column: String,
    /// "bar" (default), "line", "scatter" or "horizontal_bar"
    #[serde(default)]
    pub chart_type: CustomChartType,
    /// Chart title. Default: "{y_column} by {x_column}"
    #[serde(default)]
    pub title: Option<String>,
    /// Column splitting the data into one line series per value
    #[serde(default)]
    pub group_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CustomChartOutput {
    pub row_count: usize,
    pub truncated: bool,
    #[serde(flatten)]
    pub chart: ChartArtifact,
}

/// Handler for the chart tools.
pub struct VisualizationToolHandler {
    runner: Arc<QueryRunner>,
}

impl VisualizationToolHandler {
    pub fn new(runner: Arc<QueryRunner>) -> Self {
        Self { runner }
    }

    /// One driver's metric across every season they raced.
    pub async fn driver_performance(
        &self,
        input: DriverPerformanceInput,
    ) -> GatewayResult<DriverPerformanceOutput> {
        let driver = args::required_text("driver", &input.driver)?;
        let metric = input.metric.column();

        let conditions = Conditions::new().contains("driverName", "driver_name", driver.as_str());
        let sql = format!(
            "SELECT season, driverName, teamName, {} FROM {} {} ORDER BY season",
            metric,
            self.runner.table(DRIVER_STATS_TABLE),
            conditions.where_clause()
        );
        let limit = self.runner.settings().default_row_limit;
        let result = self
            .runner
            .run("chart_driver_performance", conditions.bind_to(sql), limit)
            .await?;
        require_rows(&result, &["season", metric])?;

        let driver_name = first_text(&result, "driverName").unwrap_or(driver);
        let seasons = column_integers(&result, "season");
        let kind = match input.chart_type {
            SeriesChartType::Line => ChartKind::Line,
            SeriesChartType::Bar => ChartKind::Bar,
        };
        let spec = ChartSpec::new(kind, "season", metric).with_title(format!(
            "{} - {} by Season",
            driver_name,
            title_case(metric)
        ));
        let chart = chart::render(&result, &spec)?;

        info!(driver = %driver_name, metric, seasons = seasons.len(), "Driver chart rendered");
        Ok(DriverPerformanceOutput {
            driver: driver_name,
            metric: input.metric,
            seasons_covered: span(&seasons),
            chart,
        })
    }

    /// Two or more teams on one metric; a bar chart for one season, lines otherwise.
    pub async fn team_comparison(
        &self,
        input: TeamComparisonInput,
    ) -> GatewayResult<TeamComparisonOutput> {
        let teams = input
            .teams
            .iter()
            .map(|t| args::filter_text("teams", Some(t)))
            .collect::<GatewayResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        if teams.len() < 2 {
            return Err(GatewayError::invalid_argument(
                "teams",
                "provide at least 2 team names to compare",
            ));
        }
        let season = args::season(input.season)?;
        let metric = input.metric.column();
        let table = self.runner.table(CONSTRUCTOR_STATS_TABLE);

        let mut conditions = Conditions::new().contains_any("teamName", "team", &teams);
        conditions = match season {
            Some(season) => conditions.equals("season", "season", season),
            None => conditions.raw(format!("season >= (SELECT MAX(season) - 4 FROM {})", table)),
        };
        let sql = format!(
            "SELECT season, teamName, {} FROM {} {} ORDER BY season, teamName",
            metric,
            table,
            conditions.where_clause()
        );
        let limit = self.runner.settings().default_row_limit;
        let result = self
            .runner
            .run("chart_team_comparison", conditions.bind_to(sql), limit)
            .await?;
        require_rows(&result, &["season", "teamName", metric])?;

        let mut seasons = column_integers(&result, "season");
        seasons.sort_unstable();
        seasons.dedup();
        let team_names = distinct_text(&result, "teamName");

        let metric_title = title_case(metric);
        let spec = match seasons.as_slice() {
            [only] => ChartSpec::new(ChartKind::Bar, "teamName", metric)
                .with_title(format!("Team Comparison - {} ({})", metric_title, only)),
            _ => ChartSpec::new(ChartKind::Line, "season", metric)
                .with_group("teamName")
                .with_title(format!("Team Comparison - {}", metric_title)),
        };
        let chart = chart::render(&result, &spec)?;

        Ok(TeamComparisonOutput {
            teams: team_names,
            metric: input.metric,
            seasons,
            chart,
        })
    }

    /// Pit-stop duration per team (box) or against finish position (scatter).
    pub async fn pit_stop_analysis(
        &self,
        input: PitStopAnalysisInput,
    ) -> GatewayResult<PitStopAnalysisOutput> {
        let season = args::season(input.season)?;
        let team = args::filter_text("team", input.team.as_deref())?;

        let conditions = Conditions::new()
            .raw("pit_stop_count > 0")
            .raw("avg_pit_stop_ms > 0")
            .equals_opt("season", "season", season)
            .contains_opt("teamName", "team_name", team.as_deref());
        let sql = format!(
            "SELECT teamName, avg_pit_stop_ms, pit_stop_count, race_finish_position \
             FROM {} {} ORDER BY teamName LIMIT {}",
            self.runner.table(RACE_FEATURES_TABLE),
            conditions.where_clause(),
            PIT_ANALYSIS_LIMIT
        );
        let result = self
            .runner
            .run("chart_pit_stop_analysis", conditions.bind_to(sql), PIT_ANALYSIS_LIMIT)
            .await?;
        require_rows(&result, &["teamName", "avg_pit_stop_ms"])?;

        let chart = match input.chart_type {
            PitChartType::Box => {
                let busiest = busiest_teams(&result);
                let spec = ChartSpec::new(ChartKind::Box, "teamName", "avg_pit_stop_ms")
                    .with_title("Pit Stop Duration Distribution by Team");
                chart::render(&busiest, &spec)?
            }
            PitChartType::Scatter => {
                let spec = ChartSpec::new(ChartKind::Scatter, "avg_pit_stop_ms", "race_finish_position")
                    .with_title("Pit Stop Time vs Race Finish Position");
                chart::render(&result, &spec)?
            }
        };

        Ok(PitStopAnalysisOutput {
            analysis_type: input.chart_type,
            season: season_label(season),
            data_points: result.row_count,
            chart,
        })
    }

    /// Pairwise correlation of race-level features.
    pub async fn correlation_heatmap(
        &self,
        input: CorrelationHeatmapInput,
    ) -> GatewayResult<CorrelationHeatmapOutput> {
        let season = args::season(input.season)?;
        let mut features: Vec<RaceFeature> = Vec::new();
        for feature in input
            .features
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| RaceFeature::DEFAULTS.to_vec())
        {
            if !features.contains(&feature) {
                features.push(feature);
            }
        }
        if features.len() < 2 {
            return Err(GatewayError::invalid_argument(
                "features",
                "select at least 2 distinct features",
            ));
        }

        let columns: Vec<&str> = features.iter().map(RaceFeature::column).collect();
        let conditions = Conditions::new()
            .raw("race_finish_position IS NOT NULL")
            .equals_opt("season", "season", season);
        let sql = format!(
            "SELECT {} FROM {} {} LIMIT {}",
            columns.join(", "),
            self.runner.table(RACE_FEATURES_TABLE),
            conditions.where_clause(),
            HEATMAP_LIMIT
        );
        let result = self
            .runner
            .run("chart_correlation_heatmap", conditions.bind_to(sql), HEATMAP_LIMIT)
            .await?;

        let spec = ChartSpec::heatmap(columns).with_title("Feature Correlation Heatmap");
        let chart = chart::render(&result, &spec)?;

        Ok(CorrelationHeatmapOutput {
            features,
            data_points: result.row_count,
            season: season_label(season),
            chart,
        })
    }

    /// Championship points of the top finishers as a horizontal bar chart.
    pub async fn season_standings(
        &self,
        input: SeasonStandingsInput,
    ) -> GatewayResult<SeasonStandingsOutput> {
        let season = args::required_season(input.season)?;
        let top_n = args::bounded("top_n", input.top_n, 10, MAX_STANDINGS)?;

        let (name, points, position, table, label) = match input.entity {
            StandingsEntity::Drivers => (
                "driverName",
                "total_points",
                "final_champ_position",
                DRIVER_STATS_TABLE,
                "Driver",
            ),
            StandingsEntity::Constructors => (
                "teamName",
                "team_total_points",
                "final_cons_position",
                CONSTRUCTOR_STATS_TABLE,
                "Constructor",
            ),
        };
        let conditions = Conditions::new().equals("season", "season", season);
        let sql = format!(
            "SELECT {name} AS name, {points} AS points, wins, {position} AS position \
             FROM {table} {filter} ORDER BY {points} DESC LIMIT {top_n}",
            table = self.runner.table(table),
            filter = conditions.where_clause(),
        );
        let result = self
            .runner
            .run("chart_season_standings", conditions.bind_to(sql), top_n)
            .await?;
        require_rows(&result, &["name", "points"])?;

        let standings = result
            .rows
            .iter()
            .map(|row| StandingEntry {
                name: row.get("name").map(display_text).unwrap_or_default(),
                points: row.get("points").and_then(numeric_value),
                wins: row.get("wins").and_then(numeric_value),
                position: row.get("position").and_then(numeric_value),
            })
            .collect();

        let spec = ChartSpec::new(ChartKind::Bar, "name", "points")
            .horizontal()
            .with_title(format!("{} {} Championship Standings", season, label));
        let chart = chart::render(&result, &spec)?;

        Ok(SeasonStandingsOutput {
            season,
            entity: input.entity,
            standings,
            chart,
        })
    }

    /// Chart an arbitrary validated query.
    pub async fn custom_chart(&self, input: CustomChartInput) -> GatewayResult<CustomChartOutput> {
        let x_column = args::required_text("x_column", &input.x_column)?;
        let y_column = args::required_text("y_column", &input.y_column)?;
        let group_column = args::filter_text("group_column", input.group_column.as_deref())?;

        let result = self
            .runner
            .run("chart_custom", SqlStatement::new(input.query), CUSTOM_CHART_LIMIT)
            .await?;

        let spec = match input.chart_type {
            CustomChartType::Bar => ChartSpec::new(ChartKind::Bar, &x_column, &y_column),
            CustomChartType::HorizontalBar => {
                ChartSpec::new(ChartKind::Bar, &x_column, &y_column).horizontal()
            }
            CustomChartType::Line => ChartSpec::new(ChartKind::Line, &x_column, &y_column),
            CustomChartType::Scatter => ChartSpec::new(ChartKind::Scatter, &x_column, &y_column),
        };
        let spec = match group_column {
            Some(group) => spec.with_group(group),
            None => spec,
        };
        let title = input
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("{} by {}", y_column, x_column));
        let chart = chart::render(&result, &spec.with_title(title))?;

        Ok(CustomChartOutput {
            row_count: result.row_count,
            truncated: result.truncated,
            chart,
        })
    }
}

fn require_rows(result: &ResultSet, fields: &[&str]) -> Result<(), ChartError> {
    if result.is_empty() {
        return Err(ChartError::EmptyDataset {
            fields: fields.join(", "),
        });
    }
    Ok(())
}

fn display_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn first_text(result: &ResultSet, column: &str) -> Option<String> {
    result
        .rows
        .first()
        .and_then(|row| row.get(column))
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

fn column_integers(result: &ResultSet, column: &str) -> Vec<i64> {
    result
        .rows
        .iter()
        .filter_map(|row| row.get(column).and_then(numeric_value))
        .map(|v| v as i64)
        .collect()
}

fn distinct_text(result: &ResultSet, column: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for value in result
        .rows
        .iter()
        .filter_map(|row| row.get(column).and_then(JsonValue::as_str))
    {
        if !seen.iter().any(|s| s == value) {
            seen.push(value.to_string());
        }
    }
    seen
}

fn span(values: &[i64]) -> Vec<i64> {
    match (values.iter().min(), values.iter().max()) {
        (Some(min), Some(max)) => vec![*min, *max],
        _ => Vec::new(),
    }
}

fn season_label(season: Option<i64>) -> String {
    season.map_or_else(|| "all seasons".to_string(), |s| s.to_string())
}

/// Rows of the teams with enough pit stops for a box plot, fastest mean first,
/// at most ten teams.
fn busiest_teams(result: &ResultSet) -> ResultSet {
    let mut order: Vec<String> = Vec::new();
    let mut samples: HashMap<String, Vec<f64>> = HashMap::new();
    for row in &result.rows {
        let (Some(team), Some(value)) = (
            row.get("teamName").and_then(JsonValue::as_str),
            row.get("avg_pit_stop_ms").and_then(numeric_value),
        ) else {
            continue;
        };
        if !samples.contains_key(team) {
            order.push(team.to_string());
        }
        samples.entry(team.to_string()).or_default().push(value);
    }

    let mean = |team: &String| {
        let values = &samples[team];
        values.iter().sum::<f64>() / values.len() as f64
    };
    let mut teams: Vec<String> = order
        .into_iter()
        .filter(|team| samples[team].len() >= MIN_BOX_SAMPLES)
        .collect();
    teams.sort_by(|a, b| mean(a).total_cmp(&mean(b)));
    teams.truncate(MAX_BOX_TEAMS);

    let rows = teams
        .iter()
        .flat_map(|team| {
            result
                .rows
                .iter()
                .filter(move |row| row.get("teamName").and_then(JsonValue::as_str) == Some(team.as_str()))
                .cloned()
        })
        .collect();
    ResultSet::new(result.columns.clone(), rows)
}
