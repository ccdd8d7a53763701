//! Pre-built statistics tools.
//!
//! This module implements the season, race and pit-stop MCP tools. Each one
//! fills a fixed statement template: column and table names come from the
//! template, caller values are bound as parameters and the `LIMIT` is an
//! integer checked before the statement is built.

use crate::error::{GatewayError, GatewayResult};
use crate::models::numeric_value;
use crate::tools::args;
use crate::tools::chart::pearson;
use crate::tools::filters::Conditions;
use crate::tools::format::OutputFormat;
use crate::tools::query::TabularOutput;
use crate::tools::runner::QueryRunner;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DRIVER_STATS_TABLE: &str = "f1_gold_driver_season_stats";
pub const CONSTRUCTOR_STATS_TABLE: &str = "f1_gold_constructor_season_stats";
pub const RACE_FEATURES_TABLE: &str = "f1_gold_race_driver_features";

const HISTORICAL_PIT_LIMIT: u32 = 50;
const RACE_FACTORS_LIMIT: u32 = 2000;

/// Input for the get_driver_season_stats tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct DriverSeasonStatsInput {
    /// Driver name filter, partial and case-insensitive (e.g. "Hamilton", "HAM")
    #[serde(default, alias = "driver_name")]
    pub driver: Option<String>,
    /// Season year (1950-2100)
    #[serde(default)]
    pub season: Option<i64>,
    /// Team name filter, partial and case-insensitive
    #[serde(default, alias = "team_name")]
    pub team: Option<String>,
    /// Maximum rows to return. Default: 50
    #[serde(default)]
    pub limit: Option<u32>,
    /// Output format: "text" (default), "markdown", "table" or "json"
    #[serde(default)]
    pub format: OutputFormat,
}

/// Input for the get_constructor_season_stats tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ConstructorSeasonStatsInput {
    /// Team name filter, partial and case-insensitive (e.g. "Ferrari")
    #[serde(default, alias = "team_name")]
    pub team: Option<String>,
    /// Season year (1950-2100)
    #[serde(default)]
    pub season: Option<i64>,
    /// Maximum rows to return. Default: 50
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// Input for the get_race_results tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RaceResultsInput {
    /// Race name filter, partial and case-insensitive (e.g. "Monaco")
    #[serde(default, alias = "race_name")]
    pub race: Option<String>,
    /// Season year (1950-2100)
    #[serde(default)]
    pub season: Option<i64>,
    /// Driver name filter, partial and case-insensitive
    #[serde(default, alias = "driver_name")]
    pub driver: Option<String>,
    /// Maximum rows to return. Default: 100
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// Input for the get_pit_stop_data tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct PitStopDataInput {
    /// Season year (1950-2100)
    #[serde(default)]
    pub season: Option<i64>,
    /// Driver name filter, partial and case-insensitive
    #[serde(default, alias = "driver_name")]
    pub driver: Option<String>,
    /// Team name filter, partial and case-insensitive
    #[serde(default, alias = "team_name")]
    pub team: Option<String>,
    /// Maximum rows to return. Default: 500
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// Input for the get_historical_pit_stats tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct HistoricalPitStatsInput {
    /// Circuit name filter, partial and case-insensitive (e.g. "Monza")
    #[serde(default, alias = "circuit_name")]
    pub circuit: Option<String>,
    /// Team name filter, partial and case-insensitive
    #[serde(default, alias = "team_name")]
    pub team: Option<String>,
    /// Season year (1950-2100). Without it, results are grouped by season.
    #[serde(default)]
    pub season: Option<i64>,
    #[serde(default)]
    pub format: OutputFormat,
}

/// Filters echoed back by get_historical_pit_stats.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct PitFiltersApplied {
    pub circuit: Option<String>,
    pub team: Option<String>,
    pub season: Option<i64>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HistoricalPitStatsOutput {
    #[serde(flatten)]
    pub table: TabularOutput,
    /// Dimensions the aggregates are grouped by
    pub grouped_by: Vec<String>,
    pub filters_applied: PitFiltersApplied,
    pub use_case: String,
}

/// Input for the analyze_race_factors tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RaceFactorsInput {
    /// Season year to analyze (1950-2100)
    pub season: i64,
    /// Optional race name filter, partial and case-insensitive
    #[serde(default, alias = "race_name")]
    pub race: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub enum CorrelationStrength {
    Strong,
    Moderate,
    Weak,
}

impl CorrelationStrength {
    pub fn of(coefficient: f64) -> Self {
        let magnitude = coefficient.abs();
        if magnitude > 0.7 {
            Self::Strong
        } else if magnitude > 0.4 {
            Self::Moderate
        } else {
            Self::Weak
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Moderate => "moderate",
            Self::Weak => "weak",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct RaceFactorAnalysis {
    /// Pearson correlation of grid and finish position, 3 decimals
    pub grid_finish_correlation: f64,
    pub correlation_interpretation: CorrelationStrength,
    /// Mean of grid minus finish position; positive means places gained
    pub avg_position_change: f64,
    /// Percent of entries not classified as Finished
    pub dnf_rate: f64,
    pub avg_pit_stop_ms: f64,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RaceFactorsOutput {
    pub season: i64,
    pub race: String,
    pub total_entries: usize,
    pub analysis: RaceFactorAnalysis,
    pub insights: Vec<String>,
    pub execution_time_ms: u64,
}

/// Handler for the pre-built statistics tools.
pub struct StatsToolHandler {
    runner: Arc<QueryRunner>,
}

impl StatsToolHandler {
    pub fn new(runner: Arc<QueryRunner>) -> Self {
        Self { runner }
    }

    fn limit(&self, requested: Option<u32>, default: u32) -> GatewayResult<u32> {
        args::bounded("limit", requested, default, self.runner.settings().max_result_rows)
    }

    pub async fn driver_season_stats(
        &self,
        input: DriverSeasonStatsInput,
    ) -> GatewayResult<TabularOutput> {
        let driver = args::filter_text("driver", input.driver.as_deref())?;
        let team = args::filter_text("team", input.team.as_deref())?;
        let season = args::season(input.season)?;
        let limit = self.limit(input.limit, 50)?;

        let conditions = Conditions::new()
            .contains_opt("driverName", "driver_name", driver.as_deref())
            .equals_opt("season", "season", season)
            .contains_opt("teamName", "team_name", team.as_deref());
        let sql = format!(
            "SELECT season, driverName, teamName, races_count, total_points, wins, podiums, \
             dnf_count, avg_grid_position, avg_finish_position, final_champ_position \
             FROM {} {} ORDER BY season DESC, total_points DESC LIMIT {}",
            self.runner.table(DRIVER_STATS_TABLE),
            conditions.where_clause(),
            limit
        );

        let result = self
            .runner
            .run("get_driver_season_stats", conditions.bind_to(sql), limit)
            .await?;
        Ok(TabularOutput::from_result(&self.runner, &result, input.format))
    }

    pub async fn constructor_season_stats(
        &self,
        input: ConstructorSeasonStatsInput,
    ) -> GatewayResult<TabularOutput> {
        let team = args::filter_text("team", input.team.as_deref())?;
        let season = args::season(input.season)?;
        let limit = self.limit(input.limit, 50)?;

        let conditions = Conditions::new()
            .contains_opt("teamName", "team_name", team.as_deref())
            .equals_opt("season", "season", season);
        let sql = format!(
            "SELECT season, teamName, teamNationality, entries_count, team_total_points, wins, \
             podiums, dnf_count, final_cons_position \
             FROM {} {} ORDER BY season DESC, team_total_points DESC LIMIT {}",
            self.runner.table(CONSTRUCTOR_STATS_TABLE),
            conditions.where_clause(),
            limit
        );

        let result = self
            .runner
            .run("get_constructor_season_stats", conditions.bind_to(sql), limit)
            .await?;
        Ok(TabularOutput::from_result(&self.runner, &result, input.format))
    }

    pub async fn race_results(&self, input: RaceResultsInput) -> GatewayResult<TabularOutput> {
        let race = args::filter_text("race", input.race.as_deref())?;
        let driver = args::filter_text("driver", input.driver.as_deref())?;
        let season = args::season(input.season)?;
        let limit = self.limit(input.limit, 100)?;

        let conditions = Conditions::new()
            .contains_opt("raceName", "race_name", race.as_deref())
            .equals_opt("season", "season", season)
            .contains_opt("driverName", "driver_name", driver.as_deref());
        let sql = format!(
            "SELECT season, round, raceName, circuitName, country, driverName, teamName, grid, \
             race_finish_position, race_points, pit_stop_count, avg_pit_stop_ms, statusDescription \
             FROM {} {} ORDER BY season DESC, round DESC, race_finish_position LIMIT {}",
            self.runner.table(RACE_FEATURES_TABLE),
            conditions.where_clause(),
            limit
        );

        let result = self
            .runner
            .run("get_race_results", conditions.bind_to(sql), limit)
            .await?;
        Ok(TabularOutput::from_result(&self.runner, &result, input.format))
    }

    pub async fn pit_stop_data(&self, input: PitStopDataInput) -> GatewayResult<TabularOutput> {
        let driver = args::filter_text("driver", input.driver.as_deref())?;
        let team = args::filter_text("team", input.team.as_deref())?;
        let season = args::season(input.season)?;
        let limit = self.limit(input.limit, 500)?;

        let conditions = Conditions::new()
            .raw("pit_stop_count > 0")
            .equals_opt("season", "season", season)
            .contains_opt("driverName", "driver_name", driver.as_deref())
            .contains_opt("teamName", "team_name", team.as_deref());
        let sql = format!(
            "SELECT season, raceName, driverName, teamName, pit_stop_count, avg_pit_stop_ms, \
             total_pit_stop_ms, race_finish_position \
             FROM {} {} ORDER BY season DESC, avg_pit_stop_ms LIMIT {}",
            self.runner.table(RACE_FEATURES_TABLE),
            conditions.where_clause(),
            limit
        );

        let result = self
            .runner
            .run("get_pit_stop_data", conditions.bind_to(sql), limit)
            .await?;
        Ok(TabularOutput::from_result(&self.runner, &result, input.format))
    }

    /// Aggregate pit-stop durations, grouped by every dimension not pinned to one value.
    pub async fn historical_pit_stats(
        &self,
        input: HistoricalPitStatsInput,
    ) -> GatewayResult<HistoricalPitStatsOutput> {
        let circuit = args::filter_text("circuit", input.circuit.as_deref())?;
        let team = args::filter_text("team", input.team.as_deref())?;
        let season = args::season(input.season)?;

        let mut group_by: Vec<&str> = Vec::new();
        let mut conditions = Conditions::new()
            .raw("pit_stop_count > 0")
            .raw("avg_pit_stop_ms > 0");
        if let Some(circuit) = circuit.as_deref() {
            conditions = conditions.contains("circuitName", "circuit_name", circuit);
            group_by.push("circuitName");
        }
        if let Some(team) = team.as_deref() {
            conditions = conditions.contains("teamName", "team_name", team);
            group_by.push("teamName");
        }
        match season {
            Some(season) => conditions = conditions.equals("season", "season", season),
            None => group_by.push("season"),
        }

        let table = self.runner.table(RACE_FEATURES_TABLE);
        let (sql, limit) = if group_by.is_empty() {
            let sql = format!(
                "SELECT COUNT(*) AS total_races, AVG(pit_stop_count) AS avg_stops_per_race, \
                 AVG(avg_pit_stop_ms) AS avg_pit_duration_ms, \
                 MIN(avg_pit_stop_ms) AS fastest_avg_pit_ms, \
                 MAX(avg_pit_stop_ms) AS slowest_avg_pit_ms, \
                 PERCENTILE_APPROX(avg_pit_stop_ms, 0.5) AS median_pit_duration_ms, \
                 STDDEV(avg_pit_stop_ms) AS pit_duration_stddev \
                 FROM {} {}",
                table,
                conditions.where_clause()
            );
            (sql, 1)
        } else {
            let dims = group_by.join(", ");
            let sql = format!(
                "SELECT {dims}, COUNT(*) AS race_count, AVG(pit_stop_count) AS avg_stops_per_race, \
                 AVG(avg_pit_stop_ms) AS avg_pit_duration_ms, \
                 MIN(avg_pit_stop_ms) AS fastest_avg_pit_ms, \
                 MAX(avg_pit_stop_ms) AS slowest_avg_pit_ms, \
                 STDDEV(avg_pit_stop_ms) AS pit_duration_stddev \
                 FROM {table} {filter} GROUP BY {dims} ORDER BY avg_pit_duration_ms LIMIT {limit}",
                filter = conditions.where_clause(),
                limit = HISTORICAL_PIT_LIMIT,
            );
            (sql, HISTORICAL_PIT_LIMIT)
        };

        let result = self
            .runner
            .run("get_historical_pit_stats", conditions.bind_to(sql), limit)
            .await?;

        Ok(HistoricalPitStatsOutput {
            table: TabularOutput::from_result(&self.runner, &result, input.format),
            grouped_by: group_by.into_iter().map(String::from).collect(),
            filters_applied: PitFiltersApplied {
                circuit,
                team,
                season,
            },
            use_case: "Use this data to understand typical pit stop patterns and provide context \
                       for predictions."
                .to_string(),
        })
    }

    /// Grid/finish correlation, position changes, DNF rate and pit-stop time for a season.
    pub async fn race_factors(&self, input: RaceFactorsInput) -> GatewayResult<RaceFactorsOutput> {
        let season = args::required_season(input.season)?;
        let race = args::filter_text("race", input.race.as_deref())?;

        let conditions = Conditions::new()
            .equals("season", "season", season)
            .raw("race_finish_position IS NOT NULL")
            .raw("grid IS NOT NULL")
            .contains_opt("raceName", "race_name", race.as_deref());
        let sql = format!(
            "SELECT grid, race_finish_position, quali_best_position, pit_stop_count, \
             avg_pit_stop_ms, race_points, statusDescription FROM {} {} LIMIT {}",
            self.runner.table(RACE_FEATURES_TABLE),
            conditions.where_clause(),
            RACE_FACTORS_LIMIT
        );

        let result = self
            .runner
            .run("analyze_race_factors", conditions.bind_to(sql), RACE_FACTORS_LIMIT)
            .await?;
        if result.is_empty() {
            return Err(GatewayError::invalid_argument(
                "season",
                format!("no race data found for season {}", season),
            ));
        }

        let analysis = analyze_rows(&result.rows);
        let insights = insights(&analysis, race.is_some());
        info!(
            season,
            entries = result.row_count,
            correlation = analysis.grid_finish_correlation,
            "Race factors analyzed"
        );

        Ok(RaceFactorsOutput {
            season,
            race: race.unwrap_or_else(|| "all races".to_string()),
            total_entries: result.row_count,
            analysis,
            insights,
            execution_time_ms: result.execution_time_ms,
        })
    }
}

type Row = serde_json::Map<String, serde_json::Value>;

/// Positive numeric cell; zero grid slots (pit-lane starts) count as absent.
fn position(row: &Row, column: &str) -> Option<f64> {
    row.get(column).and_then(numeric_value).filter(|v| *v > 0.0)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn analyze_rows(rows: &[Row]) -> RaceFactorAnalysis {
    let (grids, finishes): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|row| Some((position(row, "grid")?, position(row, "race_finish_position")?)))
        .unzip();
    let correlation = pearson(&grids, &finishes).unwrap_or(0.0);
    let changes: Vec<f64> = grids.iter().zip(&finishes).map(|(g, f)| g - f).collect();

    let dnf = rows
        .iter()
        .filter(|row| row.get("statusDescription").and_then(|v| v.as_str()) != Some("Finished"))
        .count();
    let dnf_rate = if rows.is_empty() {
        0.0
    } else {
        dnf as f64 / rows.len() as f64 * 100.0
    };

    let pit_times: Vec<f64> = rows
        .iter()
        .filter_map(|row| row.get("avg_pit_stop_ms").and_then(numeric_value))
        .filter(|v| *v > 0.0)
        .collect();

    RaceFactorAnalysis {
        grid_finish_correlation: round_to(correlation, 3),
        correlation_interpretation: CorrelationStrength::of(correlation),
        avg_position_change: round_to(mean(&changes), 2),
        dnf_rate: round_to(dnf_rate, 1),
        avg_pit_stop_ms: round_to(mean(&pit_times), 0),
    }
}

fn insights(analysis: &RaceFactorAnalysis, single_race: bool) -> Vec<String> {
    let change = analysis.avg_position_change;
    vec![
        format!(
            "Grid position has a {} correlation with finish position.",
            analysis.correlation_interpretation.label()
        ),
        format!(
            "Drivers {} an average of {:.1} positions from grid to finish.",
            if change > 0.0 { "gain" } else { "lose" },
            change.abs()
        ),
        format!(
            "DNF rate for the {} is {:.1}%.",
            if single_race { "race" } else { "season" },
            analysis.dnf_rate
        ),
    ]
}
