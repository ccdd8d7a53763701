//! MCP service implementation using rmcp.
//!
//! This module defines the GatewayService struct with every F1 analytics tool
//! exposed via the MCP protocol using the rmcp framework's macros.

use crate::mcp::params::Parameters;
use crate::tools::prediction::{ModelInfoOutput, PredictPitStopsInput, PredictPitStopsOutput};
use crate::tools::query::{QueryInput, TabularOutput};
use crate::tools::schema::{
    DataOverviewOutput, DescribeTableInput, DescribeTableOutput, ListTablesInput,
    ListTablesOutput, TableSampleInput,
};
use crate::tools::stats::{
    ConstructorSeasonStatsInput, DriverSeasonStatsInput, HistoricalPitStatsInput,
    HistoricalPitStatsOutput, PitStopDataInput, RaceFactorsInput, RaceFactorsOutput,
    RaceResultsInput,
};
use crate::tools::visualization::{
    CorrelationHeatmapInput, CorrelationHeatmapOutput, CustomChartInput, CustomChartOutput,
    DriverPerformanceInput, DriverPerformanceOutput, PitStopAnalysisInput, PitStopAnalysisOutput,
    SeasonStandingsInput, SeasonStandingsOutput, TeamComparisonInput, TeamComparisonOutput,
};
use crate::tools::{
    PredictionToolHandler, QueryRunner, QueryToolHandler, SchemaToolHandler, StatsToolHandler,
    VisualizationToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayService {
    /// Shared validate-and-execute pipeline for every tool
    runner: Arc<QueryRunner>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl GatewayService {
    /// Create a new GatewayService instance around a shared runner.
    pub fn new(runner: Arc<QueryRunner>) -> Self {
        Self {
            runner,
            tool_router: Self::tool_router(),
        }
    }

    fn stats(&self) -> StatsToolHandler {
        StatsToolHandler::new(self.runner.clone())
    }

    fn schema(&self) -> SchemaToolHandler {
        SchemaToolHandler::new(self.runner.clone())
    }

    fn charts(&self) -> VisualizationToolHandler {
        VisualizationToolHandler::new(self.runner.clone())
    }
}

#[tool_router]
impl GatewayService {
    #[tool(
        description = "Run a read-only SQL query against the F1 warehouse.\nOnly SELECT, WITH, SHOW and DESCRIBE are accepted; anything that could modify data is refused.\nTables live in the configured schema, e.g. f1.f1_gold_driver_season_stats.\nOutput format: text (default), markdown, table or json."
    )]
    async fn query_f1_data(
        &self,
        Parameters(input): Parameters<QueryInput>,
    ) -> Result<Json<TabularOutput>, McpError> {
        QueryToolHandler::new(self.runner.clone())
            .query(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Driver statistics per season: points, wins, podiums, DNFs, average grid and finish positions, championship position.\nFilter by driver, season and team (partial names accepted)."
    )]
    async fn get_driver_season_stats(
        &self,
        Parameters(input): Parameters<DriverSeasonStatsInput>,
    ) -> Result<Json<TabularOutput>, McpError> {
        self.stats()
            .driver_season_stats(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Constructor (team) statistics per season: points, wins, podiums, DNFs, championship position.\nFilter by team and season."
    )]
    async fn get_constructor_season_stats(
        &self,
        Parameters(input): Parameters<ConstructorSeasonStatsInput>,
    ) -> Result<Json<TabularOutput>, McpError> {
        self.stats()
            .constructor_season_stats(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Race results per driver: grid, finish position, points, pit stops and status.\nFilter by race name, season and driver."
    )]
    async fn get_race_results(
        &self,
        Parameters(input): Parameters<RaceResultsInput>,
    ) -> Result<Json<TabularOutput>, McpError> {
        self.stats()
            .race_results(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Pit-stop counts and durations per driver and race.\nFilter by season, driver and team."
    )]
    async fn get_pit_stop_data(
        &self,
        Parameters(input): Parameters<PitStopDataInput>,
    ) -> Result<Json<TabularOutput>, McpError> {
        self.stats()
            .pit_stop_data(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Aggregated pit-stop statistics (average, fastest, slowest, spread).\nGrouped by circuit and team when those filters are given, and by season unless one season is selected."
    )]
    async fn get_historical_pit_stats(
        &self,
        Parameters(input): Parameters<HistoricalPitStatsInput>,
    ) -> Result<Json<HistoricalPitStatsOutput>, McpError> {
        self.stats()
            .historical_pit_stats(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Analyze what drives race results in a season: grid/finish correlation, average places gained, DNF rate and pit-stop time, with plain-language insights.\nOptionally restrict to one race."
    )]
    async fn analyze_race_factors(
        &self,
        Parameters(input): Parameters<RaceFactorsInput>,
    ) -> Result<Json<RaceFactorsOutput>, McpError> {
        self.stats()
            .race_factors(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "List F1 tables grouped by layer: bronze (raw), silver (cleaned), gold (aggregated).\nSilver and gold are included by default."
    )]
    async fn list_f1_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.schema()
            .list_tables(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Get the column definitions of an F1 table.")]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<Json<DescribeTableOutput>, McpError> {
        self.schema()
            .describe_table(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Get up to 20 sample rows from an F1 table.")]
    async fn get_table_sample(
        &self,
        Parameters(input): Parameters<TableSampleInput>,
    ) -> Result<Json<TabularOutput>, McpError> {
        self.schema()
            .table_sample(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Overview of the gold tables: row counts, season ranges, descriptions and recommended use cases.\nA good first call."
    )]
    async fn get_f1_data_overview(&self) -> Result<Json<DataOverviewOutput>, McpError> {
        self.schema()
            .data_overview()
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Chart one driver's metric across seasons as a PNG (line or bar).\nMetrics: total_points, wins, podiums, avg_finish_position, dnf_count, races_count."
    )]
    async fn chart_driver_performance(
        &self,
        Parameters(input): Parameters<DriverPerformanceInput>,
    ) -> Result<Json<DriverPerformanceOutput>, McpError> {
        self.charts()
            .driver_performance(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Compare two or more teams on one metric as a PNG chart.\nOne season gives a bar chart; otherwise the latest five seasons are drawn as lines."
    )]
    async fn chart_team_comparison(
        &self,
        Parameters(input): Parameters<TeamComparisonInput>,
    ) -> Result<Json<TeamComparisonOutput>, McpError> {
        self.charts()
            .team_comparison(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Chart pit-stop performance as a PNG: box plot of durations per team, or scatter of duration against finish position."
    )]
    async fn chart_pit_stop_analysis(
        &self,
        Parameters(input): Parameters<PitStopAnalysisInput>,
    ) -> Result<Json<PitStopAnalysisOutput>, McpError> {
        self.charts()
            .pit_stop_analysis(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Correlation heatmap (PNG) of race-level features such as grid, finish position, points and pit stops."
    )]
    async fn chart_correlation_heatmap(
        &self,
        Parameters(input): Parameters<CorrelationHeatmapInput>,
    ) -> Result<Json<CorrelationHeatmapOutput>, McpError> {
        self.charts()
            .correlation_heatmap(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Championship standings of a season as a horizontal bar chart (PNG), for drivers or constructors."
    )]
    async fn chart_season_standings(
        &self,
        Parameters(input): Parameters<SeasonStandingsInput>,
    ) -> Result<Json<SeasonStandingsOutput>, McpError> {
        self.charts()
            .season_standings(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Chart the result of your own read-only query as a PNG.\nChart types: bar, line, scatter, horizontal_bar. A group_column draws one line per group.\nAt most 500 rows are used."
    )]
    async fn chart_custom(
        &self,
        Parameters(input): Parameters<CustomChartInput>,
    ) -> Result<Json<CustomChartOutput>, McpError> {
        self.charts()
            .custom_chart(input)
            .await
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(
        description = "Placeholder pit-stop predictions: optimal_pit_count or pit_stop_duration.\nNo trained model is loaded; estimates carry zero confidence."
    )]
    async fn predict_pit_stops(
        &self,
        Parameters(input): Parameters<PredictPitStopsInput>,
    ) -> Result<Json<PredictPitStopsOutput>, McpError> {
        PredictionToolHandler::new()
            .predict(input)
            .map(Json)
            .map_err(McpError::from)
    }

    #[tool(description = "Describe the prediction model and its status.")]
    async fn get_model_info(&self) -> Json<ModelInfoOutput> {
        Json(PredictionToolHandler::new().model_info())
    }
}

#[tool_handler]
impl ServerHandler for GatewayService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "f1-mcp-gateway".to_owned(),
                title: Some("F1 Analytics MCP Gateway".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(format!(
                "Read-only Formula 1 analytics over {schema}.\n\
                \n\
                ## Workflow\n\
                1. Call `get_f1_data_overview` or `list_f1_tables` to see what data exists\n\
                2. Prefer the pre-built tools (`get_driver_season_stats`, `get_race_results`, ...)\n\
                3. Use `describe_table` before writing SQL for `query_f1_data` or `chart_custom`\n\
                \n\
                ## Tables\n\
                - Gold: f1_gold_driver_season_stats, f1_gold_constructor_season_stats, \
                f1_gold_race_driver_features\n\
                - Silver/bronze: cleaned and raw source tables\n\
                \n\
                ## Rules\n\
                - Only SELECT, WITH, SHOW and DESCRIBE run; one statement per call\n\
                - Queries stay inside {schema}\n\
                - Charts come back as base64 PNG with a text description\n\
                - Failed calls report a `kind` such as InvalidArgument, QueryTimeout or EmptyDataset",
                schema = self.runner.settings().qualified_schema()
            )),
        }
    }
}
