//! Configuration handling for the F1 MCP gateway.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! The parsed [`Config`] is turned into two immutable values at startup:
//! [`GatewaySettings`] (scope and limits shared by every handler) and
//! [`WarehouseConnection`] (where and how to reach the warehouse).

use crate::error::{GatewayError, GatewayResult};
use crate::models::{DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT};
use crate::tools::sql_validator::{DEFAULT_MAX_STATEMENT_LENGTH, ValidatorPolicy};
use clap::{Parser, ValueEnum};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_CATALOG: &str = "workspace";
pub const DEFAULT_SCHEMA: &str = "f1";
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024;

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Configuration for the F1 MCP gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "f1-mcp-gateway",
    about = "MCP gateway for read-only F1 analytics on a Databricks SQL warehouse",
    version,
    author
)]
pub struct Config {
    /// Workspace URL, e.g. https://adb-123.azuredatabricks.net
    #[arg(long, value_name = "URL", env = "DATABRICKS_HOST")]
    pub databricks_host: Option<String>,

    /// Personal access token passed through to the warehouse
    #[arg(long, value_name = "TOKEN", env = "DATABRICKS_TOKEN", hide_env_values = true)]
    pub databricks_token: Option<String>,

    /// SQL warehouse id
    #[arg(long, value_name = "ID", env = "DATABRICKS_WAREHOUSE_ID")]
    pub warehouse_id: Option<String>,

    /// Catalog holding the F1 tables
    #[arg(long, default_value = DEFAULT_CATALOG, env = "DATABRICKS_CATALOG")]
    pub catalog: String,

    /// Schema holding the F1 tables
    #[arg(long, default_value = DEFAULT_SCHEMA, env = "DATABRICKS_SCHEMA")]
    pub schema: String,

    /// Additional catalogs ad-hoc queries may read.
    /// Can be specified multiple times or as comma-separated values.
    #[arg(
        long = "allowed-catalog",
        value_name = "CATALOG",
        env = "ALLOWED_CATALOGS",
        value_delimiter = ','
    )]
    pub allowed_catalogs: Vec<String>,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "QUERY_TIMEOUT_SECONDS"
    )]
    pub query_timeout: u64,

    /// Row limit used when a tool call does not give one
    #[arg(long, default_value_t = DEFAULT_ROW_LIMIT, env = "DEFAULT_ROW_LIMIT")]
    pub default_row_limit: u32,

    /// Upper bound on rows fetched for any single query
    #[arg(long, default_value_t = MAX_ROW_LIMIT, env = "MAX_RESULT_ROWS")]
    pub max_result_rows: u32,

    /// Maximum statement length in characters
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_STATEMENT_LENGTH,
        env = "MAX_STATEMENT_LENGTH"
    )]
    pub max_statement_length: usize,

    /// Byte budget for formatted tool output
    #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_BYTES, env = "MAX_OUTPUT_BYTES")]
    pub max_output_bytes: usize,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HTTP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_HTTP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_ENDPOINT"
    )]
    pub mcp_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to avoid interfering with stdio transport)
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            databricks_host: None,
            databricks_token: None,
            warehouse_id: None,
            catalog: DEFAULT_CATALOG.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            allowed_catalogs: Vec::new(),
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            default_row_limit: DEFAULT_ROW_LIMIT,
            max_result_rows: MAX_ROW_LIMIT,
            max_statement_length: DEFAULT_MAX_STATEMENT_LENGTH,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Validate scope and limits into the settings shared by all handlers.
    pub fn settings(&self) -> GatewayResult<GatewaySettings> {
        check_identifier("catalog", &self.catalog)?;
        check_identifier("schema", &self.schema)?;
        for extra in &self.allowed_catalogs {
            check_identifier("allowed-catalog", extra)?;
        }
        if self.query_timeout == 0 {
            return Err(GatewayError::configuration(
                "query-timeout must be at least 1 second",
            ));
        }
        if self.max_result_rows == 0 || self.max_result_rows > MAX_ROW_LIMIT {
            return Err(GatewayError::configuration(format!(
                "max-result-rows must be between 1 and {}",
                MAX_ROW_LIMIT
            )));
        }
        if self.default_row_limit == 0 || self.default_row_limit > self.max_result_rows {
            return Err(GatewayError::configuration(
                "default-row-limit must be between 1 and max-result-rows",
            ));
        }
        if self.max_statement_length == 0 {
            return Err(GatewayError::configuration(
                "max-statement-length must be positive",
            ));
        }
        if self.max_output_bytes < 1024 {
            return Err(GatewayError::configuration(
                "max-output-bytes must be at least 1024",
            ));
        }

        Ok(GatewaySettings {
            catalog: self.catalog.clone(),
            schema: self.schema.clone(),
            extra_catalogs: self.allowed_catalogs.clone(),
            query_timeout: self.query_timeout_duration(),
            default_row_limit: self.default_row_limit,
            max_result_rows: self.max_result_rows,
            max_statement_length: self.max_statement_length,
            max_output_bytes: self.max_output_bytes,
        })
    }

    /// Build the warehouse connection from host, token and warehouse id.
    pub fn warehouse(&self) -> GatewayResult<WarehouseConnection> {
        let host = self
            .databricks_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| GatewayError::configuration("databricks-host is required"))?;
        let token = self
            .databricks_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GatewayError::configuration("databricks-token is required"))?;
        let warehouse_id = self
            .warehouse_id
            .as_deref()
            .filter(|w| !w.trim().is_empty())
            .ok_or_else(|| GatewayError::configuration("warehouse-id is required"))?;

        // Bare hostnames are accepted and assumed to be https
        let with_scheme = if host.contains("://") {
            host.trim().to_string()
        } else {
            format!("https://{}", host.trim())
        };
        let url = Url::parse(&with_scheme)
            .map_err(|e| GatewayError::configuration(format!("Invalid databricks-host: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(GatewayError::configuration(
                "databricks-host must be an http(s) URL",
            ));
        }

        Ok(WarehouseConnection {
            host: url,
            token: token.trim().to_string(),
            warehouse_id: warehouse_id.trim().to_string(),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

fn check_identifier(flag: &str, value: &str) -> GatewayResult<()> {
    let valid = !value.is_empty()
        && value.len() <= 255
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GatewayError::configuration(format!(
            "{} must be a plain identifier (letters, digits, underscore), got '{}'",
            flag, value
        )))
    }
}

/// Process-wide scope and limits, read-only after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub catalog: String,
    pub schema: String,
    pub extra_catalogs: Vec<String>,
    pub query_timeout: Duration,
    pub default_row_limit: u32,
    pub max_result_rows: u32,
    pub max_statement_length: usize,
    pub max_output_bytes: usize,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            catalog: DEFAULT_CATALOG.to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            extra_catalogs: Vec::new(),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            default_row_limit: DEFAULT_ROW_LIMIT,
            max_result_rows: MAX_ROW_LIMIT,
            max_statement_length: DEFAULT_MAX_STATEMENT_LENGTH,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl GatewaySettings {
    /// Fully qualified name of a table in the configured schema.
    pub fn table(&self, name: &str) -> String {
        format!("{}.{}.{}", self.catalog, self.schema, name)
    }

    /// `catalog.schema` prefix.
    pub fn qualified_schema(&self) -> String {
        format!("{}.{}", self.catalog, self.schema)
    }

    pub fn validator_policy(&self) -> ValidatorPolicy {
        ValidatorPolicy::new(&self.catalog, &self.schema)
            .with_max_length(self.max_statement_length)
            .with_extra_catalogs(self.extra_catalogs.iter().map(String::as_str))
    }
}

/// Where the warehouse lives and the credentials used to reach it.
#[derive(Clone)]
pub struct WarehouseConnection {
    pub host: Url,
    pub token: String,
    pub warehouse_id: String,
}

impl std::fmt::Debug for WarehouseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConnection")
            .field("host", &self.host.as_str())
            .field("token", &"<redacted>")
            .field("warehouse_id", &self.warehouse_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        Config {
            databricks_host: Some("https://adb-1.azuredatabricks.net".into()),
            databricks_token: Some("dapi-secret".into()),
            warehouse_id: Some("abc123".into()),
            ..Config::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.catalog, "workspace");
        assert_eq!(config.schema, "f1");
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_settings_from_defaults() {
        let settings = Config::default().settings().unwrap();
        assert_eq!(settings, GatewaySettings::default());
        assert_eq!(
            settings.table("f1_gold_driver_season_stats"),
            "workspace.f1.f1_gold_driver_season_stats"
        );
    }

    #[test]
    fn test_settings_rejects_bad_identifiers() {
        let config = Config {
            schema: "f1; DROP".into(),
            ..Config::default()
        };
        let err = config.settings().unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");

        let config = Config {
            allowed_catalogs: vec!["samples".into(), "bad.name".into()],
            ..Config::default()
        };
        assert!(config.settings().is_err());
    }

    #[test]
    fn test_settings_rejects_bad_limits() {
        let config = Config {
            default_row_limit: 20_000,
            ..Config::default()
        };
        assert!(config.settings().is_err());

        let config = Config {
            query_timeout: 0,
            ..Config::default()
        };
        assert!(config.settings().is_err());
    }

    #[test]
    fn test_warehouse_requires_credentials() {
        let err = Config::default().warehouse().unwrap_err();
        assert!(err.to_string().contains("databricks-host"));

        let config = Config {
            databricks_token: None,
            ..configured()
        };
        assert!(config.warehouse().is_err());
    }

    #[test]
    fn test_warehouse_accepts_bare_host() {
        let config = Config {
            databricks_host: Some("adb-1.azuredatabricks.net".into()),
            ..configured()
        };
        let conn = config.warehouse().unwrap();
        assert_eq!(conn.host.scheme(), "https");
        assert_eq!(conn.warehouse_id, "abc123");
    }

    #[test]
    fn test_warehouse_debug_redacts_token() {
        let conn = configured().warehouse().unwrap();
        let debug = format!("{:?}", conn);
        assert!(!debug.contains("dapi-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_validator_policy_uses_scope() {
        let settings = Config {
            catalog: "main".into(),
            schema: "racing".into(),
            ..Config::default()
        }
        .settings()
        .unwrap();
        let verdict = crate::tools::sql_validator::validate(
            "SELECT * FROM main.racing.f1_gold_driver_season_stats",
            &settings.validator_policy(),
        );
        assert!(verdict.allowed);
    }
}
