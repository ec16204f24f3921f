//! Configuration management for AutoMarks services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default, config/{APP_ENV}, config/local)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Grade point policy used for SGPA/CGPA
    #[serde(default)]
    pub grading: GradingConfig,

    /// Export configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Bulk ingestion configuration
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Create missing tables at startup
    #[serde(default = "default_apply_schema")]
    pub apply_schema: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log filter directive (e.g. "info", "automarks_analytics=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Prometheus exporter port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    #[serde(default = "default_service_name")]
    pub service_name: String,
}

/// One band of the mark to grade point table.
///
/// `lower_bound` is a percentage of `max_total_marks`; a result scores
/// `grade_point` when its percentage is at or above the bound.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct GradeBand {
    pub lower_bound: f64,
    pub grade_point: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GradingConfig {
    /// Bands ordered by descending lower bound
    #[serde(default = "default_grade_scale")]
    pub scale: Vec<GradeBand>,

    /// Maximum achievable total (internal + external)
    #[serde(default = "default_max_total_marks")]
    pub max_total_marks: f64,

    /// Credits assumed for subjects without a configured credit value
    #[serde(default = "default_credits")]
    pub default_credits: i32,

    /// Grade point awarded when a previously failed subject is cleared.
    /// `None` disables the carry-over cap.
    #[serde(default = "default_carryover_grade_point")]
    pub carryover_grade_point: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Directory the ingestion binary writes its batch summary into
    #[serde(default = "default_export_dir")]
    pub output_dir: PathBuf,

    /// Upper bound on rows rendered in a single export
    #[serde(default = "default_export_max_rows")]
    pub max_rows: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestionConfig {
    /// Directory holding extracted result documents (*.json)
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Batch (YYYY-YYYY) assigned to newly created students
    pub batch: Option<String>,

    /// Abort the run on the first failing document
    #[serde(default)]
    pub fail_fast: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_database_url() -> String { "postgres://localhost/vtu_results".to_string() }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_apply_schema() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "automarks".to_string() }
fn default_max_total_marks() -> f64 { 200.0 }
fn default_credits() -> i32 { 4 }
fn default_carryover_grade_point() -> Option<f64> { Some(4.0) }
fn default_export_dir() -> PathBuf { PathBuf::from("exports") }
fn default_export_max_rows() -> usize { 100_000 }
fn default_input_dir() -> PathBuf { PathBuf::from("extracted") }

/// CBCS 10-point table
fn default_grade_scale() -> Vec<GradeBand> {
    [
        (90.0, 10.0),
        (80.0, 9.0),
        (70.0, 8.0),
        (60.0, 7.0),
        (50.0, 6.0),
        (45.0, 5.0),
        (40.0, 4.0),
    ]
    .into_iter()
    .map(|(lower_bound, grade_point)| GradeBand { lower_bound, grade_point })
    .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            read_url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            apply_schema: default_apply_schema(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            scale: default_grade_scale(),
            max_total_marks: default_max_total_marks(),
            default_credits: default_credits(),
            carryover_grade_point: default_carryover_grade_point(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_export_dir(),
            max_rows: default_export_max_rows(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            batch: None,
            fail_fast: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g. APP__DATABASE__URL=postgres://...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific file, still honouring APP__ overrides
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }

    /// Get the read database URL (falls back to primary)
    pub fn read_database_url(&self) -> &str {
        self.database.read_url.as_deref().unwrap_or(&self.database.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.grading.max_total_marks, 200.0);
        assert_eq!(config.grading.default_credits, 4);
    }

    #[test]
    fn test_default_scale_is_descending() {
        let scale = GradingConfig::default().scale;
        assert_eq!(scale.first().map(|b| b.grade_point), Some(10.0));
        assert!(scale.windows(2).all(|w| w[0].lower_bound > w[1].lower_bound));
    }

    #[test]
    fn test_read_database_fallback() {
        let config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/vtu_results");
    }
}
