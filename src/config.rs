//! Configuration module for appd-stats.
//!
//! Loads the per-controller report configuration from a YAML file whose
//! location comes from the environment, with sensible defaults.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "conf.yaml";

/// Tokens shorter than this are accepted but logged as suspect.
pub const DEFAULT_TOKEN_MIN_LENGTH: usize = 100;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("unsupported time range: {0:?} (supported: {})", crate::timerange::supported_presets())]
    UnsupportedTimeRange(String),
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Optional log file, truncated at start.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub on_unsupported_timerange: TimeRangeFailure,
    /// One entry per controller, processed in file order.
    #[serde(default)]
    pub stats: Vec<ControllerConfig>,
}

/// What to do with the rest of the run when a controller names an
/// unknown time range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRangeFailure {
    #[default]
    AbortRun,
    SkipController,
}

/// Failure policy for the per-application health-rule requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthRuleFailure {
    /// The first failed request discards the whole stage.
    #[default]
    AbortStage,
    /// A failed application is skipped; the others keep their rules.
    Isolate,
}

/// Report output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Csv,
}

/// Where and how reports are written.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            formats: default_formats(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Html]
}

fn default_token_min_length() -> usize {
    DEFAULT_TOKEN_MIN_LENGTH
}

/// A single controller: endpoint, credentials and report metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerConfig {
    pub name: String,
    pub url: String,
    /// OAuth API client name.
    pub client: String,
    /// OAuth API client secret.
    pub secret: String,
    /// Controller account the client belongs to.
    pub account: String,
    /// Pre-encoded HTTP Basic credential for the login endpoint.
    pub auth: String,
    #[serde(default)]
    pub health_rule_failures: HealthRuleFailure,
    #[serde(default = "default_token_min_length")]
    pub token_min_length: usize,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Display metadata for a controller's report.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub name: String,
    pub subtitle: String,
    pub timerange: String,
    pub scope: String,
    pub team: String,
    pub description: String,
    pub header: HeaderConfig,
}

/// Free-text header lines shown above the report title.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub b2: String,
    pub b3: String,
    pub b4: String,
    pub b5: String,
}

impl AppConfig {
    /// Load configuration from the file named by the environment.
    ///
    /// Environment variables:
    /// - `APPD_STATS_CONFIG`: config file path (default: "conf.yaml")
    /// - `APPD_STATS_LOG_FILE`: log file path, overrides `log_file`
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("APPD_STATS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::from_file(&path)?;

        if let Ok(log_file) = env::var("APPD_STATS_LOG_FILE") {
            if !log_file.is_empty() {
                cfg.log_file = Some(PathBuf::from(log_file));
            }
        }

        Ok(cfg)
    }

    /// Load configuration from an explicit path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
