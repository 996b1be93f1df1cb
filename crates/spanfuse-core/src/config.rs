//! spanfuse Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults that reproduce the stock merge and validation behaviour.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Span merge configuration
    pub merge: MergeConfig,

    /// Code-format validation configuration
    pub validation: ValidationConfig,

    /// Report rendering configuration
    pub report: ReportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(policy) = std::env::var("SPANFUSE_CONFLICT_POLICY") {
            config.merge.conflict_policy = policy.parse()?;
        }

        // Comma-separated
        if let Ok(labels) = std::env::var("SPANFUSE_CUSTOM_LABELS") {
            config.report.custom_labels = labels
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            config.logging.json_format = parse_bool("LOG_JSON", &json)?;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        // Only override if env values differ from defaults
        if env_config.merge.conflict_policy != MergeConfig::default().conflict_policy {
            self.merge.conflict_policy = env_config.merge.conflict_policy;
        }
        if env_config.report.custom_labels != ReportConfig::default().custom_labels {
            self.report.custom_labels = env_config.report.custom_labels;
        }
        if env_config.logging.level != LoggingConfig::default().level {
            self.logging.level = env_config.logging.level;
        }
        if env_config.logging.json_format {
            self.logging.json_format = true;
        }

        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// What to do with a rule-based span that conflicts with an accepted span
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Discard the candidate, logging at debug level only
    #[default]
    Drop,
    /// Discard the candidate and emit a warning naming both spans
    DropAndWarn,
}

impl std::str::FromStr for ConflictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "drop" => Ok(Self::Drop),
            "drop_and_warn" | "warn" => Ok(Self::DropAndWarn),
            _ => Err(ConfigError::InvalidValue {
                key: "SPANFUSE_CONFLICT_POLICY".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Span merge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Handling of candidates that lose a conflict
    pub conflict_policy: ConflictPolicy,
}

/// Code-format validation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Extra label -> regex patterns, registered on top of the built-in ones
    pub patterns: BTreeMap<String, String>,
}

/// Report rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Labels shown in the custom section of the entity report
    pub custom_labels: Vec<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            custom_labels: vec!["PRODUCT".to_string(), "EVENT".to_string()],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
