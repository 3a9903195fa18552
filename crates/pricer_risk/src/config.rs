//! Risk engine configuration.
//!
//! Handles loading of engine settings from TOML files with environment
//! variable override support.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Default marker for absent parent levels in flattened results.
pub const DEFAULT_MISSING_MARKER: &str = "N/A";

/// Risk engine configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RiskConfig {
    /// Worker threads for the pricing pool
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Default wait for results in milliseconds (0 waits indefinitely)
    #[serde(default = "default_result_timeout_ms")]
    pub result_timeout_ms: u64,

    /// Fill value for absent portfolio levels when flattening results
    #[serde(default = "default_missing_marker")]
    pub missing_marker: String,

    /// Whether aggregation tolerates differing pricing keys
    #[serde(default)]
    pub allow_mismatch_risk_keys: bool,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_worker_threads() -> usize {
    4
}

fn default_result_timeout_ms() -> u64 {
    60_000
}

fn default_missing_marker() -> String {
    DEFAULT_MISSING_MARKER.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            result_timeout_ms: default_result_timeout_ms(),
            missing_marker: default_missing_marker(),
            allow_mismatch_risk_keys: false,
            log_level: default_log_level(),
        }
    }
}

impl RiskConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from default path or return default config
    pub fn load_or_default() -> Self {
        let config_path = PathBuf::from("config/risk.toml");
        Self::load(&config_path).unwrap_or_default()
    }

    /// Apply environment variable overrides
    pub fn with_env_override(mut self) -> Self {
        if let Ok(threads) = std::env::var("RISK_WORKER_THREADS") {
            self.worker_threads = threads.parse().unwrap_or(self.worker_threads);
        }

        if let Ok(timeout) = std::env::var("RISK_RESULT_TIMEOUT_MS") {
            self.result_timeout_ms = timeout.parse().unwrap_or(self.result_timeout_ms);
        }

        if let Ok(marker) = std::env::var("RISK_MISSING_MARKER") {
            self.missing_marker = marker;
        }

        if let Ok(allow) = std::env::var("RISK_ALLOW_MISMATCH") {
            self.allow_mismatch_risk_keys = match allow.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => self.allow_mismatch_risk_keys,
            };
        }

        if let Ok(log_level) = std::env::var("RISK_LOG_LEVEL") {
            self.log_level = log_level;
        }

        self
    }

    /// Default wait for results, `None` meaning indefinitely
    pub fn result_timeout(&self) -> Option<Duration> {
        match self.result_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            errors.push(format!(
                "Invalid log_level '{}'. Valid values: {:?}",
                self.log_level, valid_log_levels
            ));
        }

        if self.worker_threads == 0 {
            errors.push("worker_threads must be greater than 0".to_string());
        }
        if self.worker_threads > 1024 {
            errors.push(format!(
                "worker_threads {} exceeds maximum allowed (1024)",
                self.worker_threads
            ));
        }

        if self.missing_marker.is_empty() {
            errors.push("missing_marker cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load configuration from file and validate
    pub fn load_and_validate(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file with environment overrides and validate
    pub fn load_with_env_and_validate(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?.with_env_override();
        config.validate()?;
        Ok(config)
    }
}

/// Configuration error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(String),
    /// Parse error in config file
    #[error("Parse error: {0}")]
    Parse(String),
    /// Validation error
    #[error("Validation errors: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// The worker pool could not be started
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RiskConfig::default();
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.missing_marker, "N/A");
        assert_eq!(config.result_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_default_config_validates() {
        assert!(RiskConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = RiskConfig::from_toml(
            r#"
            worker_threads = 8
            result_timeout_ms = 0
            allow_mismatch_risk_keys = true
            "#,
        )
        .unwrap();
        assert_eq!(config.worker_threads, 8);
        assert_eq!(config.result_timeout(), None);
        assert!(config.allow_mismatch_risk_keys);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_from_toml_parse_error() {
        let result = RiskConfig::from_toml("worker_threads = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = RiskConfig::load(Path::new("does/not/exist.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("RISK_MISSING_MARKER", "-");
        std::env::set_var("RISK_ALLOW_MISMATCH", "true");
        let config = RiskConfig::default().with_env_override();
        assert_eq!(config.missing_marker, "-");
        assert!(config.allow_mismatch_risk_keys);
        std::env::remove_var("RISK_MISSING_MARKER");
        std::env::remove_var("RISK_ALLOW_MISMATCH");
    }

    #[test]
    fn test_validate_multiple_errors() {
        let config = RiskConfig {
            worker_threads: 0,
            log_level: "loud".to_string(),
            missing_marker: String::new(),
            ..RiskConfig::default()
        };

        if let Err(ConfigError::Validation(errors)) = config.validate() {
            assert_eq!(errors.len(), 3);
            assert!(errors.iter().any(|e| e.contains("log_level")));
            assert!(errors.iter().any(|e| e.contains("worker_threads")));
        } else {
            panic!("Expected validation error");
        }
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError::Validation(vec!["Error 1".to_string(), "Error 2".to_string()]);
        let display = format!("{}", error);
        assert!(display.contains("Error 1"));
        assert!(display.contains("Error 2"));
    }
}
