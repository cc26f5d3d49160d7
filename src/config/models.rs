//! Configuration data structures and models
//!
//! This module defines the configuration structure of the tracker and the
//! replay binary, its defaults, and the dotted-key overlay files that can be
//! layered on top of the base TOML.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::core::domain::analytics::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_METRICS_PORT};
use crate::core::domain::tracking::DEFAULT_HISTORY_CAPACITY;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::services::tracker::TrackerOptions;

/// Main application configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Environment configuration
    #[serde(default)]
    pub environment: EnvironmentConfig,

    /// Tracker behaviour
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Analytics sinks
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

/// Environment configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Environment name (development, staging, production)
    #[serde(default = "default_environment_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (json, pretty, compact)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Tracker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Number of attempts kept in the history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Reject calls whose precondition does not hold
    #[serde(default)]
    pub strict_preconditions: bool,

    /// Expire unresolved attempts after this many milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
}

/// Analytics sink configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    /// Log every event through `tracing`
    #[serde(default = "default_true")]
    pub enable_logging_sink: bool,

    /// Record counters and histograms through `metrics`
    #[serde(default)]
    pub enable_metrics_sink: bool,

    /// Queue events for a background dispatcher
    #[serde(default)]
    pub enable_channel_sink: bool,

    /// Bounded queue size of the channel sink
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Prometheus exporter port, used when the metrics sink is enabled
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// JSON lines file the dispatcher appends to; events are only logged when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_file: Option<PathBuf>,
}

/// Overlay file of dotted-key overrides, e.g. `tracker.history_capacity: 50`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfigOverlay {
    /// Overlay name, for logs
    #[serde(default)]
    pub name: String,

    /// Overrides keyed by `section.field`
    #[serde(default)]
    pub overrides: BTreeMap<String, serde_yaml::Value>,
}

fn default_environment_name() -> String { "development".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "pretty".to_string() }
fn default_history_capacity() -> usize { DEFAULT_HISTORY_CAPACITY }
fn default_channel_capacity() -> usize { DEFAULT_CHANNEL_CAPACITY }
fn default_metrics_port() -> u16 { DEFAULT_METRICS_PORT }
fn default_true() -> bool { true }

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: default_environment_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            strict_preconditions: false,
            connect_timeout_ms: None,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enable_logging_sink: true,
            enable_metrics_sink: false,
            enable_channel_sink: false,
            channel_capacity: default_channel_capacity(),
            metrics_port: default_metrics_port(),
            events_file: None,
        }
    }
}

impl AppConfig {
    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.name == "development"
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment.name == "production"
    }

    /// Get the current environment name
    pub fn environment(&self) -> &str {
        &self.environment.name
    }

    /// Tracker options derived from the `tracker` section
    pub fn tracker_options(&self) -> TrackerOptions {
        TrackerOptions {
            history_capacity: self.tracker.history_capacity,
            strict_preconditions: self.tracker.strict_preconditions,
            default_timeout_ms: self.tracker.connect_timeout_ms,
        }
    }

    /// Render as TOML
    pub fn to_toml(&self) -> AppResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply every override of an overlay
    pub fn apply_overlay(&mut self, overlay: &ConfigOverlay) -> AppResult<()> {
        for (key, value) in &overlay.overrides {
            self.apply_override(key, value)?;
        }
        Ok(())
    }

    /// Apply a single configuration override
    fn apply_override(&mut self, key: &str, value: &serde_yaml::Value) -> AppResult<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["environment", field] => self.apply_environment_override(field, value),
            ["tracker", field] => self.apply_tracker_override(field, value),
            ["analytics", field] => self.apply_analytics_override(field, value),
            _ => {
                tracing::warn!("Unknown configuration override key: {}", key);
                Ok(())
            }
        }
    }

    fn apply_environment_override(&mut self, field: &str, value: &serde_yaml::Value) -> AppResult<()> {
        let text = expect_str(field, value)?;
        match field {
            "name" => self.environment.name = text,
            "log_level" => self.environment.log_level = text,
            "log_format" => self.environment.log_format = text,
            _ => tracing::warn!("Unknown environment override: {}", field),
        }
        Ok(())
    }

    fn apply_tracker_override(&mut self, field: &str, value: &serde_yaml::Value) -> AppResult<()> {
        match field {
            "history_capacity" => self.tracker.history_capacity = usize::try_from(expect_u64(field, value)?)
                .map_err(|_| AppError::config(format!("Override {field} is out of range")))?,
            "strict_preconditions" => self.tracker.strict_preconditions = expect_bool(field, value)?,
            "connect_timeout_ms" => {
                self.tracker.connect_timeout_ms = if value.is_null() {
                    None
                } else {
                    Some(expect_u64(field, value)?)
                };
            }
            _ => tracing::warn!("Unknown tracker override: {}", field),
        }
        Ok(())
    }

    fn apply_analytics_override(&mut self, field: &str, value: &serde_yaml::Value) -> AppResult<()> {
        match field {
            "enable_logging_sink" => self.analytics.enable_logging_sink = expect_bool(field, value)?,
            "enable_metrics_sink" => self.analytics.enable_metrics_sink = expect_bool(field, value)?,
            "enable_channel_sink" => self.analytics.enable_channel_sink = expect_bool(field, value)?,
            "channel_capacity" => self.analytics.channel_capacity = usize::try_from(expect_u64(field, value)?)
                .map_err(|_| AppError::config(format!("Override {field} is out of range")))?,
            "metrics_port" => self.analytics.metrics_port = u16::try_from(expect_u64(field, value)?)
                .map_err(|_| AppError::config(format!("Override {field} is not a valid port")))?,
            "events_file" => self.analytics.events_file = Some(PathBuf::from(expect_str(field, value)?)),
            _ => tracing::warn!("Unknown analytics override: {}", field),
        }
        Ok(())
    }
}

fn expect_bool(field: &str, value: &serde_yaml::Value) -> AppResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| AppError::config(format!("Override {field} must be a boolean")))
}

fn expect_u64(field: &str, value: &serde_yaml::Value) -> AppResult<u64> {
    value
        .as_u64()
        .ok_or_else(|| AppError::config(format!("Override {field} must be a non-negative integer")))
}

fn expect_str(field: &str, value: &serde_yaml::Value) -> AppResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::config(format!("Override {field} must be a string")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.is_development());
        assert!(!config.is_production());
        assert_eq!(config.tracker.history_capacity, 100);
        assert!(config.analytics.enable_logging_sink);
        assert!(!config.analytics.enable_channel_sink);
        assert_eq!(config.tracker_options(), TrackerOptions::default());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[tracker]
strict_preconditions = true
connect_timeout_ms = 30000

[analytics]
enable_metrics_sink = true
"#,
        )
        .unwrap();

        assert_eq!(config.environment, EnvironmentConfig::default());
        assert!(config.tracker.strict_preconditions);
        assert_eq!(config.tracker.history_capacity, 100);
        assert_eq!(config.tracker_options().default_timeout_ms, Some(30_000));
        assert!(config.analytics.enable_metrics_sink);
        assert!(config.analytics.enable_logging_sink);
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[tracker]"));
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_overlay_application() {
        let overlay: ConfigOverlay = serde_yaml::from_str(
            r#"
name: staging
overrides:
  environment.name: staging
  tracker.history_capacity: 25
  tracker.connect_timeout_ms: 5000
  analytics.enable_channel_sink: true
  unknown.key: 1
"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.apply_overlay(&overlay).unwrap();

        assert_eq!(config.environment(), "staging");
        assert_eq!(config.tracker.history_capacity, 25);
        assert_eq!(config.tracker.connect_timeout_ms, Some(5_000));
        assert!(config.analytics.enable_channel_sink);
    }

    #[test]
    fn test_overlay_type_mismatch() {
        let mut overrides = BTreeMap::new();
        overrides.insert("tracker.strict_preconditions".to_string(), serde_yaml::Value::from("yes"));
        let overlay = ConfigOverlay {
            name: "bad".into(),
            overrides,
        };

        let mut config = AppConfig::default();
        assert!(config.apply_overlay(&overlay).is_err());
    }
}
