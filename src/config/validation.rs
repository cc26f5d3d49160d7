//! Configuration validation logic
//!
//! This module validates configuration values before the tracker is built so
//! that bad settings are reported together instead of failing one at a time.

use tracing::{debug, warn};

use super::models::{AnalyticsConfig, AppConfig, EnvironmentConfig, TrackerConfig};
use crate::core::domain::tracking::{DEFAULT_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY};
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::validation::validate_history_capacity;
use crate::utils::validation;

/// Timeouts below this are accepted but almost certainly a unit mistake
const SHORT_TIMEOUT_WARNING_MS: u64 = 1_000;

/// Configuration validator
#[derive(Debug, Clone)]
pub struct ConfigValidator {
    /// Strict validation mode (fails on warnings)
    strict_mode: bool,

    /// Collect all validation errors instead of failing fast
    collect_all_errors: bool,
}

/// Validation result with warnings and errors
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Fatal validation errors
    pub errors: Vec<String>,

    /// Non-fatal warnings
    pub warnings: Vec<String>,

    /// Validation passed
    pub is_valid: bool,
}

impl ConfigValidator {
    /// Create a new validator with default settings
    pub fn new() -> Self {
        Self {
            strict_mode: false,
            collect_all_errors: true,
        }
    }

    /// Enable strict validation mode
    #[must_use]
    pub fn with_strict_mode(mut self) -> Self {
        self.strict_mode = true;
        self
    }

    /// Enable fail-fast mode (stop on first error)
    #[must_use]
    pub fn with_fail_fast(mut self) -> Self {
        self.collect_all_errors = false;
        self
    }

    /// Validate the complete application configuration
    pub fn validate(&self, config: &AppConfig) -> AppResult<ValidationResult> {
        debug!("🔍 Starting configuration validation");

        let mut result = ValidationResult {
            errors: Vec::new(),
            warnings: Vec::new(),
            is_valid: true,
        };

        self.validate_environment(&config.environment, &mut result)?;
        self.validate_tracker(&config.tracker, &mut result)?;
        self.validate_analytics(&config.analytics, &mut result)?;
        self.validate_cross_config(config, &mut result);

        result.is_valid = result.errors.is_empty() && (!self.strict_mode || result.warnings.is_empty());

        if result.is_valid {
            debug!("✅ Configuration validation passed");
        } else {
            warn!("❌ Configuration validation failed");
            for error in &result.errors {
                warn!("   Error: {}", error);
            }
            for warning in &result.warnings {
                warn!("   Warning: {}", warning);
            }
        }

        Ok(result)
    }

    /// Validate environment configuration
    fn validate_environment(&self, config: &EnvironmentConfig, result: &mut ValidationResult) -> AppResult<()> {
        if let Err(e) = validation::config::validate_environment(&config.name) {
            self.add_error(result, format!("Environment name: {e}"))?;
        }

        if let Err(e) = validation::config::validate_log_level(&config.log_level) {
            self.add_error(result, format!("Log level: {e}"))?;
        }

        if let Err(e) = validation::config::validate_log_format(&config.log_format) {
            self.add_error(result, format!("Log format: {e}"))?;
        }

        if config.name == "production" && matches!(config.log_level.to_lowercase().as_str(), "trace" | "debug") {
            self.add_warning(result, "Verbose logging enabled in production environment");
        }

        Ok(())
    }

    /// Validate tracker configuration
    fn validate_tracker(&self, config: &TrackerConfig, result: &mut ValidationResult) -> AppResult<()> {
        if validate_history_capacity(config.history_capacity).is_err() {
            self.add_error(
                result,
                format!(
                    "History capacity must be between 1 and {MAX_HISTORY_CAPACITY}, got {}",
                    config.history_capacity
                ),
            )?;
        } else if config.history_capacity < DEFAULT_HISTORY_CAPACITY / 10 {
            self.add_warning(result, "History capacity is very small; success trends will be noisy");
        }

        match config.connect_timeout_ms {
            Some(0) => self.add_error(result, "Connect timeout must be greater than 0".to_string())?,
            Some(ms) if ms < SHORT_TIMEOUT_WARNING_MS => {
                self.add_warning(result, "Connect timeout is under one second; wallets rarely answer that fast");
            }
            _ => {}
        }

        Ok(())
    }

    /// Validate analytics configuration
    fn validate_analytics(&self, config: &AnalyticsConfig, result: &mut ValidationResult) -> AppResult<()> {
        if config.channel_capacity == 0 {
            self.add_error(result, "Channel capacity must be at least 1".to_string())?;
        }

        if config.enable_metrics_sink && config.metrics_port == 0 {
            self.add_error(result, "Metrics port must be non-zero when the metrics sink is enabled".to_string())?;
        }

        if config.events_file.is_some() && !config.enable_channel_sink {
            self.add_warning(result, "Events file is set but the channel sink is disabled");
        }

        if !config.enable_logging_sink && !config.enable_metrics_sink && !config.enable_channel_sink {
            self.add_warning(result, "All analytics sinks are disabled; events will be dropped");
        }

        Ok(())
    }

    /// Cross-section checks
    fn validate_cross_config(&self, config: &AppConfig, result: &mut ValidationResult) {
        if config.is_production() && !config.tracker.strict_preconditions && config.environment.log_level == "trace" {
            self.add_warning(result, "Trace logging in production will log every ignored tracker call");
        }
    }

    /// Add an error to the validation result
    fn add_error(&self, result: &mut ValidationResult, message: String) -> AppResult<()> {
        result.is_valid = false;

        if !self.collect_all_errors {
            result.errors.push(message.clone());
            return Err(AppError::validation(message));
        }

        result.errors.push(message);
        Ok(())
    }

    /// Add a warning to the validation result
    fn add_warning(&self, result: &mut ValidationResult, message: &str) {
        result.warnings.push(message.to_string());

        if self.strict_mode {
            result.is_valid = false;
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    /// Validate this configuration using the default validator
    pub fn validate(&self) -> AppResult<ValidationResult> {
        ConfigValidator::new().validate(self)
    }

    /// Validate this configuration with strict mode
    pub fn validate_strict(&self) -> AppResult<ValidationResult> {
        ConfigValidator::new().with_strict_mode().validate(self)
    }

    /// Quick validation that returns only a boolean result
    pub fn is_valid(&self) -> bool {
        self.validate().map(|r| r.is_valid).unwrap_or(false)
    }

    /// Validate and return errors if any
    pub fn validation_errors(&self) -> Vec<String> {
        self.validate()
            .map(|r| r.errors)
            .unwrap_or_else(|e| vec![e.to_string()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration_is_valid() {
        let result = AppConfig::default().validate().unwrap();
        assert!(result.is_valid, "errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_invalid_values_are_collected() {
        let mut config = AppConfig::default();
        config.environment.log_level = "verbose".into();
        config.tracker.history_capacity = 0;
        config.tracker.connect_timeout_ms = Some(0);
        config.analytics.channel_capacity = 0;

        let result = config.validate().unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 4);
        assert!(!config.is_valid());
    }

    #[test]
    fn test_fail_fast_returns_first_error() {
        let mut config = AppConfig::default();
        config.environment.log_format = "xml".into();
        config.tracker.history_capacity = 0;

        let err = ConfigValidator::new().with_fail_fast().validate(&config).unwrap_err();
        assert!(err.to_string().contains("Log format"));
    }

    #[test]
    fn test_strict_mode_fails_on_warnings() {
        let mut config = AppConfig::default();
        config.tracker.connect_timeout_ms = Some(200);

        assert!(config.validate().unwrap().is_valid);
        let strict = config.validate_strict().unwrap();
        assert!(!strict.is_valid);
        assert_eq!(strict.warnings.len(), 1);
    }

    #[test]
    fn test_all_sinks_disabled_warns() {
        let mut config = AppConfig::default();
        config.analytics.enable_logging_sink = false;
        let result = config.validate().unwrap();
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("dropped")));
    }
}
