//! Configuration loader with multi-source support
//!
//! This module provides a configuration loader that merges configuration
//! from multiple sources: a TOML file, YAML overlay files, environment
//! variables and command-line arguments, in that order of precedence.

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::de::DeserializeOwned;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::models::{AppConfig, ConfigOverlay};
use crate::core::result::{AppResult, ResultExt};
use crate::utils::CliArgs;

/// Default environment variable prefix
pub const DEFAULT_ENV_PREFIX: &str = "TRACKER";

/// Configuration loader with support for multiple sources
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base configuration path
    config_path: Option<PathBuf>,

    /// CLI arguments
    cli_args: Option<CliArgs>,

    /// Environment prefix for variables
    env_prefix: String,

    /// Enable environment variable loading
    enable_env: bool,

    /// Overlay files applied after the base file
    overlay_files: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            config_path: None,
            cli_args: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            enable_env: true,
            overlay_files: Vec::new(),
        }
    }

    /// Set the base configuration path
    #[must_use]
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set CLI arguments
    #[must_use]
    pub fn with_cli_args(mut self, args: CliArgs) -> Self {
        self.cli_args = Some(args);
        self
    }

    /// Set environment variable prefix
    #[must_use]
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Disable environment variable loading
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.enable_env = false;
        self
    }

    /// Add a YAML overlay file of dotted-key overrides
    #[must_use]
    pub fn with_overlay_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.overlay_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load and build the complete application configuration
    pub async fn load(self) -> AppResult<AppConfig> {
        info!("🔧 Starting configuration loading process");

        // Step 1: Load base configuration from TOML
        let mut config = self
            .load_base_config()
            .await
            .context("Failed to load base configuration")?;

        // Step 2: Apply overlay files
        for path in &self.overlay_files {
            self.apply_overlay_file(&mut config, path).await?;
        }

        // Step 3: Apply environment variable overrides
        if self.enable_env {
            self.apply_environment_overrides(&mut config)
                .context("Failed to apply environment overrides")?;
        }

        // Step 4: Apply CLI argument overrides
        if let Some(ref cli_args) = self.cli_args {
            Self::apply_cli_overrides(&mut config, cli_args);
        }

        info!("✅ Configuration loading completed successfully");
        debug!(
            "📊 Final configuration: environment={}, strict={}, history_capacity={}",
            config.environment.name, config.tracker.strict_preconditions, config.tracker.history_capacity
        );

        Ok(config)
    }

    /// Load base configuration from TOML file
    async fn load_base_config(&self) -> Result<AppConfig> {
        let Some(config_path) = self.resolve_config_path() else {
            warn!("⚠️  No configuration file found, using default configuration values");
            return Ok(self.create_default_config());
        };

        info!("📄 Loading base configuration from: {}", config_path.display());

        if !config_path.exists() {
            warn!("⚠️  Configuration file not found: {}", config_path.display());
            warn!("⚠️  Using default configuration values");
            return Ok(self.create_default_config());
        }

        let config_content = tokio::fs::read_to_string(&config_path)
            .await
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;

        debug!("✅ Base configuration loaded successfully");
        Ok(config)
    }

    /// Resolve the configuration file path, if any source names one or a default exists
    fn resolve_config_path(&self) -> Option<PathBuf> {
        if let Some(ref path) = self.config_path {
            return Some(path.clone());
        }

        // Check CLI args for config path
        if let Some(path) = self.cli_args.as_ref().and_then(|args| args.config_path.as_ref()) {
            return Some(PathBuf::from(path));
        }

        // Check environment variable
        if self.enable_env {
            if let Ok(path) = env::var("CONFIG_PATH") {
                return Some(PathBuf::from(path));
            }
        }

        let default_paths = ["configs/tracker.toml", "tracker.toml", "configs/config.toml"];
        let found = default_paths.iter().map(PathBuf::from).find(|pb| pb.exists());
        if let Some(ref pb) = found {
            debug!("📍 Found config file at: {}", pb.display());
        }
        found
    }

    /// Apply a YAML overlay file
    async fn apply_overlay_file(&self, config: &mut AppConfig, path: &Path) -> AppResult<()> {
        if !path.exists() {
            warn!("⚠️  Overlay file not found: {}", path.display());
            return Ok(());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_config_err(|| format!("Failed to read overlay file {}", path.display()))?;

        let overlay: ConfigOverlay = serde_yaml::from_str(&content)
            .map_config_err(|| format!("Failed to parse overlay YAML {}", path.display()))?;

        info!("📋 Applying configuration overlay '{}' from {}", overlay.name, path.display());
        config.apply_overlay(&overlay)
    }

    /// Apply environment variable overrides
    fn apply_environment_overrides(&self, config: &mut AppConfig) -> Result<()> {
        debug!("🌍 Applying environment variable overrides");

        let env_config = Config::builder()
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true),
            )
            .build()
            .context("Failed to build environment configuration")?;

        self.apply_env_var(config, &env_config, "environment.name", |cfg, val: String| {
            cfg.environment.name = val;
        });
        self.apply_env_var(config, &env_config, "environment.log_level", |cfg, val: String| {
            cfg.environment.log_level = val;
        });
        self.apply_env_var(config, &env_config, "environment.log_format", |cfg, val: String| {
            cfg.environment.log_format = val;
        });
        self.apply_env_var(config, &env_config, "tracker.history_capacity", |cfg, val: usize| {
            cfg.tracker.history_capacity = val;
        });
        self.apply_env_var(config, &env_config, "tracker.strict_preconditions", |cfg, val: bool| {
            cfg.tracker.strict_preconditions = val;
        });
        self.apply_env_var(config, &env_config, "tracker.connect_timeout_ms", |cfg, val: u64| {
            cfg.tracker.connect_timeout_ms = Some(val);
        });
        self.apply_env_var(config, &env_config, "analytics.enable_logging_sink", |cfg, val: bool| {
            cfg.analytics.enable_logging_sink = val;
        });
        self.apply_env_var(config, &env_config, "analytics.enable_metrics_sink", |cfg, val: bool| {
            cfg.analytics.enable_metrics_sink = val;
        });
        self.apply_env_var(config, &env_config, "analytics.enable_channel_sink", |cfg, val: bool| {
            cfg.analytics.enable_channel_sink = val;
        });
        self.apply_env_var(config, &env_config, "analytics.channel_capacity", |cfg, val: usize| {
            cfg.analytics.channel_capacity = val;
        });
        self.apply_env_var(config, &env_config, "analytics.metrics_port", |cfg, val: u16| {
            cfg.analytics.metrics_port = val;
        });
        self.apply_env_var(config, &env_config, "analytics.events_file", |cfg, val: String| {
            cfg.analytics.events_file = Some(PathBuf::from(val));
        });

        debug!("✅ Environment variable overrides applied");
        Ok(())
    }

    /// Apply a single environment variable with type conversion
    fn apply_env_var<T, F>(&self, config: &mut AppConfig, env_config: &Config, key: &str, applier: F)
    where
        T: DeserializeOwned,
        F: FnOnce(&mut AppConfig, T),
    {
        if let Ok(value) = env_config.get::<T>(key) {
            applier(config, value);
            debug!("🔄 Applied environment override: {}", key);
        }
    }

    /// Apply CLI argument overrides
    fn apply_cli_overrides(config: &mut AppConfig, cli_args: &CliArgs) {
        debug!("⌨️  Applying CLI argument overrides");

        if let Some(ref env_name) = cli_args.environment {
            config.environment.name = env_name.clone();
        }

        config.environment.log_level = cli_args.log_level.clone();
        config.environment.log_format = cli_args.log_format.clone();

        if cli_args.strict {
            config.tracker.strict_preconditions = true;
        }

        debug!("✅ CLI argument overrides applied");
    }

    /// Create default configuration when no config file is found
    pub fn create_default_config(&self) -> AppConfig {
        debug!("🏗️  Creating default configuration");
        AppConfig::default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience function to load configuration with default settings
pub async fn load_config() -> AppResult<AppConfig> {
    ConfigLoader::new().load().await
}

/// Load configuration with CLI arguments
pub async fn load_config_with_args(cli_args: CliArgs) -> AppResult<AppConfig> {
    ConfigLoader::new().with_cli_args(cli_args).load().await
}

/// Load configuration from a specific path
pub async fn load_config_from_path<P: AsRef<Path>>(path: P) -> AppResult<AppConfig> {
    ConfigLoader::new().with_config_path(path).load().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::cli::Command;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_load_default_config() {
        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::new()
            .with_config_path(dir.path().join("missing.toml"))
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.environment.name, "development");
        assert!(config.is_development());
        assert_eq!(config, AppConfig::default());
    }

    #[tokio::test]
    async fn test_load_from_file_with_overlay() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("tracker.toml");
        let overlay = dir.path().join("staging.yaml");

        tokio::fs::write(
            &base,
            "[environment]\nname = \"staging\"\n\n[tracker]\nhistory_capacity = 50\n",
        )
        .await
        .unwrap();
        tokio::fs::write(
            &overlay,
            "name: tighter\noverrides:\n  tracker.connect_timeout_ms: 15000\n",
        )
        .await
        .unwrap();

        let config = ConfigLoader::new()
            .with_config_path(&base)
            .with_overlay_file(&overlay)
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.environment(), "staging");
        assert_eq!(config.tracker.history_capacity, 50);
        assert_eq!(config.tracker.connect_timeout_ms, Some(15_000));
    }

    #[tokio::test]
    async fn test_invalid_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("broken.toml");
        tokio::fs::write(&base, "[tracker\nhistory_capacity = ").await.unwrap();

        let result = ConfigLoader::new().with_config_path(&base).without_env().load().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cli_overrides() {
        let cli_args = CliArgs {
            config_path: None,
            log_level: "debug".to_string(),
            log_format: "json".to_string(),
            log_dir: None,
            environment: Some("test".to_string()),
            strict: true,
            command: Command::ShowConfig,
        };

        let dir = TempDir::new().unwrap();
        let config = ConfigLoader::new()
            .with_config_path(dir.path().join("none.toml"))
            .with_cli_args(cli_args)
            .without_env()
            .load()
            .await
            .unwrap();

        assert_eq!(config.environment.log_level, "debug");
        assert_eq!(config.environment.log_format, "json");
        assert_eq!(config.environment.name, "test");
        assert!(config.tracker.strict_preconditions);
    }

    #[test]
    fn test_environment_variable_override() {
        let prefix = "TRACKER_LOADER_TEST";
        env::set_var(format!("{prefix}_TRACKER__HISTORY_CAPACITY"), "42");
        env::set_var(format!("{prefix}_ANALYTICS__ENABLE_METRICS_SINK"), "true");

        let loader = ConfigLoader::new().with_env_prefix(prefix);
        let mut config = loader.create_default_config();
        let result = loader.apply_environment_overrides(&mut config);

        env::remove_var(format!("{prefix}_TRACKER__HISTORY_CAPACITY"));
        env::remove_var(format!("{prefix}_ANALYTICS__ENABLE_METRICS_SINK"));

        assert!(result.is_ok());
        assert_eq!(config.tracker.history_capacity, 42);
        assert!(config.analytics.enable_metrics_sink);
    }
}
