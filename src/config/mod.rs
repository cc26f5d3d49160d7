//! Configuration management module
//!
//! This module provides configuration management for the wallet connection
//! tracker, including loading from multiple sources, overlays and validation.

pub mod loader;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use loader::{load_config, load_config_from_path, load_config_with_args, ConfigLoader};
pub use models::{AnalyticsConfig, AppConfig, ConfigOverlay, EnvironmentConfig, TrackerConfig};
pub use validation::{ConfigValidator, ValidationResult};

// Re-export CLI args from utils for convenience
pub use crate::utils::CliArgs;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_config_integration() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::new()
            .with_config_path(dir.path().join("absent.toml"))
            .without_env()
            .load()
            .await
            .unwrap();

        assert!(config.is_valid());
        assert_eq!(config.tracker_options().history_capacity, 100);
    }
}
