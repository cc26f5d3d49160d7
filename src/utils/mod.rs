//! Utility functions and helpers used throughout the application
//!
//! This module provides common utility functions for time handling,
//! validation, telemetry setup, and command line parsing.

pub mod time;
pub mod validation;

// Re-export commonly used utilities
pub use time::{Clock, ManualClock, SystemClock};

/// Telemetry and observability utilities
pub mod telemetry {
    use anyhow::{Context, Result};
    use tracing_appender::non_blocking::WorkerGuard;
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

    /// Initialize global tracing with the specified log level and format
    pub fn init(log_level: &str, log_format: &str) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let registry = Registry::default().with(env_filter);

        match log_format {
            "json" => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            "compact" => registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
            _ => registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_writer(std::io::stderr),
                )
                .try_init(),
        }
        .context("Failed to install tracing subscriber")?;

        Ok(())
    }

    /// Initialize logging to stderr plus a daily rotated file.
    ///
    /// The returned guard must be kept alive for buffered lines to be flushed.
    pub fn init_with_file_rotation(
        log_level: &str,
        log_format: &str,
        log_directory: &str,
        file_name_prefix: &str,
    ) -> Result<WorkerGuard> {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let file_appender = RollingFileAppender::new(Rotation::DAILY, log_directory, file_name_prefix);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let registry = Registry::default().with(env_filter);

        match log_format {
            "json" => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(non_blocking)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init(),
            _ => registry
                .with(
                    fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init(),
        }
        .context("Failed to install tracing subscriber")?;

        Ok(guard)
    }
}

/// Command line argument parsing
pub mod cli {
    use clap::{Parser, Subcommand, ValueEnum};
    use std::path::PathBuf;

    /// Command line arguments for the replay binary
    #[derive(Parser, Debug, Clone)]
    #[command(
        name = "wallet-tracker",
        about = "Replay wallet connection sessions and report connection analytics",
        version = env!("CARGO_PKG_VERSION")
    )]
    pub struct CliArgs {
        /// Path to configuration file
        #[arg(short, long, env = "CONFIG_PATH", global = true)]
        pub config_path: Option<String>,

        /// Logging level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info", env = "LOG_LEVEL", global = true)]
        pub log_level: String,

        /// Log format (json, pretty, compact)
        #[arg(long, default_value = "compact", env = "LOG_FORMAT", global = true)]
        pub log_format: String,

        /// Directory for rotated log files (stderr only when absent)
        #[arg(long, env = "LOG_DIR", global = true)]
        pub log_dir: Option<String>,

        /// Environment (development, staging, production)
        #[arg(short, long, env = "ENVIRONMENT", global = true)]
        pub environment: Option<String>,

        /// Reject tracker calls whose preconditions do not hold instead of ignoring them
        #[arg(long, env = "TRACKER_STRICT", global = true)]
        pub strict: bool,

        /// Command to run
        #[command(subcommand)]
        pub command: Command,
    }

    /// Available subcommands
    #[derive(Subcommand, Debug, Clone)]
    pub enum Command {
        /// Replay a scenario script and print the connection report
        Replay {
            /// YAML or JSON scenario file
            script: PathBuf,

            /// Report output format
            #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
            output: OutputFormat,
        },
        /// Print the effective configuration as TOML
        ShowConfig,
    }

    /// Report rendering
    #[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
    pub enum OutputFormat {
        /// Human readable summary
        Text,
        /// Full report as pretty JSON
        Json,
    }
}

// Re-export CLI utilities
pub use cli::CliArgs;

#[cfg(test)]
mod tests {
    use super::cli::{Command, OutputFormat};
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::try_parse_from([
            "wallet-tracker",
            "--log-level",
            "debug",
            "--strict",
            "replay",
            "session.yaml",
            "--output",
            "json",
        ])
        .unwrap();

        assert_eq!(args.log_level, "debug");
        assert!(args.strict);
        match args.command {
            Command::Replay { script, output } => {
                assert_eq!(script.to_str(), Some("session.yaml"));
                assert_eq!(output, OutputFormat::Json);
            }
            Command::ShowConfig => panic!("expected replay"),
        }
    }

    #[test]
    fn test_show_config_subcommand() {
        let args = CliArgs::try_parse_from(["wallet-tracker", "show-config"]).unwrap();
        assert!(matches!(args.command, Command::ShowConfig));
        assert_eq!(args.log_format, "compact");
    }
}
