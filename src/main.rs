//! Wallet Tracker - Connection analytics replay tool
//!
//! Command line entry point of the wallet connection tracker. It loads the
//! layered configuration, installs telemetry, wires the configured analytics
//! sinks and replays scripted wallet sessions through the tracker.
//!
//! # Commands
//!
//! - `replay <SCRIPT>`: replay a YAML or JSON scenario and print the report
//! - `show-config`: print the effective configuration as TOML

use clap::Parser;
use color_eyre::eyre::{eyre, Result, WrapErr};
use std::process;
use tracing::{error, info, instrument, span, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use wallet_connection_tracker::{
    application::Application,
    config::{AppConfig, CliArgs, ConfigLoader},
    utils::{
        cli::{Command, OutputFormat},
        telemetry,
    },
};

/// Prefix of rotated log files
const LOG_FILE_PREFIX: &str = "wallet-tracker.log";

/// Application entry point with error reporting
#[tokio::main]
async fn main() {
    // Setup color-eyre for enhanced error reporting
    if let Err(e) = color_eyre::install() {
        eprintln!("Failed to install color-eyre: {e}");
        process::exit(1);
    }

    // Missing .env files are fine
    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        error!("Fatal application error: {:?}", e);
        eprintln!("\n❌ wallet-tracker failed:");
        eprintln!("{e:?}");
        process::exit(1);
    }
}

/// Main application execution logic
async fn run() -> Result<()> {
    let cli_args = CliArgs::parse();

    // Initialize telemetry and observability
    let _guard = init_telemetry(&cli_args)?;
    let _span = span!(Level::INFO, "wallet_tracker").entered();

    display_startup_banner();

    let config = load_and_validate_config(&cli_args)
        .await
        .wrap_err("Configuration loading failed")?;

    match cli_args.command {
        Command::ShowConfig => {
            let rendered = config.to_toml().wrap_err("Failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
        Command::Replay { script, output } => run_replay(config, &script, output).await,
    }
}

/// Install the tracing subscriber, with a rotated log file when requested
fn init_telemetry(cli_args: &CliArgs) -> Result<Option<WorkerGuard>> {
    match &cli_args.log_dir {
        Some(dir) => telemetry::init_with_file_rotation(&cli_args.log_level, &cli_args.log_format, dir, LOG_FILE_PREFIX)
            .map(Some)
            .map_err(|e| eyre!("Failed to initialize telemetry system: {e:#}")),
        None => telemetry::init(&cli_args.log_level, &cli_args.log_format)
            .map(|()| None)
            .map_err(|e| eyre!("Failed to initialize telemetry system: {e:#}")),
    }
}

/// Display startup banner
fn display_startup_banner() {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) { "Debug" } else { "Release" };

    info!("╔════════════════════════════════════════════════════════════════════╗");
    info!("║                    WALLET CONNECTION TRACKER                       ║");
    info!("║                         v{:<8} ({:<7})                         ║", version, build);
    info!("║                                                                    ║");
    info!("║  🔌 Connection state machine & timeout watchdog                    ║");
    info!("║  📊 Success rate, connect time & bounded history                   ║");
    info!("║  🪪 Session correlation with the identity backend                  ║");
    info!("║  🎬 Scenario replay for reproducible sessions                      ║");
    info!("╚════════════════════════════════════════════════════════════════════╝");
}

/// Load and validate application configuration
#[instrument(skip(cli_args))]
async fn load_and_validate_config(cli_args: &CliArgs) -> Result<AppConfig> {
    info!("🔧 Loading application configuration...");

    let config = ConfigLoader::new()
        .with_cli_args(cli_args.clone())
        .load()
        .await
        .wrap_err("Failed to load configuration")?;

    info!("✅ Configuration loaded successfully");
    log_configuration_summary(&config);

    let result = config.validate().wrap_err("Configuration validation failed")?;
    if !result.is_valid {
        return Err(eyre!("Invalid configuration: {}", result.errors.join("; ")));
    }
    for warning in &result.warnings {
        warn!("⚠️  {}", warning);
    }

    if config.is_development() {
        warn!("⚠️  Running in DEVELOPMENT mode");
    } else if config.is_production() {
        info!("🔒 Running in PRODUCTION mode");
    }

    Ok(config)
}

/// Log configuration summary for transparency
fn log_configuration_summary(config: &AppConfig) {
    info!("📊 Configuration Summary:");
    info!("   Environment: {}", config.environment());
    info!("   History Capacity: {}", config.tracker.history_capacity);
    info!("   Strict Preconditions: {}", config.tracker.strict_preconditions);
    match config.tracker.connect_timeout_ms {
        Some(ms) => info!("   Connect Timeout: {}ms", ms),
        None => info!("   Connect Timeout: none"),
    }
    info!(
        "   Sinks: logging={} metrics={} channel={}",
        config.analytics.enable_logging_sink, config.analytics.enable_metrics_sink, config.analytics.enable_channel_sink
    );
}

/// Replay a script, print the report and shut the sinks down
#[instrument(skip(config))]
async fn run_replay(config: AppConfig, script: &std::path::Path, output: OutputFormat) -> Result<()> {
    let app = Application::build(config)
        .await
        .wrap_err("Application initialization failed")?;

    let replayed = tokio::select! {
        result = app.replay(script) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let Some(result) = replayed else {
        warn!("🛑 Received Ctrl+C, abandoning replay");
        app.shutdown().await.wrap_err("Shutdown failed")?;
        return Ok(());
    };
    let report = result.wrap_err_with(|| format!("Replay of {} failed", script.display()))?;

    println!("{}", report.render(output).wrap_err("Failed to render report")?);

    if let Some(summary) = app.shutdown().await.wrap_err("Shutdown failed")? {
        info!(
            "📬 Dispatcher delivered {} events ({} failed)",
            summary.delivered, summary.failed
        );
    }
    info!("👋 Replay complete");
    Ok(())
}
