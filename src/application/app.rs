//! Main application structure and lifecycle management
//!
//! This module contains the Application struct that turns a validated
//! configuration into a running tracker: it wires the analytics sinks,
//! installs the Prometheus exporter, owns the channel dispatcher and drives
//! the replay command.

use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::replay::{ReplayReport, ReplayRunner, ReplayScript};
use super::shared::SharedTracker;
use crate::config::AppConfig;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::infrastructure::analytics::{
    ChannelAnalytics, DispatchSummary, EventTransport, JsonLinesTransport, MetricsAnalytics, TracingAnalytics,
    TracingTransport,
};
use crate::services::tracker::{AnalyticsEmitter, WalletConnectionTracker};

/// Main application state and coordinator
#[derive(Debug)]
pub struct Application {
    /// Application configuration
    config: Arc<AppConfig>,

    /// Facade shared by the live tracker and replays
    emitter: AnalyticsEmitter,

    /// Live tracker
    tracker: SharedTracker,

    /// Background dispatcher of the channel sink
    dispatcher: Option<JoinHandle<DispatchSummary>>,
}

impl Application {
    /// Build a new application instance with the given configuration
    #[instrument(skip(config))]
    pub async fn build(config: AppConfig) -> AppResult<Self> {
        info!("🏗️  Building application instance");

        // Validate configuration before proceeding
        let validation_result = config.validate()?;
        if !validation_result.is_valid {
            return Err(AppError::config(format!(
                "Configuration validation failed: {:?}",
                validation_result.errors
            )));
        }

        for warning in &validation_result.warnings {
            warn!("⚠️  Configuration warning: {}", warning);
        }

        let config = Arc::new(config);
        let (emitter, dispatcher) = Self::build_emitter(&config).await?;

        let tracker = WalletConnectionTracker::with_options(
            config.tracker_options(),
            emitter.clone(),
            Arc::new(crate::utils::time::SystemClock),
        );

        let (wallet_sinks, session_sinks) = emitter.sink_count();
        info!(
            "✅ Application instance built with {} wallet and {} session analytics sinks",
            wallet_sinks, session_sinks
        );

        Ok(Self {
            config,
            emitter,
            tracker: SharedTracker::new(tracker),
            dispatcher,
        })
    }

    /// Assemble the analytics facade from the `analytics` section
    async fn build_emitter(config: &AppConfig) -> AppResult<(AnalyticsEmitter, Option<JoinHandle<DispatchSummary>>)> {
        let analytics = &config.analytics;
        let mut emitter = AnalyticsEmitter::new();
        let mut dispatcher = None;

        if analytics.enable_logging_sink {
            debug!("📝 Enabling logging analytics sink");
            emitter = emitter.with_sink(Arc::new(TracingAnalytics::new()));
        }

        if analytics.enable_metrics_sink {
            info!("📊 Enabling metrics analytics sink");
            #[cfg(feature = "prometheus")]
            crate::infrastructure::analytics::metrics::install_prometheus_exporter(analytics.metrics_port)?;
            emitter = emitter.with_sink(Arc::new(MetricsAnalytics::new()));
        }

        if analytics.enable_channel_sink {
            let transport: Arc<dyn EventTransport> = match &analytics.events_file {
                Some(path) => Arc::new(JsonLinesTransport::create(path).await?),
                None => Arc::new(TracingTransport),
            };
            info!(
                "📬 Enabling channel analytics sink (capacity {}, transport {})",
                analytics.channel_capacity,
                transport.name()
            );
            let (sink, handle) = ChannelAnalytics::spawn(analytics.channel_capacity, transport);
            emitter = emitter.with_sink(Arc::new(sink));
            dispatcher = Some(handle);
        }

        Ok((emitter, dispatcher))
    }

    /// Replay a script file through a fresh tracker that reports to the configured sinks
    #[instrument(skip(self, path))]
    pub async fn replay(&self, path: impl AsRef<Path>) -> AppResult<ReplayReport> {
        let script = ReplayScript::load(path).await?;
        self.replay_script(&script)
    }

    /// Replay an already parsed script
    pub fn replay_script(&self, script: &ReplayScript) -> AppResult<ReplayReport> {
        ReplayRunner::new(self.config.tracker_options())
            .with_emitter(self.emitter.clone())
            .run(script)
    }

    /// Live tracker handle
    pub fn tracker(&self) -> &SharedTracker {
        &self.tracker
    }

    /// Get application configuration
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    /// Initiate graceful shutdown.
    ///
    /// Drops every sink so the channel closes, then waits for the dispatcher
    /// to drain.
    #[instrument(skip(self))]
    pub async fn shutdown(self) -> AppResult<Option<DispatchSummary>> {
        info!("🛑 Initiating graceful shutdown");

        let Self {
            tracker,
            emitter,
            dispatcher,
            ..
        } = self;
        let emitted = emitter.stats();
        drop(tracker);
        drop(emitter);

        let summary = match dispatcher {
            Some(handle) => Some(
                handle
                    .await
                    .map_err(|e| AppError::internal(format!("Analytics dispatcher panicked: {e}")))?,
            ),
            None => None,
        };

        info!(
            "✅ Graceful shutdown completed ({} events delivered, {} failed)",
            emitted.delivered, emitted.failed
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigLoader;
    use crate::core::types::{ConnectionStatus, WalletType};

    #[tokio::test]
    async fn test_application_build() {
        let config = ConfigLoader::new().without_env().create_default_config();

        let app = Application::build(config).await.unwrap();
        assert_eq!(app.emitter.sink_count(), (1, 1));
        assert!(app.dispatcher.is_none());
        assert_eq!(app.get_config().environment.name, "development");
    }

    #[tokio::test]
    async fn test_invalid_configuration_is_rejected() {
        let mut config = AppConfig::default();
        config.tracker.history_capacity = 0;

        let err = Application::build(config).await.unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[tokio::test]
    async fn test_channel_sink_writes_events_file() {
        let dir = tempfile::tempdir().unwrap();
        let events_file = dir.path().join("events.jsonl");

        let mut config = AppConfig::default();
        config.analytics.enable_logging_sink = false;
        config.analytics.enable_channel_sink = true;
        config.analytics.events_file = Some(events_file.clone());

        let app = Application::build(config).await.unwrap();
        let ticket = app.tracker().initiate_connection(WalletType::Metamask, None).await;
        app.tracker()
            .handle_connection_failure("User rejected", Some("4001".into()), ticket.started_at, None)
            .await
            .unwrap();
        assert_eq!(app.tracker().state().await.status, ConnectionStatus::Error);

        let summary = app.shutdown().await.unwrap().unwrap();
        assert_eq!(summary.delivered, 2);

        let content = tokio::fs::read_to_string(&events_file).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"event\":\"connection_failed\""));
    }

    #[tokio::test]
    async fn test_replay_through_application() {
        let app = Application::build(AppConfig::default()).await.unwrap();
        let script = ReplayScript::from_yaml_str(
            "name: app\nsteps:\n  - initiate: { wallet_type: coinbase }\n  - failure: { message: boom }\n",
        )
        .unwrap();

        let report = app.replay_script(&script).unwrap();
        assert_eq!(report.stats.failed_connections, 1);
        assert_eq!(app.tracker().stats().await.total_attempts, 0);
        assert!(app.shutdown().await.unwrap().is_none());
    }
}
