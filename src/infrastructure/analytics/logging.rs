//! Analytics sink that writes every event as a structured log line

use tracing::{debug, info};

use crate::core::result::{AppResult, ResultExt};
use crate::services::tracker::{AnalyticsEvent, AnalyticsSink, SessionAnalytics, WalletAnalytics};

/// Log target used for analytics lines, so they can be filtered separately
pub const ANALYTICS_LOG_TARGET: &str = "wallet_analytics";

/// Sink backed by `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAnalytics {
    debug_level: bool,
}

impl TracingAnalytics {
    /// Sink logging at `info` level
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink logging at `debug` level, for chatty environments
    pub fn quiet() -> Self {
        Self { debug_level: true }
    }
}

impl AnalyticsSink for TracingAnalytics {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn record(&self, event: &AnalyticsEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event)
            .map_analytics_err("tracing", || format!("failed to encode {}", event.name()))?;
        let meta = event.meta();

        if self.debug_level {
            debug!(
                target: ANALYTICS_LOG_TARGET,
                event = event.name(),
                session_id = meta.session_id.as_deref(),
                %payload,
                "analytics event"
            );
        } else {
            info!(
                target: ANALYTICS_LOG_TARGET,
                event = event.name(),
                session_id = meta.session_id.as_deref(),
                %payload,
                "analytics event"
            );
        }
        Ok(())
    }
}

impl WalletAnalytics for TracingAnalytics {}
impl SessionAnalytics for TracingAnalytics {}
