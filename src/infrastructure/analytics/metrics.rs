//! Analytics sink that turns events into counters, histograms and gauges
//!
//! Recording goes through the `metrics` facade, so the sink is inert until a
//! recorder is installed. With the `prometheus` feature,
//! [`install_prometheus_exporter`] installs one that serves `/metrics`.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

use crate::core::result::AppResult;
use crate::services::tracker::{AnalyticsEvent, AnalyticsSink, SessionAnalytics, WalletAnalytics};

/// Connection attempts, labelled by wallet
pub const METRIC_ATTEMPTS: &str = "wallet_connection_attempts_total";
/// Successful connections, labelled by wallet
pub const METRIC_SUCCESSES: &str = "wallet_connection_successes_total";
/// Failed connections, labelled by wallet and failure kind
pub const METRIC_FAILURES: &str = "wallet_connection_failures_total";
/// Time to connect
pub const METRIC_DURATION: &str = "wallet_connection_duration_ms";
/// Disconnects
pub const METRIC_DISCONNECTS: &str = "wallet_disconnects_total";
/// Account and network switches, labelled by change
pub const METRIC_CHANGES: &str = "wallet_changes_total";
/// Session backend events, labelled by event
pub const METRIC_SESSION_EVENTS: &str = "wallet_session_events_total";
/// 1 while a wallet is connected
pub const METRIC_CONNECTED: &str = "wallet_connected";

/// Register descriptions for every metric the sink emits
pub fn describe_metrics() {
    describe_counter!(METRIC_ATTEMPTS, Unit::Count, "Wallet connection attempts");
    describe_counter!(METRIC_SUCCESSES, Unit::Count, "Successful wallet connections");
    describe_counter!(METRIC_FAILURES, Unit::Count, "Failed wallet connections");
    describe_histogram!(METRIC_DURATION, Unit::Milliseconds, "Time from attempt start to connection");
    describe_counter!(METRIC_DISCONNECTS, Unit::Count, "Wallet disconnects");
    describe_counter!(METRIC_CHANGES, Unit::Count, "Account and network changes while connected");
    describe_counter!(METRIC_SESSION_EVENTS, Unit::Count, "Events forwarded to the session backend");
    describe_gauge!(METRIC_CONNECTED, "Whether a wallet is currently connected");
}

/// Sink backed by the `metrics` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAnalytics;

impl MetricsAnalytics {
    /// Create the sink and register metric descriptions
    pub fn new() -> Self {
        describe_metrics();
        Self
    }
}

fn wallet_label(event: &AnalyticsEvent) -> &'static str {
    event.meta().wallet_type.map_or("unknown", |w| w.as_str())
}

impl AnalyticsSink for MetricsAnalytics {
    fn name(&self) -> &'static str {
        "metrics"
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(&self, event: &AnalyticsEvent) -> AppResult<()> {
        let wallet = wallet_label(event);

        match event {
            AnalyticsEvent::ConnectionAttempt { .. } => {
                counter!(METRIC_ATTEMPTS, "wallet" => wallet).increment(1);
            }
            AnalyticsEvent::ConnectionSucceeded { duration_ms, .. } => {
                counter!(METRIC_SUCCESSES, "wallet" => wallet).increment(1);
                histogram!(METRIC_DURATION, "wallet" => wallet).record(*duration_ms as f64);
                gauge!(METRIC_CONNECTED).set(1.0);
            }
            AnalyticsEvent::ConnectionFailed { kind, .. } => {
                counter!(METRIC_FAILURES, "wallet" => wallet, "kind" => kind.as_str()).increment(1);
            }
            AnalyticsEvent::Disconnect { .. } => {
                counter!(METRIC_DISCONNECTS, "wallet" => wallet).increment(1);
                gauge!(METRIC_CONNECTED).set(0.0);
            }
            AnalyticsEvent::AccountChanged { .. } => {
                counter!(METRIC_CHANGES, "change" => "account").increment(1);
            }
            AnalyticsEvent::NetworkChanged { .. } => {
                counter!(METRIC_CHANGES, "change" => "network").increment(1);
            }
            AnalyticsEvent::WalletConnected { .. }
            | AnalyticsEvent::WalletDisconnected { .. }
            | AnalyticsEvent::AuthenticationFailure { .. }
            | AnalyticsEvent::SessionCreated { .. } => {
                counter!(METRIC_SESSION_EVENTS, "event" => event.name()).increment(1);
            }
        }
        Ok(())
    }
}

impl WalletAnalytics for MetricsAnalytics {}
impl SessionAnalytics for MetricsAnalytics {}

/// Install a global Prometheus recorder serving `/metrics` on `port`.
///
/// Must be called from inside a tokio runtime.
#[cfg(feature = "prometheus")]
pub fn install_prometheus_exporter(port: u16) -> AppResult<()> {
    use crate::core::result::ResultExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::{Ipv4Addr, SocketAddr};

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port))
        .install()
        .map_analytics_err("metrics", || format!("failed to install Prometheus exporter on port {port}"))?;

    tracing::info!("📊 Prometheus exporter listening on port {}", port);
    Ok(())
}
