//! Analytics backends and the emission facade
//!
//! The tracker talks to two independent backends: a generic wallet analytics
//! backend and a session analytics backend tied to the identity integration.
//! Both are best effort. [`AnalyticsEmitter`] fans each call out to every
//! registered sink and swallows their errors so delivery can never fail a
//! state transition.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, trace, warn};

use crate::core::types::ConnectionError;
use crate::core::AppResult;

use super::events::{AnalyticsEvent, EventMeta};

/// Common surface of every analytics backend
pub trait AnalyticsSink: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Deliver one event
    fn record(&self, event: &AnalyticsEvent) -> AppResult<()>;
}

/// Wallet analytics backend.
///
/// Every method has a default that builds the matching [`AnalyticsEvent`] and
/// hands it to [`AnalyticsSink::record`].
pub trait WalletAnalytics: AnalyticsSink {
    /// A connection attempt started
    fn track_connection_attempt(&self, meta: &EventMeta) -> AppResult<()> {
        self.record(&AnalyticsEvent::ConnectionAttempt { meta: meta.clone() })
    }

    /// A connection attempt succeeded
    fn track_connection_success(
        &self,
        address: &str,
        chain_id: u64,
        duration_ms: u64,
        meta: &EventMeta,
    ) -> AppResult<()> {
        self.record(&AnalyticsEvent::ConnectionSucceeded {
            meta: meta.clone(),
            address: address.to_string(),
            chain_id,
            duration_ms,
        })
    }

    /// A connection attempt failed
    fn track_connection_failure(
        &self,
        error: &ConnectionError,
        duration_ms: u64,
        meta: &EventMeta,
    ) -> AppResult<()> {
        self.record(&AnalyticsEvent::ConnectionFailed {
            meta: meta.clone(),
            error: error.message.clone(),
            code: error.code.clone(),
            kind: error.kind(),
            duration_ms,
        })
    }

    /// The wallet disconnected
    fn track_disconnect(&self, address: Option<&str>, chain_id: Option<u64>, meta: &EventMeta) -> AppResult<()> {
        self.record(&AnalyticsEvent::Disconnect {
            meta: meta.clone(),
            address: address.map(str::to_string),
            chain_id,
        })
    }

    /// The connected account changed
    fn track_account_changed(&self, old: Option<&str>, new: &str, meta: &EventMeta) -> AppResult<()> {
        self.record(&AnalyticsEvent::AccountChanged {
            meta: meta.clone(),
            old_address: old.map(str::to_string),
            new_address: new.to_string(),
        })
    }

    /// The connected network changed
    fn track_network_changed(&self, old: Option<u64>, new: u64, meta: &EventMeta) -> AppResult<()> {
        self.record(&AnalyticsEvent::NetworkChanged {
            meta: meta.clone(),
            old_chain_id: old,
            new_chain_id: new,
        })
    }
}

/// Session analytics backend of the identity integration
pub trait SessionAnalytics: AnalyticsSink {
    /// A wallet connected under a session
    fn track_wallet_connected(
        &self,
        address: &str,
        chain_id: u64,
        duration_ms: u64,
        meta: &EventMeta,
    ) -> AppResult<()> {
        self.record(&AnalyticsEvent::WalletConnected {
            meta: meta.clone(),
            address: address.to_string(),
            chain_id,
            duration_ms,
        })
    }

    /// A wallet disconnected under a session
    fn track_wallet_disconnected(
        &self,
        address: Option<&str>,
        chain_id: Option<u64>,
        meta: &EventMeta,
    ) -> AppResult<()> {
        self.record(&AnalyticsEvent::WalletDisconnected {
            meta: meta.clone(),
            address: address.map(str::to_string),
            chain_id,
        })
    }

    /// A connection attempt under a session failed
    fn track_authentication_failure(&self, error: &ConnectionError, meta: &EventMeta) -> AppResult<()> {
        self.record(&AnalyticsEvent::AuthenticationFailure {
            meta: meta.clone(),
            error: error.message.clone(),
            code: error.code.clone(),
        })
    }

    /// A session was bootstrapped
    fn track_session_created(&self, meta: &EventMeta) -> AppResult<()> {
        self.record(&AnalyticsEvent::SessionCreated { meta: meta.clone() })
    }
}

/// Delivery counters of an [`AnalyticsEmitter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmissionStats {
    /// Sink calls that returned `Ok`
    pub delivered: u64,
    /// Sink calls that returned an error
    pub failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

/// Fan-out facade over the registered analytics sinks
#[derive(Clone, Default)]
pub struct AnalyticsEmitter {
    wallet: Vec<Arc<dyn WalletAnalytics>>,
    session: Vec<Arc<dyn SessionAnalytics>>,
    counters: Arc<Counters>,
}

impl AnalyticsEmitter {
    /// Emitter with no sinks; every call is a no-op
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wallet analytics sink
    #[must_use]
    pub fn with_wallet_sink(mut self, sink: Arc<dyn WalletAnalytics>) -> Self {
        self.wallet.push(sink);
        self
    }

    /// Register a session analytics sink
    #[must_use]
    pub fn with_session_sink(mut self, sink: Arc<dyn SessionAnalytics>) -> Self {
        self.session.push(sink);
        self
    }

    /// Register a sink that serves both backends
    #[must_use]
    pub fn with_sink<S>(self, sink: Arc<S>) -> Self
    where
        S: WalletAnalytics + SessionAnalytics + 'static,
    {
        let wallet: Arc<dyn WalletAnalytics> = sink.clone();
        let session: Arc<dyn SessionAnalytics> = sink;
        self.with_wallet_sink(wallet).with_session_sink(session)
    }

    /// Number of registered wallet and session sinks
    pub fn sink_count(&self) -> (usize, usize) {
        (self.wallet.len(), self.session.len())
    }

    /// Delivery counters since creation
    pub fn stats(&self) -> EmissionStats {
        EmissionStats {
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn connection_attempt(&self, meta: &EventMeta) {
        self.each_wallet("track_connection_attempt", |s| s.track_connection_attempt(meta));
    }

    pub(crate) fn connection_success(&self, address: &str, chain_id: u64, duration_ms: u64, meta: &EventMeta) {
        self.each_wallet("track_connection_success", |s| {
            s.track_connection_success(address, chain_id, duration_ms, meta)
        });
    }

    pub(crate) fn connection_failure(&self, error: &ConnectionError, duration_ms: u64, meta: &EventMeta) {
        self.each_wallet("track_connection_failure", |s| {
            s.track_connection_failure(error, duration_ms, meta)
        });
    }

    pub(crate) fn disconnect(&self, address: Option<&str>, chain_id: Option<u64>, meta: &EventMeta) {
        self.each_wallet("track_disconnect", |s| s.track_disconnect(address, chain_id, meta));
    }

    pub(crate) fn account_changed(&self, old: Option<&str>, new: &str, meta: &EventMeta) {
        self.each_wallet("track_account_changed", |s| s.track_account_changed(old, new, meta));
    }

    pub(crate) fn network_changed(&self, old: Option<u64>, new: u64, meta: &EventMeta) {
        self.each_wallet("track_network_changed", |s| s.track_network_changed(old, new, meta));
    }

    pub(crate) fn wallet_connected(&self, address: &str, chain_id: u64, duration_ms: u64, meta: &EventMeta) {
        self.each_session("track_wallet_connected", |s| {
            s.track_wallet_connected(address, chain_id, duration_ms, meta)
        });
    }

    pub(crate) fn wallet_disconnected(&self, address: Option<&str>, chain_id: Option<u64>, meta: &EventMeta) {
        self.each_session("track_wallet_disconnected", |s| {
            s.track_wallet_disconnected(address, chain_id, meta)
        });
    }

    pub(crate) fn authentication_failure(&self, error: &ConnectionError, meta: &EventMeta) {
        self.each_session("track_authentication_failure", |s| {
            s.track_authentication_failure(error, meta)
        });
    }

    pub(crate) fn session_created(&self, meta: &EventMeta) {
        self.each_session("track_session_created", |s| s.track_session_created(meta));
    }

    fn each_wallet(&self, operation: &'static str, call: impl Fn(&dyn WalletAnalytics) -> AppResult<()>) {
        for sink in &self.wallet {
            self.settle(sink.name(), operation, call(sink.as_ref()));
        }
    }

    fn each_session(&self, operation: &'static str, call: impl Fn(&dyn SessionAnalytics) -> AppResult<()>) {
        for sink in &self.session {
            self.settle(sink.name(), operation, call(sink.as_ref()));
        }
    }

    fn settle(&self, sink: &'static str, operation: &'static str, result: AppResult<()>) {
        match result {
            Ok(()) => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                trace!(sink, operation, "analytics event delivered");
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                if e.is_ignorable() {
                    warn!(sink, operation, error = %e, "analytics sink failed, event dropped");
                } else {
                    error!(sink, operation, error = %e, kind = ?e.kind(), "analytics sink errored unexpectedly, event dropped");
                }
            }
        }
    }
}

impl fmt::Debug for AnalyticsEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyticsEmitter")
            .field("wallet", &self.wallet.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("session", &self.session.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingAnalytics {
    events: Mutex<Vec<AnalyticsEvent>>,
}

impl RecordingAnalytics {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events in delivery order
    pub fn events(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().clone()
    }

    /// Names of the recorded events in delivery order
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(AnalyticsEvent::name).collect()
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<AnalyticsEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn record(&self, event: &AnalyticsEvent) -> AppResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

impl WalletAnalytics for RecordingAnalytics {}
impl SessionAnalytics for RecordingAnalytics {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Timestamp;
    use crate::core::AppError;
    use pretty_assertions::assert_eq;

    struct FailingSink;

    impl AnalyticsSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn record(&self, _event: &AnalyticsEvent) -> AppResult<()> {
            Err(AppError::analytics("backend unavailable").with_sink("failing"))
        }
    }

    impl WalletAnalytics for FailingSink {}

    fn meta() -> EventMeta {
        EventMeta::at(Timestamp::from_millis(42))
    }

    #[test]
    fn test_routes_to_matching_backend() {
        let wallet = Arc::new(RecordingAnalytics::new());
        let session = Arc::new(RecordingAnalytics::new());
        let emitter = AnalyticsEmitter::new()
            .with_wallet_sink(wallet.clone())
            .with_session_sink(session.clone());

        emitter.connection_attempt(&meta());
        emitter.session_created(&meta());

        assert_eq!(wallet.names(), vec!["connection_attempt"]);
        assert_eq!(session.names(), vec!["session_created"]);
        assert_eq!(emitter.stats(), EmissionStats { delivered: 2, failed: 0 });
    }

    #[test]
    fn test_failing_sink_does_not_block_others() {
        let recorder = Arc::new(RecordingAnalytics::new());
        let emitter = AnalyticsEmitter::new()
            .with_wallet_sink(Arc::new(FailingSink))
            .with_wallet_sink(recorder.clone());

        emitter.account_changed(Some("0xold"), "0xnew", &meta());

        assert_eq!(recorder.len(), 1);
        assert_eq!(emitter.stats(), EmissionStats { delivered: 1, failed: 1 });
    }

    #[test]
    fn test_dual_sink_and_empty_emitter() {
        let recorder = Arc::new(RecordingAnalytics::new());
        let emitter = AnalyticsEmitter::new().with_sink(recorder.clone());
        assert_eq!(emitter.sink_count(), (1, 1));

        emitter.disconnect(Some("0xabc"), Some(1), &meta());
        emitter.wallet_disconnected(Some("0xabc"), Some(1), &meta());
        assert_eq!(recorder.take().len(), 2);
        assert!(recorder.is_empty());

        let empty = AnalyticsEmitter::new();
        empty.connection_attempt(&meta());
        assert_eq!(empty.stats(), EmissionStats::default());
    }
}
