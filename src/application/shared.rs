//! Async shared handle around the tracker with a timeout watchdog

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::result::AppResult;
use crate::core::types::{AttemptId, PluralityData, Timestamp, Transition, WalletType};
use crate::services::tracker::{AttemptTicket, ConnectionState, ConnectionStats, WalletConnectionTracker};

/// Tracker shared between provider callbacks and the timeout watchdog.
///
/// Every call takes the write lock, so operations serialize in arrival order.
#[derive(Debug, Clone)]
pub struct SharedTracker {
    inner: Arc<RwLock<WalletConnectionTracker>>,
}

impl SharedTracker {
    /// Wrap a tracker
    pub fn new(tracker: WalletConnectionTracker) -> Self {
        Self {
            inner: Arc::new(RwLock::new(tracker)),
        }
    }

    /// Start an attempt, arming the watchdog when a default timeout is configured
    pub async fn initiate_connection(
        &self,
        wallet_type: WalletType,
        plurality_data: Option<PluralityData>,
    ) -> AttemptTicket {
        let ticket = self.inner.write().await.initiate_connection(wallet_type, plurality_data);
        self.arm_watchdog(ticket.attempt_id).await;
        ticket
    }

    /// Start an attempt that expires after `timeout_ms`
    pub async fn initiate_connection_with_timeout(
        &self,
        wallet_type: WalletType,
        plurality_data: Option<PluralityData>,
        timeout_ms: u64,
    ) -> AttemptTicket {
        let ticket = self
            .inner
            .write()
            .await
            .initiate_connection_with_timeout(wallet_type, plurality_data, timeout_ms);
        self.arm_watchdog(ticket.attempt_id).await;
        ticket
    }

    /// See [`WalletConnectionTracker::handle_connection_success`]
    pub async fn handle_connection_success(
        &self,
        address: impl Into<String>,
        chain_id: u64,
        start_time: Timestamp,
        plurality_data: Option<PluralityData>,
    ) -> AppResult<Transition> {
        self.inner
            .write()
            .await
            .handle_connection_success(address, chain_id, start_time, plurality_data)
    }

    /// See [`WalletConnectionTracker::handle_connection_failure`]
    pub async fn handle_connection_failure(
        &self,
        error: impl Into<String>,
        error_code: Option<String>,
        start_time: Timestamp,
        plurality_data: Option<PluralityData>,
    ) -> AppResult<Transition> {
        self.inner
            .write()
            .await
            .handle_connection_failure(error, error_code, start_time, plurality_data)
    }

    /// See [`WalletConnectionTracker::handle_disconnect`]
    pub async fn handle_disconnect(&self) -> AppResult<Transition> {
        self.inner.write().await.handle_disconnect()
    }

    /// See [`WalletConnectionTracker::handle_account_changed`]
    pub async fn handle_account_changed(&self, new_address: impl Into<String>) -> AppResult<Transition> {
        self.inner.write().await.handle_account_changed(new_address)
    }

    /// See [`WalletConnectionTracker::handle_network_changed`]
    pub async fn handle_network_changed(&self, new_chain_id: u64) -> AppResult<Transition> {
        self.inner.write().await.handle_network_changed(new_chain_id)
    }

    /// See [`WalletConnectionTracker::set_plurality_session`]
    pub async fn set_plurality_session(&self, session_id: &str, user_id: Option<&str>) -> AppResult<()> {
        self.inner.write().await.set_plurality_session(session_id, user_id)
    }

    /// Copy of the current state
    pub async fn state(&self) -> ConnectionState {
        self.inner.read().await.state().clone()
    }

    /// Current summary
    pub async fn stats(&self) -> ConnectionStats {
        self.inner.read().await.stats()
    }

    /// Run `f` against the tracker under the read lock
    pub async fn with_tracker<R>(&self, f: impl FnOnce(&WalletConnectionTracker) -> R) -> R {
        let tracker = self.inner.read().await;
        f(&*tracker)
    }

    /// Spawn the watchdog for `attempt_id` if the attempt carries a deadline
    async fn arm_watchdog(&self, attempt_id: AttemptId) -> Option<JoinHandle<()>> {
        let has_deadline = self
            .inner
            .read()
            .await
            .pending_attempt()
            .is_some_and(|p| p.attempt_id == attempt_id && p.deadline.is_some());
        if !has_deadline {
            return None;
        }

        let inner = Arc::clone(&self.inner);
        debug!(%attempt_id, "Arming connection timeout watchdog");
        Some(tokio::spawn(watch_attempt(inner, attempt_id)))
    }
}

/// Sleep until the attempt's deadline and expire it if still unresolved.
///
/// Exits as soon as the attempt is resolved or replaced.
async fn watch_attempt(inner: Arc<RwLock<WalletConnectionTracker>>, attempt_id: AttemptId) {
    loop {
        let remaining = {
            let tracker = inner.read().await;
            match tracker.pending_attempt() {
                Some(pending) if pending.attempt_id == attempt_id => match pending.deadline {
                    Some(deadline) => deadline.millis_since(tracker.now()),
                    None => return,
                },
                _ => return,
            }
        };

        if remaining == 0 {
            if let Err(e) = inner.write().await.expire_pending(attempt_id) {
                warn!("⚠️  Failed to expire attempt {}: {}", attempt_id, e);
            }
            return;
        }

        tokio::time::sleep(Duration::from_millis(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ConnectionStatus;
    use crate::services::tracker::{AnalyticsEmitter, RecordingAnalytics, TrackerOptions, TIMEOUT_ERROR_CODE};
    use crate::utils::time::ManualClock;

    fn shared(default_timeout_ms: Option<u64>) -> (SharedTracker, ManualClock, Arc<RecordingAnalytics>) {
        let clock = ManualClock::new(Timestamp::from_millis(1_000));
        let recorder = Arc::new(RecordingAnalytics::new());
        let options = TrackerOptions {
            default_timeout_ms,
            ..TrackerOptions::default()
        };
        let tracker = WalletConnectionTracker::with_options(
            options,
            AnalyticsEmitter::new().with_sink(Arc::clone(&recorder)),
            Arc::new(clock.clone()),
        );
        (SharedTracker::new(tracker), clock, recorder)
    }

    #[tokio::test]
    async fn test_shared_flow() {
        let (tracker, clock, recorder) = shared(None);

        let ticket = tracker.initiate_connection(WalletType::Metamask, None).await;
        clock.advance(250);
        tracker
            .handle_connection_success("0xabc", 1, ticket.started_at, None)
            .await
            .unwrap();

        let stats = tracker.stats().await;
        assert_eq!(stats.status, ConnectionStatus::Connected);
        assert_eq!(stats.average_connect_time, 250.0);
        assert_eq!(recorder.names(), vec!["connection_attempt", "connection_succeeded"]);

        assert!(tracker.handle_disconnect().await.unwrap().is_applied());
        assert!(!tracker.with_tracker(|t| t.is_connected()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_expires_overdue_attempt() {
        let (tracker, clock, recorder) = shared(Some(5_000));

        tracker.initiate_connection(WalletType::Coinbase, None).await;
        clock.advance(5_000);
        tokio::time::sleep(Duration::from_millis(5_001)).await;
        tokio::task::yield_now().await;

        let state = tracker.state().await;
        assert_eq!(state.status, ConnectionStatus::Error);
        assert_eq!(
            state.error.and_then(|e| e.code).as_deref(),
            Some(TIMEOUT_ERROR_CODE)
        );
        assert_eq!(tracker.stats().await.failed_connections, 1);
        assert!(recorder.names().contains(&"connection_failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_watchdog_leaves_resolved_attempt_alone() {
        let (tracker, clock, _recorder) = shared(None);

        let ticket = tracker
            .initiate_connection_with_timeout(WalletType::WalletConnect, None, 1_000)
            .await;
        clock.advance(400);
        tracker
            .handle_connection_success("0xabc", 10, ticket.started_at, None)
            .await
            .unwrap();

        clock.advance(2_000);
        tokio::time::sleep(Duration::from_millis(2_000)).await;
        tokio::task::yield_now().await;

        let stats = tracker.stats().await;
        assert_eq!(stats.status, ConnectionStatus::Connected);
        assert_eq!(stats.failed_connections, 0);
        assert!(!stats.in_flight);
    }
}
