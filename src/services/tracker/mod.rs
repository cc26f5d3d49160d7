//! Wallet connection tracking service
//!
//! This module provides the connection state machine, metric aggregation,
//! the bounded attempt history, correlation with the external identity
//! session and the analytics fan-out that reports every transition.
//!
//! The tracker is a plain owned value driven through `&mut self`. It never
//! blocks and never fails because of an analytics backend.

pub mod emitter;
pub mod events;
pub mod history;
pub mod metrics;
pub mod session;
pub mod state;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::core::domain::tracking::DEFAULT_HISTORY_CAPACITY;
use crate::core::error::AppError;
use crate::core::result::AppResult;
use crate::core::types::{
    AttemptId, ConnectionError, ConnectionStatus, PluralityData, Timestamp, Transition, WalletType,
};
use crate::utils::time::{format_duration_ms, Clock, SystemClock};

pub use emitter::{
    AnalyticsEmitter, AnalyticsSink, EmissionStats, RecordingAnalytics, SessionAnalytics, WalletAnalytics,
};
pub use events::{AnalyticsEvent, EventMeta};
pub use history::{ConnectionHistory, ConnectionRecord};
pub use metrics::{incremental_average, success_rate, ConnectionMetrics};
pub use session::{CorrelationIds, PluralitySession, SessionCorrelation};
pub use state::{AttemptTicket, ConnectionState, PendingAttempt};

/// Error code recorded for attempts expired by the timeout path
pub const TIMEOUT_ERROR_CODE: &str = "timeout";

/// Tracker behaviour switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackerOptions {
    /// Maximum number of history records
    pub history_capacity: usize,
    /// Reject calls whose precondition does not hold instead of ignoring them
    pub strict_preconditions: bool,
    /// Deadline applied by [`WalletConnectionTracker::initiate_connection`]
    pub default_timeout_ms: Option<u64>,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            strict_preconditions: false,
            default_timeout_ms: None,
        }
    }
}

/// Serializable summary of the tracker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    /// Current status
    pub status: ConnectionStatus,
    /// Connected address
    pub address: Option<String>,
    /// Connected chain
    pub chain_id: Option<u64>,
    /// Attempts started
    pub total_attempts: u64,
    /// Attempts that connected
    pub successful_connections: u64,
    /// Attempts that failed or timed out
    pub failed_connections: u64,
    /// Percentage of attempts that connected
    pub success_rate: f64,
    /// Mean connect time in milliseconds
    pub average_connect_time: f64,
    /// Records in the history
    pub history_len: usize,
    /// Whether an attempt is unresolved
    pub in_flight: bool,
    /// Analytics delivery counters
    pub emitted: EmissionStats,
}

/// Connection state machine with metrics, history and analytics
///
/// Addresses and chain ids are stored as the wallet provider reports them.
/// The tracker does not check their format; callers that ingest untrusted
/// input (such as replay scripts) validate with
/// [`validate_wallet_address`](crate::core::validation::validate_wallet_address)
/// and [`WalletAddress`](crate::core::types::WalletAddress) before calling in.
#[derive(Debug)]
pub struct WalletConnectionTracker {
    state: ConnectionState,
    metrics: ConnectionMetrics,
    correlation: SessionCorrelation,
    pending: Option<PendingAttempt>,
    emitter: AnalyticsEmitter,
    clock: Arc<dyn Clock>,
    options: TrackerOptions,
}

impl WalletConnectionTracker {
    /// Tracker on the system clock with default options
    pub fn new(emitter: AnalyticsEmitter) -> Self {
        Self::with_options(TrackerOptions::default(), emitter, Arc::new(SystemClock))
    }

    /// Fully parameterised tracker
    pub fn with_options(options: TrackerOptions, emitter: AnalyticsEmitter, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: ConnectionState::default(),
            metrics: ConnectionMetrics::new(options.history_capacity),
            correlation: SessionCorrelation::default(),
            pending: None,
            emitter,
            clock,
            options,
        }
    }

    /// Start a connection attempt using the configured default timeout.
    ///
    /// Always legal. A new attempt overwrites one that is still in flight.
    pub fn initiate_connection(
        &mut self,
        wallet_type: WalletType,
        plurality_data: Option<PluralityData>,
    ) -> AttemptTicket {
        self.start_attempt(wallet_type, plurality_data, self.options.default_timeout_ms)
    }

    /// Start a connection attempt that expires after `timeout_ms`
    pub fn initiate_connection_with_timeout(
        &mut self,
        wallet_type: WalletType,
        plurality_data: Option<PluralityData>,
        timeout_ms: u64,
    ) -> AttemptTicket {
        self.start_attempt(wallet_type, plurality_data, Some(timeout_ms))
    }

    #[instrument(skip(self, plurality_data), fields(wallet = %wallet_type))]
    fn start_attempt(
        &mut self,
        wallet_type: WalletType,
        plurality_data: Option<PluralityData>,
        timeout_ms: Option<u64>,
    ) -> AttemptTicket {
        let now = self.clock.now();
        let pending = PendingAttempt {
            attempt_id: AttemptId::new(),
            started_at: now,
            wallet_type,
            deadline: timeout_ms.map(|ms| now.add_millis(ms)),
        };

        if let Some(previous) = self.pending.replace(pending) {
            debug!(previous = %previous.attempt_id, "Overwriting unresolved attempt");
        }

        self.state.status = ConnectionStatus::Connecting;
        self.state.error = None;
        self.state.wallet_type = Some(wallet_type);
        if let Some(data) = plurality_data {
            self.state.absorb(data.into());
        }
        self.metrics.record_attempt();

        let meta = self.event_meta(now, Some(pending.attempt_id));
        self.emitter.connection_attempt(&meta);

        info!(
            "🔌 Connection attempt {} started with {}",
            pending.attempt_id, wallet_type
        );
        pending.ticket()
    }

    /// Resolve the current attempt as connected
    #[instrument(skip(self, address, plurality_data))]
    pub fn handle_connection_success(
        &mut self,
        address: impl Into<String>,
        chain_id: u64,
        start_time: Timestamp,
        plurality_data: Option<PluralityData>,
    ) -> AppResult<Transition> {
        if self.options.strict_preconditions && self.state.status != ConnectionStatus::Connecting {
            return self.reject("handle_connection_success");
        }

        let address = address.into();
        let now = self.clock.now();
        let duration_ms = now.millis_since(start_time);
        let attempt_id = self.pending.take().map(|p| p.attempt_id);

        if let Some(data) = plurality_data {
            self.state.absorb(data.into());
        }
        self.state.status = ConnectionStatus::Connected;
        self.state.address = Some(address.clone());
        self.state.chain_id = Some(chain_id);
        self.state.error = None;
        self.state.last_connected = Some(now);
        self.state.connection_duration = Some(duration_ms);

        self.metrics.record_success(ConnectionRecord {
            attempt_id: attempt_id.unwrap_or_default(),
            timestamp: now,
            success: true,
            wallet_type: self.state.wallet_type,
            duration_ms,
            error: None,
            error_code: None,
        });

        let ids = self.correlation_ids();
        let meta = self.event_meta(now, attempt_id);
        self.emitter.connection_success(&address, chain_id, duration_ms, &meta);
        if ids.is_present() {
            self.emitter.wallet_connected(&address, chain_id, duration_ms, &meta);
            self.correlation.mark_authenticated();
        }

        info!(
            "✅ Wallet {} connected on chain {} in {}",
            address,
            chain_id,
            format_duration_ms(duration_ms)
        );
        Ok(Transition::Applied)
    }

    /// Resolve the current attempt as failed
    #[instrument(skip(self, error, plurality_data))]
    pub fn handle_connection_failure(
        &mut self,
        error: impl Into<String>,
        error_code: Option<String>,
        start_time: Timestamp,
        plurality_data: Option<PluralityData>,
    ) -> AppResult<Transition> {
        if self.options.strict_preconditions && self.state.status != ConnectionStatus::Connecting {
            return self.reject("handle_connection_failure");
        }

        if let Some(data) = plurality_data {
            self.state.absorb(data.into());
        }
        self.fail_attempt(error.into(), error_code, start_time);
        Ok(Transition::Applied)
    }

    /// Expire `attempt_id` if it is still the unresolved attempt and its deadline has passed.
    ///
    /// Stale ids, resolved attempts and attempts without a deadline are ignored in
    /// both lenient and strict mode.
    pub fn expire_pending(&mut self, attempt_id: AttemptId) -> AppResult<Transition> {
        let now = self.clock.now();
        let pending = match self.pending {
            Some(pending)
                if pending.attempt_id == attempt_id
                    && self.state.status == ConnectionStatus::Connecting
                    && pending.is_overdue(now) =>
            {
                pending
            }
            _ => {
                debug!(%attempt_id, "Attempt is not pending or not overdue, nothing to expire");
                return Ok(Transition::Ignored);
            }
        };

        warn!("⏰ Connection attempt {} timed out", attempt_id);
        let timeout_ms = now.millis_since(pending.started_at);
        self.fail_attempt(
            format!("Connection attempt timed out after {}", format_duration_ms(timeout_ms)),
            Some(TIMEOUT_ERROR_CODE.to_string()),
            pending.started_at,
        );
        Ok(Transition::Applied)
    }

    fn fail_attempt(&mut self, message: String, code: Option<String>, start_time: Timestamp) {
        let now = self.clock.now();
        let duration_ms = now.millis_since(start_time);
        let attempt_id = self.pending.take().map(|p| p.attempt_id);
        let error = ConnectionError::new(message, code, now);

        self.state.status = ConnectionStatus::Error;
        self.state.error = Some(error.clone());

        self.metrics.record_failure(ConnectionRecord {
            attempt_id: attempt_id.unwrap_or_default(),
            timestamp: now,
            success: false,
            wallet_type: self.state.wallet_type,
            duration_ms,
            error: Some(error.message.clone()),
            error_code: error.code.clone(),
        });

        let ids = self.correlation_ids();
        let meta = self.event_meta(now, attempt_id);
        self.emitter.connection_failure(&error, duration_ms, &meta);
        if ids.is_present() {
            self.emitter.authentication_failure(&error, &meta);
        }

        warn!("❌ Connection failed ({}): {}", error.kind(), error);
    }

    /// Report a disconnect and reset the state. Requires a connected wallet.
    #[instrument(skip(self))]
    pub fn handle_disconnect(&mut self) -> AppResult<Transition> {
        if !self.state.is_connected() {
            return self.reject("handle_disconnect");
        }

        let ids = self.correlation_ids();
        let snapshot = std::mem::take(&mut self.state);
        self.pending = None;

        let meta = EventMeta::at(self.clock.now())
            .with_wallet(snapshot.wallet_type)
            .with_correlation(&ids);
        self.emitter
            .disconnect(snapshot.address.as_deref(), snapshot.chain_id, &meta);
        if ids.is_present() {
            self.emitter
                .wallet_disconnected(snapshot.address.as_deref(), snapshot.chain_id, &meta);
        }

        info!(
            "🔌 Wallet {} disconnected",
            snapshot.address.as_deref().unwrap_or("unknown")
        );
        Ok(Transition::Applied)
    }

    /// Switch the connected account. Requires a connected wallet.
    #[instrument(skip(self, new_address))]
    pub fn handle_account_changed(&mut self, new_address: impl Into<String>) -> AppResult<Transition> {
        if !self.state.is_connected() {
            return self.reject("handle_account_changed");
        }

        let new_address = new_address.into();
        let meta = self.event_meta(self.clock.now(), None);
        self.emitter
            .account_changed(self.state.address.as_deref(), &new_address, &meta);

        info!(
            "🔄 Account changed from {} to {}",
            self.state.address.as_deref().unwrap_or("unknown"),
            new_address
        );
        self.state.address = Some(new_address);
        Ok(Transition::Applied)
    }

    /// Switch the connected network. Requires a connected wallet.
    #[instrument(skip(self))]
    pub fn handle_network_changed(&mut self, new_chain_id: u64) -> AppResult<Transition> {
        if !self.state.is_connected() {
            return self.reject("handle_network_changed");
        }

        let meta = self.event_meta(self.clock.now(), None);
        self.emitter
            .network_changed(self.state.chain_id, new_chain_id, &meta);

        info!("🔄 Network changed from {:?} to {}", self.state.chain_id, new_chain_id);
        self.state.chain_id = Some(new_chain_id);
        Ok(Transition::Applied)
    }

    /// Bootstrap the external session and tag the connection state with its ids.
    ///
    /// Legal in every status. The session counts as authenticated right away
    /// when a wallet is already connected.
    #[instrument(skip(self, user_id))]
    pub fn set_plurality_session(&mut self, session_id: &str, user_id: Option<&str>) -> AppResult<()> {
        let authenticated = self.state.is_connected();
        self.correlation.establish(session_id, user_id, authenticated)?;

        self.state.session_id = Some(session_id.to_string());
        self.state.user_id = user_id.map(str::to_string);

        let ids = self.state.correlation();
        let meta = EventMeta::at(self.clock.now())
            .with_wallet(self.state.wallet_type)
            .with_correlation(&ids);
        self.emitter.session_created(&meta);

        info!("🪪 Plurality session {} established", session_id);
        Ok(())
    }

    /// Current connection snapshot
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Counters, average and history
    pub fn metrics(&self) -> &ConnectionMetrics {
        &self.metrics
    }

    /// Resolved attempts, most recent first
    pub fn history(&self) -> &ConnectionHistory {
        self.metrics.connection_history()
    }

    /// External session, once bootstrapped
    pub fn plurality_session(&self) -> Option<&PluralitySession> {
        self.correlation.session()
    }

    /// Unresolved attempt, if any
    pub fn pending_attempt(&self) -> Option<&PendingAttempt> {
        self.pending.as_ref()
    }

    /// Percentage of attempts that connected
    pub fn success_rate(&self) -> f64 {
        self.metrics.success_rate()
    }

    /// Whether a wallet is connected
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Active options
    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// Current time on the tracker's clock
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Analytics facade
    pub fn emitter(&self) -> &AnalyticsEmitter {
        &self.emitter
    }

    /// Serializable summary
    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            status: self.state.status,
            address: self.state.address.clone(),
            chain_id: self.state.chain_id,
            total_attempts: self.metrics.total_attempts(),
            successful_connections: self.metrics.successful_connections(),
            failed_connections: self.metrics.failed_connections(),
            success_rate: self.metrics.success_rate(),
            average_connect_time: self.metrics.average_connect_time(),
            history_len: self.metrics.connection_history().len(),
            in_flight: self.pending.is_some(),
            emitted: self.emitter.stats(),
        }
    }

    fn correlation_ids(&self) -> CorrelationIds {
        self.correlation.resolve(None, &self.state.correlation())
    }

    fn event_meta(&self, timestamp: Timestamp, attempt_id: Option<AttemptId>) -> EventMeta {
        EventMeta::at(timestamp)
            .with_wallet(self.state.wallet_type)
            .with_attempt(attempt_id)
            .with_correlation(&self.correlation_ids())
    }

    fn reject(&self, operation: &'static str) -> AppResult<Transition> {
        if self.options.strict_preconditions {
            return Err(AppError::precondition(operation, self.state.status));
        }
        debug!(operation, status = %self.state.status, "Precondition not met, ignoring call");
        Ok(Transition::Ignored)
    }
}
