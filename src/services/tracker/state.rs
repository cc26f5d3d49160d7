//! Connection state snapshot and in-flight attempt bookkeeping

use serde::{Deserialize, Serialize};

use crate::core::types::{AttemptId, ConnectionError, ConnectionStatus, Timestamp, WalletType};

use super::session::CorrelationIds;

/// Current snapshot of one wallet connection.
///
/// `status` is the only field the tracker branches on. `address` and
/// `chain_id` are set by a successful attempt and cleared on disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Lifecycle status
    pub status: ConnectionStatus,
    /// Connected address
    pub address: Option<String>,
    /// Connected chain id
    pub chain_id: Option<u64>,
    /// Wallet used by the latest attempt
    pub wallet_type: Option<WalletType>,
    /// Last failure, cleared by a new attempt
    pub error: Option<ConnectionError>,
    /// When the wallet last connected
    pub last_connected: Option<Timestamp>,
    /// Duration of the attempt that produced the current connection
    pub connection_duration: Option<u64>,
    /// External session identifier
    pub session_id: Option<String>,
    /// External user identifier
    pub user_id: Option<String>,
}

impl ConnectionState {
    /// Whether a wallet is connected
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Correlation ids currently held in the state
    pub fn correlation(&self) -> CorrelationIds {
        CorrelationIds {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
        }
    }

    /// Store any ids present in `ids`, keeping the existing ones otherwise
    pub(crate) fn absorb(&mut self, ids: CorrelationIds) {
        if ids.session_id.is_some() {
            self.session_id = ids.session_id;
        }
        if ids.user_id.is_some() {
            self.user_id = ids.user_id;
        }
    }
}

/// Handle returned when an attempt starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptTicket {
    /// Start time to pass back to the success or failure handler
    pub started_at: Timestamp,
    /// Identifier of the attempt
    pub attempt_id: AttemptId,
}

/// Attempt that has been initiated but not resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingAttempt {
    /// Identifier of the attempt
    pub attempt_id: AttemptId,
    /// When the attempt started
    pub started_at: Timestamp,
    /// Wallet used for the attempt
    pub wallet_type: WalletType,
    /// When the attempt should be expired, if a timeout applies
    pub deadline: Option<Timestamp>,
}

impl PendingAttempt {
    /// Whether the deadline has passed at `now`
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Ticket handed to the caller
    pub fn ticket(&self) -> AttemptTicket {
        AttemptTicket {
            started_at: self.started_at,
            attempt_id: self.attempt_id,
        }
    }
}
