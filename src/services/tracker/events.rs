//! Structured analytics events produced by the tracker

use serde::{Deserialize, Serialize};

use crate::core::types::{AttemptId, ConnectionErrorKind, Timestamp, WalletType};

use super::session::CorrelationIds;

/// Fields shared by every event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    /// When the event was produced
    pub timestamp: Timestamp,
    /// Wallet in use when the event was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_type: Option<WalletType>,
    /// Attempt the event belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<AttemptId>,
    /// External session identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// External user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl EventMeta {
    /// Metadata stamped at `timestamp` with nothing else attached
    pub fn at(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            wallet_type: None,
            attempt_id: None,
            session_id: None,
            user_id: None,
        }
    }

    /// Attach the wallet type
    #[must_use]
    pub fn with_wallet(mut self, wallet_type: Option<WalletType>) -> Self {
        self.wallet_type = wallet_type;
        self
    }

    /// Attach the attempt id
    #[must_use]
    pub fn with_attempt(mut self, attempt_id: Option<AttemptId>) -> Self {
        self.attempt_id = attempt_id;
        self
    }

    /// Attach correlation ids
    #[must_use]
    pub fn with_correlation(mut self, ids: &CorrelationIds) -> Self {
        self.session_id = ids.session_id.clone();
        self.user_id = ids.user_id.clone();
        self
    }
}

/// One analytics event, as delivered to sinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    /// A connection attempt started
    ConnectionAttempt {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
    },
    /// A connection attempt succeeded
    ConnectionSucceeded {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
        /// Connected address
        address: String,
        /// Connected chain
        chain_id: u64,
        /// Attempt duration
        duration_ms: u64,
    },
    /// A connection attempt failed
    ConnectionFailed {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
        /// Provider message
        error: String,
        /// Provider code
        code: Option<String>,
        /// Failure classification
        kind: ConnectionErrorKind,
        /// Attempt duration
        duration_ms: u64,
    },
    /// The wallet disconnected
    Disconnect {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
        /// Address before disconnecting
        address: Option<String>,
        /// Chain before disconnecting
        chain_id: Option<u64>,
    },
    /// The connected account changed
    AccountChanged {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
        /// Previous address
        old_address: Option<String>,
        /// New address
        new_address: String,
    },
    /// The connected network changed
    NetworkChanged {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
        /// Previous chain
        old_chain_id: Option<u64>,
        /// New chain
        new_chain_id: u64,
    },
    /// A wallet connected under an external session
    WalletConnected {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
        /// Connected address
        address: String,
        /// Connected chain
        chain_id: u64,
        /// Attempt duration
        duration_ms: u64,
    },
    /// A wallet disconnected under an external session
    WalletDisconnected {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
        /// Address before disconnecting
        address: Option<String>,
        /// Chain before disconnecting
        chain_id: Option<u64>,
    },
    /// A connection attempt under an external session failed
    AuthenticationFailure {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
        /// Provider message
        error: String,
        /// Provider code
        code: Option<String>,
    },
    /// An external session was bootstrapped
    SessionCreated {
        /// Shared fields
        #[serde(flatten)]
        meta: EventMeta,
    },
}

impl AnalyticsEvent {
    /// Event name as serialized in the `event` tag
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ConnectionAttempt { .. } => "connection_attempt",
            Self::ConnectionSucceeded { .. } => "connection_succeeded",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::Disconnect { .. } => "disconnect",
            Self::AccountChanged { .. } => "account_changed",
            Self::NetworkChanged { .. } => "network_changed",
            Self::WalletConnected { .. } => "wallet_connected",
            Self::WalletDisconnected { .. } => "wallet_disconnected",
            Self::AuthenticationFailure { .. } => "authentication_failure",
            Self::SessionCreated { .. } => "session_created",
        }
    }

    /// Shared fields
    pub fn meta(&self) -> &EventMeta {
        match self {
            Self::ConnectionAttempt { meta }
            | Self::ConnectionSucceeded { meta, .. }
            | Self::ConnectionFailed { meta, .. }
            | Self::Disconnect { meta, .. }
            | Self::AccountChanged { meta, .. }
            | Self::NetworkChanged { meta, .. }
            | Self::WalletConnected { meta, .. }
            | Self::WalletDisconnected { meta, .. }
            | Self::AuthenticationFailure { meta, .. }
            | Self::SessionCreated { meta } => meta,
        }
    }

    /// Whether the event belongs to the session backend
    pub const fn is_session_event(&self) -> bool {
        matches!(
            self,
            Self::WalletConnected { .. }
                | Self::WalletDisconnected { .. }
                | Self::AuthenticationFailure { .. }
                | Self::SessionCreated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_event_serializes_with_tag_and_flattened_meta() {
        let ids = CorrelationIds {
            session_id: Some("plr-1".into()),
            user_id: None,
        };
        let event = AnalyticsEvent::NetworkChanged {
            meta: EventMeta::at(Timestamp::from_millis(1_500))
                .with_wallet(Some(WalletType::Metamask))
                .with_correlation(&ids),
            old_chain_id: Some(1),
            new_chain_id: 137,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "network_changed",
                "timestamp": 1500,
                "wallet_type": "metamask",
                "session_id": "plr-1",
                "old_chain_id": 1,
                "new_chain_id": 137
            })
        );
        assert_eq!(event.name(), "network_changed");
        assert!(!event.is_session_event());
    }

    #[test]
    fn test_session_events_are_classified() {
        let event = AnalyticsEvent::SessionCreated {
            meta: EventMeta::at(Timestamp::from_millis(0)),
        };
        assert!(event.is_session_event());
        assert_eq!(event.meta().timestamp.as_millis(), 0);
    }
}
