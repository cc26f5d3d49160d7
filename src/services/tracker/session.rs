//! Correlation of wallet events with an external identity session
//!
//! The identity integration bootstraps a session once; the tracker tags every
//! connect and disconnect event with its ids. Ids can also arrive per call as
//! [`PluralityData`] or be left in the connection state by an earlier call.

use serde::{Deserialize, Serialize};

use crate::core::types::PluralityData;
use crate::core::{AppError, AppResult};
use crate::utils::validation::session::validate_correlation_id;

/// External session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluralitySession {
    /// External session identifier
    pub session_id: String,
    /// External user identifier
    pub user_id: Option<String>,
    /// Whether a wallet has connected under this session
    pub is_authenticated: bool,
}

/// Identifiers attached to an outbound event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CorrelationIds {
    /// External session identifier
    pub session_id: Option<String>,
    /// External user identifier
    pub user_id: Option<String>,
}

impl CorrelationIds {
    /// Whether an event should be forwarded to the session backend
    pub fn is_present(&self) -> bool {
        self.session_id.is_some() || self.user_id.is_some()
    }
}

impl From<PluralityData> for CorrelationIds {
    fn from(data: PluralityData) -> Self {
        Self {
            session_id: data.session_id,
            user_id: data.user_id,
        }
    }
}

/// Holder of the current external session
#[derive(Debug, Clone, Default)]
pub struct SessionCorrelation {
    session: Option<PluralitySession>,
}

impl SessionCorrelation {
    /// Replace the session record; ids only need to be non-empty
    pub fn establish(
        &mut self,
        session_id: &str,
        user_id: Option<&str>,
        authenticated: bool,
    ) -> AppResult<&PluralitySession> {
        validate_correlation_id(session_id, "session_id")
            .map_err(|e| AppError::invalid_field("session_id", session_id, &e.to_string()))?;
        if let Some(user_id) = user_id {
            validate_correlation_id(user_id, "user_id")
                .map_err(|e| AppError::invalid_field("user_id", user_id, &e.to_string()))?;
        }

        Ok(self.session.insert(PluralitySession {
            session_id: session_id.to_string(),
            user_id: user_id.map(str::to_string),
            is_authenticated: authenticated,
        }))
    }

    /// Flag the session as authenticated; returns whether a session exists
    pub fn mark_authenticated(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) => {
                session.is_authenticated = true;
                true
            }
            None => false,
        }
    }

    /// Current session, if bootstrapped
    pub fn session(&self) -> Option<&PluralitySession> {
        self.session.as_ref()
    }

    /// Pick the ids for an event.
    ///
    /// Each id is taken from the first source that has one: the explicit
    /// per-call data, then the ids held in the connection state, then the
    /// stored session.
    pub fn resolve(&self, explicit: Option<&PluralityData>, state: &CorrelationIds) -> CorrelationIds {
        let stored = self.session.as_ref();

        let session_id = explicit
            .and_then(|d| d.session_id.clone())
            .or_else(|| state.session_id.clone())
            .or_else(|| stored.map(|s| s.session_id.clone()));

        let user_id = explicit
            .and_then(|d| d.user_id.clone())
            .or_else(|| state.user_id.clone())
            .or_else(|| stored.and_then(|s| s.user_id.clone()));

        CorrelationIds { session_id, user_id }
    }
}
