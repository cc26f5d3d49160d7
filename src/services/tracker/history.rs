//! Bounded, most-recent-first log of connection attempts

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::domain::tracking::DEFAULT_HISTORY_CAPACITY;
use crate::core::types::{AttemptId, Timestamp, WalletType};

/// Outcome of one resolved connection attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Attempt this record resolves
    pub attempt_id: AttemptId,
    /// When the attempt was resolved
    pub timestamp: Timestamp,
    /// Whether the wallet connected
    pub success: bool,
    /// Wallet used for the attempt
    pub wallet_type: Option<WalletType>,
    /// Time from attempt start to resolution
    pub duration_ms: u64,
    /// Failure message, for failed attempts
    pub error: Option<String>,
    /// Failure code, for failed attempts
    pub error_code: Option<String>,
}

/// Ring buffer of attempt records.
///
/// New records go to the head; once `capacity` is exceeded the oldest record
/// is evicted from the tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHistory {
    entries: VecDeque<ConnectionRecord>,
    capacity: usize,
}

impl ConnectionHistory {
    /// Create an empty history holding at most `capacity` records (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
        }
    }

    /// Prepend a record, returning the evicted one if the buffer was full
    pub fn push(&mut self, record: ConnectionRecord) -> Option<ConnectionRecord> {
        self.entries.push_front(record);
        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    /// Records, most recent first
    pub fn iter(&self) -> impl Iterator<Item = &ConnectionRecord> + '_ {
        self.entries.iter()
    }

    /// Most recent record
    pub fn latest(&self) -> Option<&ConnectionRecord> {
        self.entries.front()
    }

    /// Record at `index` (0 is the most recent)
    pub fn get(&self, index: usize) -> Option<&ConnectionRecord> {
        self.entries.get(index)
    }

    /// Copy of the whole buffer, most recent first
    pub fn to_vec(&self) -> Vec<ConnectionRecord> {
        self.entries.iter().cloned().collect()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no attempt has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of stored records
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ConnectionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl Serialize for ConnectionHistory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.entries.iter())
    }
}
