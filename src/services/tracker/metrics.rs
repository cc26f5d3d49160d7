//! Connection metric aggregation
//!
//! Pure functions over the attempt counters plus the [`ConnectionMetrics`]
//! container the tracker updates on every transition. Counters only grow;
//! nothing outside this module can write them.

use serde::Serialize;

use super::history::{ConnectionHistory, ConnectionRecord};
use crate::core::domain::tracking::MAX_SUCCESS_RATE;

/// Percentage of attempts that connected, `0.0` when nothing was attempted
#[allow(clippy::cast_precision_loss)]
pub fn success_rate(successful: u64, total_attempts: u64) -> f64 {
    if total_attempts == 0 {
        return 0.0;
    }
    (successful as f64 / total_attempts as f64 * 100.0).clamp(0.0, MAX_SUCCESS_RATE)
}

/// Fold one more sample into a running average over `prev_count` samples
#[allow(clippy::cast_precision_loss)]
pub fn incremental_average(prev_avg: f64, prev_count: u64, sample: f64) -> f64 {
    let new_count = prev_count + 1;
    (prev_avg * prev_count as f64 + sample) / new_count as f64
}

/// Attempt counters, running average and bounded history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionMetrics {
    total_attempts: u64,
    successful_connections: u64,
    failed_connections: u64,
    average_connect_time: f64,
    connection_history: ConnectionHistory,
}

impl ConnectionMetrics {
    /// Fresh metrics with a history of the given capacity
    pub fn new(history_capacity: usize) -> Self {
        Self {
            total_attempts: 0,
            successful_connections: 0,
            failed_connections: 0,
            average_connect_time: 0.0,
            connection_history: ConnectionHistory::new(history_capacity),
        }
    }

    pub(crate) fn record_attempt(&mut self) {
        self.total_attempts += 1;
    }

    pub(crate) fn record_success(&mut self, record: ConnectionRecord) {
        #[allow(clippy::cast_precision_loss)]
        let sample = record.duration_ms as f64;
        self.average_connect_time =
            incremental_average(self.average_connect_time, self.successful_connections, sample);
        self.successful_connections += 1;
        self.connection_history.push(record);
    }

    pub(crate) fn record_failure(&mut self, record: ConnectionRecord) {
        self.failed_connections += 1;
        self.connection_history.push(record);
    }

    /// Number of `initiate_connection` calls
    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    /// Number of attempts that connected
    pub fn successful_connections(&self) -> u64 {
        self.successful_connections
    }

    /// Number of attempts that failed or timed out
    pub fn failed_connections(&self) -> u64 {
        self.failed_connections
    }

    /// Mean time to connect over successful attempts, in milliseconds
    pub fn average_connect_time(&self) -> f64 {
        self.average_connect_time
    }

    /// Resolved attempt log
    pub fn connection_history(&self) -> &ConnectionHistory {
        &self.connection_history
    }

    /// See [`success_rate`]
    pub fn success_rate(&self) -> f64 {
        success_rate(self.successful_connections, self.total_attempts)
    }
}

impl Default for ConnectionMetrics {
    fn default() -> Self {
        Self::new(crate::core::domain::tracking::DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AttemptId, Timestamp};

    fn outcome(success: bool, duration_ms: u64) -> ConnectionRecord {
        ConnectionRecord {
            attempt_id: AttemptId::new(),
            timestamp: Timestamp::from_millis(0),
            success,
            wallet_type: None,
            duration_ms,
            error: (!success).then(|| "rejected".to_string()),
            error_code: None,
        }
    }

    #[test]
    fn test_success_rate_bounds() {
        assert_eq!(success_rate(0, 0), 0.0);
        assert_eq!(success_rate(1, 1), 100.0);
        assert_eq!(success_rate(1, 4), 25.0);
        assert_eq!(success_rate(5, 4), 100.0);
    }

    #[test]
    fn test_incremental_average() {
        let avg = incremental_average(0.0, 0, 500.0);
        assert_eq!(avg, 500.0);
        let avg = incremental_average(avg, 1, 300.0);
        assert_eq!(avg, 400.0);
    }

    #[test]
    fn test_average_is_stable_over_many_updates() {
        let mut avg = 0.0;
        let mut sum = 0.0;
        for i in 0..10_000u64 {
            let sample = (i % 997) as f64 + 0.25;
            sum += sample;
            avg = incremental_average(avg, i, sample);
        }
        let exact = sum / 10_000.0;
        assert!((avg - exact).abs() < 1e-6, "avg={avg} exact={exact}");
    }

    #[test]
    fn test_failures_do_not_move_average() {
        let mut metrics = ConnectionMetrics::default();
        metrics.record_attempt();
        metrics.record_success(outcome(true, 200));
        metrics.record_attempt();
        metrics.record_failure(outcome(false, 9_000));

        assert_eq!(metrics.total_attempts(), 2);
        assert_eq!(metrics.successful_connections(), 1);
        assert_eq!(metrics.failed_connections(), 1);
        assert_eq!(metrics.average_connect_time(), 200.0);
        assert_eq!(metrics.success_rate(), 50.0);
        assert_eq!(metrics.connection_history().len(), 2);
        assert!(!metrics.connection_history().latest().unwrap().success);
    }
}
