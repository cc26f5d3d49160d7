//! Time utilities and the clock abstraction used by the tracker
//!
//! The tracker never reads the wall clock directly. It goes through a
//! [`Clock`] so that connection durations are deterministic in tests and
//! scenario replays.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::core::types::Timestamp;

/// ISO 8601 time format
pub const ISO_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a DateTime as ISO 8601 string
pub fn format_iso(dt: &DateTime<Utc>) -> String {
    dt.format(ISO_TIME_FORMAT).to_string()
}

/// Format a millisecond duration as a short human-readable string
pub fn format_duration_ms(millis: u64) -> String {
    if millis < 1_000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        #[allow(clippy::cast_precision_loss)]
        let secs = millis as f64 / 1_000.0;
        format!("{secs:.2}s")
    } else {
        let minutes = millis / 60_000;
        let seconds = (millis % 60_000) / 1_000;
        format!("{minutes}m {seconds}s")
    }
}

/// Source of the current time for the tracker
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(Utc::now().timestamp_millis())
    }
}

/// Manually advanced clock for tests and scenario replays.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.as_millis())),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, millis: u64) {
        let delta = i64::try_from(millis).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    /// Jump to an absolute time
    pub fn set(&self, at: Timestamp) {
        self.millis.store(at.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new(Timestamp::from_millis(1_000));
        let other = clock.clone();

        clock.advance(250);
        assert_eq!(other.now(), Timestamp::from_millis(1_250));

        other.set(Timestamp::from_millis(5));
        assert_eq!(clock.now().as_millis(), 5);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration_ms(500), "500ms");
        assert_eq!(format_duration_ms(1_500), "1.50s");
        assert_eq!(format_duration_ms(125_000), "2m 5s");
    }

    #[test]
    fn test_format_iso() {
        let dt = Timestamp::from_millis(0).to_datetime().unwrap();
        assert_eq!(format_iso(&dt), "1970-01-01T00:00:00.000Z");
    }
}
