//! Analytics sink implementations
//!
//! Concrete backends for the tracker's wallet and session analytics
//! interfaces: structured logs, the `metrics` facade, and a queued channel
//! drained by a background dispatcher.

pub mod channel;
pub mod logging;
pub mod metrics;

pub use channel::{ChannelAnalytics, DispatchSummary, EventTransport, JsonLinesTransport, TracingTransport};
pub use logging::TracingAnalytics;
pub use self::metrics::MetricsAnalytics;
