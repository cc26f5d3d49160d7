//! Infrastructure layer module
//!
//! This module contains the concrete analytics backends the tracker reports
//! to. The tracker only sees them through the wallet and session analytics
//! traits.

pub mod analytics;

// Re-export commonly used types
pub use analytics::{ChannelAnalytics, DispatchSummary, EventTransport, MetricsAnalytics, TracingAnalytics};
