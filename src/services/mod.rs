//! Services layer module
//!
//! This module contains the wallet connection tracking service: the
//! connection state machine, its metrics and history, session correlation,
//! and the analytics facade that reports every transition.

pub mod tracker;

// Re-export commonly used types
pub use tracker::{
    AnalyticsEmitter, AnalyticsEvent, AnalyticsSink, AttemptTicket, ConnectionHistory, ConnectionMetrics,
    ConnectionRecord, ConnectionState, ConnectionStats, EventMeta, PluralitySession, RecordingAnalytics,
    SessionAnalytics, TrackerOptions, WalletAnalytics, WalletConnectionTracker,
};
