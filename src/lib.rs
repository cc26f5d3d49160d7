//! Wallet Connection Tracker Library
//!
//! Connection state machine and analytics for the wallet side of a DeFi
//! dashboard: every connect attempt, outcome, disconnect, account switch and
//! network switch is tracked, summarised into success metrics, recorded in a
//! bounded history, correlated with an external identity session and
//! forwarded to pluggable analytics backends.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌────────────┐  │
//! │  │  Application    │  │  SharedTracker  │  │   Replay   │  │
//! │  └─────────────────┘  └─────────────────┘  └────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Services Layer                          │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │  State  │ │ Metrics │ │ History │ │ Session │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Infrastructure Layer                       │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐                       │
//! │  │ Logging │ │ Metrics │ │ Channel │                       │
//! │  └─────────┘ └─────────┘ └─────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Core Layer                             │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐                       │
//! │  │  Types  │ │  Errors │ │  Rules  │                       │
//! │  └─────────┘ └─────────┘ └─────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wallet_connection_tracker::services::tracker::{AnalyticsEmitter, RecordingAnalytics};
//! use wallet_connection_tracker::{WalletConnectionTracker, WalletType};
//!
//! let recorder = Arc::new(RecordingAnalytics::new());
//! let mut tracker = WalletConnectionTracker::new(AnalyticsEmitter::new().with_sink(recorder.clone()));
//!
//! let ticket = tracker.initiate_connection(WalletType::Metamask, None);
//! tracker
//!     .handle_connection_success("0x1111111111111111111111111111111111111111", 1, ticket.started_at, None)
//!     .expect("lenient tracker");
//! assert_eq!(tracker.success_rate(), 100.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Core modules - Domain types, errors and rules
pub mod core;

// Application layer - Wiring, shared tracker and replay
pub mod application;

// Configuration management - Multi-source configuration loading
pub mod config;

// Infrastructure layer - Analytics backends
pub mod infrastructure;

// Services layer - The connection tracker
pub mod services;

// Utilities - Shared helper functions and tools
pub mod utils;

// Re-export commonly used types for convenience
pub use application::{Application, ReplayRunner, ReplayScript, SharedTracker};
pub use config::{AppConfig, ConfigLoader};
pub use core::{
    error::AppError,
    result::AppResult,
    types::*,
};
pub use services::tracker::{
    AnalyticsEmitter, ConnectionState, ConnectionStats, SessionAnalytics, TrackerOptions, WalletAnalytics,
    WalletConnectionTracker,
};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
