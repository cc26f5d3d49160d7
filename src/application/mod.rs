//! Application layer module
//!
//! This module contains the application structure that wires configuration
//! to analytics sinks, the async shared tracker with its timeout watchdog, and
//! the scenario replay used by the CLI.

pub mod app;
pub mod replay;
pub mod shared;

// Re-export main application types
pub use app::Application;
pub use replay::{ReplayReport, ReplayRunner, ReplayScript, ReplayStep, StepOutcome, StepResult};
pub use shared::SharedTracker;
