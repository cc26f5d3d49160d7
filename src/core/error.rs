//! Application error types and error handling utilities
//!
//! This module defines the error system for the wallet connection tracker.
//! It provides structured error types, categories, and conversions used
//! for error propagation throughout the library and the replay binary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main application error type that encompasses all possible errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config {
        /// Human readable description
        message: String,
        /// Underlying cause
        #[source]
        source: Option<Box<AppError>>,
    },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation {
        /// Human readable description
        message: String,
        /// Offending field
        field: Option<String>,
        /// Offending value
        value: Option<String>,
    },

    /// A tracker operation was invoked in a state that does not allow it
    #[error("Precondition failed: {operation} is not allowed while {status}")]
    Precondition {
        /// Operation that was rejected
        operation: String,
        /// Connection status at the time of the call
        status: String,
    },

    /// Analytics sink errors
    #[error("Analytics error: {message}")]
    Analytics {
        /// Human readable description
        message: String,
        /// Sink that produced the error
        sink: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<Box<AppError>>,
    },

    /// Scenario replay errors
    #[error("Replay error at step {step}: {message}")]
    Replay {
        /// Human readable description
        message: String,
        /// Zero-based index of the failing step
        step: usize,
    },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout {
        /// Human readable description
        message: String,
        /// Operation that timed out
        operation: String,
        /// Elapsed time in milliseconds
        duration_ms: u64,
    },

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal {
        /// Human readable description
        message: String,
        /// Component where the error occurred
        component: Option<String>,
        /// Underlying cause
        #[source]
        source: Option<Box<AppError>>,
    },
}

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Configuration and setup errors
    Configuration,
    /// Tracker usage errors
    Usage,
    /// Analytics delivery errors
    Integration,
    /// Timeout errors
    Performance,
    /// Validation and input errors
    Validation,
    /// System and infrastructure errors
    System,
}

impl AppError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            value: None,
        }
    }

    /// Create a validation error pointing at a specific field
    pub fn invalid_field<F: Into<String>, V: Into<String>>(field: F, value: V, message: &str) -> Self {
        Self::Validation {
            message: message.to_string(),
            field: Some(field.into()),
            value: Some(value.into()),
        }
    }

    /// Create a new precondition error
    pub fn precondition<S: Into<String>>(operation: S, status: impl std::fmt::Display) -> Self {
        Self::Precondition {
            operation: operation.into(),
            status: status.to_string(),
        }
    }

    /// Create a new analytics error
    pub fn analytics<S: Into<String>>(message: S) -> Self {
        Self::Analytics {
            message: message.into(),
            sink: None,
            source: None,
        }
    }

    /// Create a new replay error
    pub fn replay<S: Into<String>>(step: usize, message: S) -> Self {
        Self::Replay {
            message: message.into(),
            step,
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            component: None,
            source: None,
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S, operation: S, duration_ms: u64) -> Self {
        Self::Timeout {
            message: message.into(),
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Attach the sink name to an analytics error
    #[must_use]
    pub fn with_sink<S: Into<String>>(mut self, name: S) -> Self {
        if let Self::Analytics { sink, .. } = &mut self {
            *sink = Some(name.into());
        }
        self
    }

    /// Get the error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } => ErrorKind::Configuration,
            Self::Precondition { .. } | Self::Replay { .. } => ErrorKind::Usage,
            Self::Analytics { .. } => ErrorKind::Integration,
            Self::Timeout { .. } => ErrorKind::Performance,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Internal { .. } => ErrorKind::System,
        }
    }

    /// Analytics delivery is best effort, so only sink errors may be dropped silently
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::Analytics { .. })
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("JSON serialization error: {err}"))
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::validation(format!("YAML parsing error: {err}"))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("TOML parsing error: {err}"))
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        Self::internal(format!("TOML serialization error: {err}"))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::config(format!("Configuration source error: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("IO error: {err}"))
    }
}

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::timeout("Operation timed out".to_string(), "unknown".to_string(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = AppError::config("Test configuration error");
        assert!(matches!(error, AppError::Config { .. }));
        assert_eq!(error.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_precondition_message() {
        let error = AppError::precondition("handle_disconnect", "disconnected");
        assert_eq!(
            error.to_string(),
            "Precondition failed: handle_disconnect is not allowed while disconnected"
        );
        assert_eq!(error.kind(), ErrorKind::Usage);
        assert!(!error.is_ignorable());
    }

    #[test]
    fn test_analytics_errors_are_ignorable() {
        let error = AppError::analytics("delivery failed").with_sink("channel");
        assert!(error.is_ignorable());
        assert_eq!(error.kind(), ErrorKind::Integration);
        assert!(!AppError::internal("boom").is_ignorable());
    }
}
