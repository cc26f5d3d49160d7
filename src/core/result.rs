//! Result type definitions and utilities for the application
//!
//! This module provides convenient result type aliases and utility functions
//! for working with results throughout the tracker.

use crate::core::error::AppError;

/// Application result type alias
///
/// This is the primary result type used throughout the crate.
///
/// # Examples
///
/// ```rust
/// use wallet_connection_tracker::core::result::AppResult;
/// use wallet_connection_tracker::core::error::AppError;
///
/// fn example_function() -> AppResult<String> {
///     Ok("Success".to_string())
/// }
///
/// fn failing_function() -> AppResult<()> {
///     Err(AppError::validation("Invalid input"))
/// }
/// ```
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Extension trait for `Result` to provide additional utility methods
pub trait ResultExt<T> {
    /// Map an error to a configuration error, keeping the original message
    fn map_config_err<F>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String;

    /// Map an error to an analytics error tagged with the sink name
    fn map_analytics_err<F>(self, sink: &str, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn map_config_err<F>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::config(format!("{}: {e}", f())))
    }

    fn map_analytics_err<F>(self, sink: &str, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::analytics(format!("{}: {e}", f())).with_sink(sink))
    }
}
