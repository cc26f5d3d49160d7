//! Input validation utilities and helpers
//!
//! This module provides validation functions for configuration values and
//! the external identifiers that flow through the tracker.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for validating identifiers such as environment names
static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.:-]+$").expect("static regex is valid"));

/// Validate string length
pub fn validate_string_length(
    value: &str,
    min_length: Option<usize>,
    max_length: Option<usize>,
    field_name: &str,
) -> Result<()> {
    let len = value.len();

    if let Some(min) = min_length {
        if len < min {
            return Err(anyhow!(
                "{} too short: {} characters (minimum: {})",
                field_name,
                len,
                min
            ));
        }
    }

    if let Some(max) = max_length {
        if len > max {
            return Err(anyhow!(
                "{} too long: {} characters (maximum: {})",
                field_name,
                len,
                max
            ));
        }
    }

    Ok(())
}

/// Validate an identifier made of letters, digits and `_ . : -`
pub fn validate_identifier(value: &str, field_name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }

    if !IDENTIFIER_REGEX.is_match(value) {
        return Err(anyhow!(
            "{} must contain only letters, numbers, underscores, dots, colons, and hyphens",
            field_name
        ));
    }

    Ok(())
}

/// Configuration-specific validation
pub mod config {
    use super::*;

    /// Validate log level
    pub fn validate_log_level(level: &str) -> Result<()> {
        match level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(anyhow!(
                "Invalid log level: {}. Must be 'trace', 'debug', 'info', 'warn', or 'error'",
                level
            )),
        }
    }

    /// Validate log format
    pub fn validate_log_format(format: &str) -> Result<()> {
        match format {
            "json" | "pretty" | "compact" => Ok(()),
            _ => Err(anyhow!(
                "Invalid log format '{}'. Must be 'json', 'pretty', or 'compact'",
                format
            )),
        }
    }

    /// Validate environment name
    pub fn validate_environment(env: &str) -> Result<()> {
        validate_identifier(env, "Environment")?;
        validate_string_length(env, Some(1), Some(50), "Environment")?;
        Ok(())
    }
}

/// Correlation identifier validation
pub mod session {
    use super::*;

    /// Validate an externally issued session or user id.
    ///
    /// Ids are opaque to the tracker (emails, base64 tokens), so only empty
    /// values are rejected.
    pub fn validate_correlation_id(value: &str, field_name: &str) -> Result<()> {
        if value.is_empty() {
            return Err(anyhow!("{} cannot be empty", field_name));
        }
        Ok(())
    }
}
