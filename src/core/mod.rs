//! Core domain layer containing value objects, errors, and domain rules
//!
//! This module defines the fundamental building blocks of the wallet
//! connection tracker: error types, result definitions, common types, and
//! the domain constants the tracker is parameterised with.
//!
//! # Design Principles
//!
//! 1. **Independence**: Core domain does not depend on transports or sinks
//! 2. **Type Safety**: Strong types for addresses, timestamps and attempt ids
//! 3. **Descriptive errors**: Connection failures are data, not control flow

pub mod error;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ErrorKind};
pub use result::AppResult;
pub use types::*;

/// Domain constants and rules
pub mod domain {
    /// Connection tracking rules
    pub mod tracking {
        /// Default number of attempts kept in the connection history
        pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

        /// Upper bound accepted for a configured history capacity
        pub const MAX_HISTORY_CAPACITY: usize = 10_000;

        /// Success rate is reported as a percentage
        pub const MAX_SUCCESS_RATE: f64 = 100.0;
    }

    /// Analytics delivery rules
    pub mod analytics {
        /// Default bounded queue size of the channel sink
        pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

        /// Default Prometheus exporter port
        pub const DEFAULT_METRICS_PORT: u16 = 9090;
    }
}

/// Domain validation rules and helpers
pub mod validation {
    use super::error::AppError;
    use once_cell::sync::Lazy;
    use regex::Regex;

    static EVM_ADDRESS_REGEX: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("static regex is valid"));

    /// Validate an EVM wallet address format
    pub fn validate_wallet_address(address: &str) -> Result<(), AppError> {
        if address.is_empty() {
            return Err(AppError::invalid_field("address", address, "Address cannot be empty"));
        }

        if !EVM_ADDRESS_REGEX.is_match(address) {
            return Err(AppError::invalid_field(
                "address",
                address,
                "Address must be 0x followed by 40 hex characters",
            ));
        }

        Ok(())
    }

    /// Validate a chain id (EIP-155 ids are positive)
    pub fn validate_chain_id(chain_id: u64) -> Result<(), AppError> {
        if chain_id == 0 {
            return Err(AppError::invalid_field("chain_id", "0", "Chain id must be positive"));
        }
        Ok(())
    }

    /// Validate a history capacity
    pub fn validate_history_capacity(capacity: usize) -> Result<(), AppError> {
        use super::domain::tracking::MAX_HISTORY_CAPACITY;

        if capacity == 0 || capacity > MAX_HISTORY_CAPACITY {
            return Err(AppError::invalid_field(
                "history_capacity",
                capacity.to_string(),
                "History capacity must be between 1 and 10000",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_constants() {
        assert_eq!(domain::tracking::DEFAULT_HISTORY_CAPACITY, 100);
        assert!(domain::tracking::MAX_HISTORY_CAPACITY > domain::tracking::DEFAULT_HISTORY_CAPACITY);
        assert!(domain::analytics::DEFAULT_CHANNEL_CAPACITY > 0);
    }

    #[test]
    fn test_validation_functions() {
        assert!(validation::validate_wallet_address("0x0000000000000000000000000000000000000001").is_ok());
        assert!(validation::validate_wallet_address("0xABC").is_err());
        assert!(validation::validate_wallet_address("").is_err());

        assert!(validation::validate_chain_id(1).is_ok());
        assert!(validation::validate_chain_id(0).is_err());

        assert!(validation::validate_history_capacity(100).is_ok());
        assert!(validation::validate_history_capacity(0).is_err());
        assert!(validation::validate_history_capacity(10_001).is_err());
    }
}
