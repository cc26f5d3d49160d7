//! Core type definitions and value objects for the domain model
//!
//! This module contains strongly-typed wrappers around primitive types
//! to ensure type safety and prevent invalid states in the domain model.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::core::error::AppError;

/// Unique identifier for a single connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub Uuid);

impl AttemptId {
    /// Create a new random attempt ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    pub fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AttemptId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// EVM wallet address (`0x` followed by 40 hex characters)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Create a new wallet address with validation
    pub fn new(address: impl Into<String>) -> Result<Self, AppError> {
        let address = address.into();
        crate::core::validation::validate_wallet_address(&address)?;
        Ok(Self(address))
    }

    /// Create without validation (use with caution)
    pub fn new_unchecked(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for display, e.g. `0x1234…abcd`
    pub fn short(&self) -> String {
        if self.0.len() <= 10 {
            return self.0.clone();
        }
        format!("{}…{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }

    /// Get the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Millisecond-precision timestamp since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Create a timestamp from Unix milliseconds
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    /// Unix milliseconds
    pub const fn as_millis(self) -> i64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, clamped at zero
    pub fn millis_since(self, earlier: Timestamp) -> u64 {
        u64::try_from(self.0.saturating_sub(earlier.0)).unwrap_or(0)
    }

    /// Timestamp shifted forward by `millis`
    #[must_use]
    pub fn add_millis(self, millis: u64) -> Self {
        Self(self.0.saturating_add(i64::try_from(millis).unwrap_or(i64::MAX)))
    }

    /// Convert to a chrono datetime, if representable
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.timestamp_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", crate::utils::time::format_iso(&dt)),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Kind of browser wallet used for a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    /// MetaMask injected provider
    Metamask,
    /// WalletConnect bridge
    WalletConnect,
    /// Coinbase Wallet
    Coinbase,
    /// Any other injected or embedded wallet
    Other,
}

impl WalletType {
    /// Stable identifier used in analytics payloads
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Metamask => "metamask",
            Self::WalletConnect => "wallet_connect",
            Self::Coinbase => "coinbase",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metamask" => Ok(Self::Metamask),
            "wallet_connect" | "walletconnect" | "wallet-connect" => Ok(Self::WalletConnect),
            "coinbase" | "coinbase_wallet" => Ok(Self::Coinbase),
            "other" => Ok(Self::Other),
            _ => Err(AppError::invalid_field("wallet_type", s, "Unknown wallet type")),
        }
    }
}

/// Lifecycle status of a wallet connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No wallet connected
    #[default]
    Disconnected,
    /// An attempt is in flight
    Connecting,
    /// A wallet is connected
    Connected,
    /// The last attempt failed
    Error,
}

impl ConnectionStatus {
    /// Stable identifier used in logs and reports
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a connection failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionErrorKind {
    /// The user or the provider rejected the request
    ProviderRejected,
    /// RPC or transport failure
    NetworkError,
    /// The wallet is on a chain the dashboard does not support
    UnsupportedChain,
    /// The attempt was never resolved
    Timeout,
    /// Anything else
    Other,
}

impl ConnectionErrorKind {
    /// Derive the kind from a provider error code.
    ///
    /// Codes follow EIP-1193 / JSON-RPC conventions; anything unrecognised is `Other`.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("4001" | "ACTION_REJECTED" | "rejected") => Self::ProviderRejected,
            Some("4901" | "4902" | "unsupported_chain") => Self::UnsupportedChain,
            Some("-32603" | "-32000" | "network" | "NETWORK_ERROR") => Self::NetworkError,
            Some("timeout" | "TIMEOUT") => Self::Timeout,
            _ => Self::Other,
        }
    }

    /// Stable identifier used in analytics payloads
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ProviderRejected => "provider_rejected",
            Self::NetworkError => "network_error",
            Self::UnsupportedChain => "unsupported_chain",
            Self::Timeout => "timeout",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ConnectionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive record of the last connection failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionError {
    /// Provider supplied message
    pub message: String,
    /// Provider supplied code, if any
    pub code: Option<String>,
    /// When the failure was recorded
    pub timestamp: Timestamp,
}

impl ConnectionError {
    /// Create a new connection error record
    pub fn new(message: impl Into<String>, code: Option<String>, timestamp: Timestamp) -> Self {
        Self {
            message: message.into(),
            code,
            timestamp,
        }
    }

    /// Classification derived from the code
    pub fn kind(&self) -> ConnectionErrorKind {
        ConnectionErrorKind::from_code(self.code.as_deref())
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} (code {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Correlation identifiers supplied by the identity integration alongside a wallet event
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluralityData {
    /// External session identifier
    pub session_id: Option<String>,
    /// External user identifier
    pub user_id: Option<String>,
}

impl PluralityData {
    /// Correlation data with a session id only
    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            user_id: None,
        }
    }

    /// Attach a user id
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Whether any identifier is present
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.user_id.is_none()
    }
}

/// Outcome of a tracker operation that may be skipped when its precondition does not hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The operation changed tracker state
    Applied,
    /// The operation was a no-op
    Ignored,
}

impl Transition {
    /// Whether state changed
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}
