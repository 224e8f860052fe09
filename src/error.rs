//! Unified error types for the PulseNode firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! startup path and the supervisor's error handling uniform.  Transient
//! link failures never show up here: the connection manager absorbs them
//! and only surfaces [`CommsError::RetriesExhausted`].

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fatal operation in the firmware funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Configuration is missing, unparsable, or out of range.
    Config(ConfigError),
    /// A communication subsystem gave up.
    Comms(CommsError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while populating [`SystemConfig`](crate::config::SystemConfig).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required setting was not provided.  Carries the setting key.
    Missing(&'static str),
    /// A setting could not be converted to its target type.
    Invalid(&'static str),
    /// A setting parsed but is outside its permitted range.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "required setting '{key}' is missing"),
            Self::Invalid(key) => write!(f, "setting '{key}' has an invalid value"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// Network link (WiFi) association failed.
    LinkConnectFailed,
    /// Broker handshake could not be started.
    HandshakeFailed,
    /// The reconnect loop hit its consecutive-failure ceiling.
    RetriesExhausted,
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkConnectFailed => write!(f, "network link connect failed"),
            Self::HandshakeFailed => write!(f, "broker handshake failed"),
            Self::RetriesExhausted => write!(f, "reconnect attempts exhausted"),
        }
    }
}

impl std::error::Error for CommsError {}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
