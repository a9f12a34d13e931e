/// Error types for streamhub
///
/// Transport failures inside client tasks are not errors at this level:
/// they end the connection and are recorded as a `RemovalReason`.
use thiserror::Error;

use crate::webserver::ws::hub::{ClientId, HubState};

// =============================================================================
// HUB
// =============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("hub is not accepting clients (state: {0})")]
    NotRunning(HubState),

    #[error("hub dispatch loop already started")]
    AlreadyStarted,

    #[error("hub dispatch loop is not available")]
    DispatchUnavailable,

    #[error("client {0} was rejected by the hub")]
    Rejected(ClientId),
}

// =============================================================================
// ADMISSION
// =============================================================================

/// Reasons a connection is refused before the upgrade
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("missing API key")]
    MissingCredentials,

    #[error("invalid API key")]
    InvalidCredentials,

    #[error("authentication enabled but no API key configured")]
    AuthNotConfigured,

    #[error("origin not allowed: {0}")]
    OriginNotAllowed(String),
}

// =============================================================================
// CONFIGURATION
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config field '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

// =============================================================================
// SERVER
// =============================================================================

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address '{0}'")]
    InvalidAddress(String),

    #[error("failed to bind to {addr}: {message}")]
    Bind { addr: String, message: String },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
