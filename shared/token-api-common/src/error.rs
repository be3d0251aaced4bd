//! Error types for Token API providers

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Externally visible failure kinds.
///
/// This set is closed: every failure that reaches a response envelope carries
/// exactly one of these kinds, and each kind maps to one HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A bound parameter failed type/shape validation
    BadRequest,
    /// The requested network id is not configured (or belongs to another chain type)
    UnknownNetwork,
    /// The database rejected our credentials or denied access
    AuthenticationFailed,
    /// The database could not be reached
    ConnectionRefused,
    /// The database answered with an error or an unreadable payload
    BadDatabaseResponse,
}

impl ErrorKind {
    /// HTTP status code associated with this kind
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::UnknownNetwork => 404,
            ErrorKind::AuthenticationFailed => 403,
            ErrorKind::ConnectionRefused => 502,
            ErrorKind::BadDatabaseResponse => 500,
        }
    }

    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::UnknownNetwork => "unknown_network",
            ErrorKind::AuthenticationFailed => "authentication_failed",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::BadDatabaseResponse => "bad_database_response",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token API configuration and registry errors
#[derive(Error, Debug)]
pub enum TokenApiError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Two networks declared with the same id
    #[error("Duplicate network id: {0}")]
    DuplicateNetwork(String),

    /// Chain type name not recognised
    #[error("Unknown chain type: {0}")]
    UnknownChainType(String),

    /// Query template could not be parsed
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Enrichment table could not be loaded
    #[error("Table load error: {0}")]
    TableLoadError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Filesystem error
    #[error("IO error: {0}")]
    IoError(String),
}

impl From<serde_json::Error> for TokenApiError {
    fn from(err: serde_json::Error) -> Self {
        TokenApiError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for TokenApiError {
    fn from(err: std::io::Error) -> Self {
        TokenApiError::IoError(err.to_string())
    }
}

impl From<anyhow::Error> for TokenApiError {
    fn from(err: anyhow::Error) -> Self {
        TokenApiError::ConfigError(err.to_string())
    }
}

impl From<std::env::VarError> for TokenApiError {
    fn from(err: std::env::VarError) -> Self {
        TokenApiError::ConfigError(err.to_string())
    }
}
