//! Error classifier
//!
//! Maps raw client failures onto the closed [`ErrorKind`] taxonomy. Every
//! input produces a failure; unrecognised errors fall back to
//! `bad_database_response` with the raw text kept as detail.

use token_api_common::{DatabaseTarget, ErrorKind, UsageFailure};

use crate::client::RawDbError;

/// ClickHouse exception codes that mean the credentials were rejected
pub const AUTHENTICATION_CODES: [u32; 4] = [
    516, // AUTHENTICATION_FAILED
    192, // UNKNOWN_USER
    193, // WRONG_PASSWORD
    497, // ACCESS_DENIED
];

/// Classify a raw failure
pub fn classify(err: &RawDbError) -> UsageFailure {
    match err {
        RawDbError::Backend {
            code,
            status,
            message,
        } => {
            if is_authentication_failure(*code, *status) {
                UsageFailure::new(
                    ErrorKind::AuthenticationFailed,
                    "Database authentication failed",
                    Some(message.clone()),
                )
            } else {
                UsageFailure::new(
                    ErrorKind::BadDatabaseResponse,
                    "Bad database response",
                    Some(message.clone()),
                )
            }
        }
        RawDbError::Connect { message } => UsageFailure::new(
            ErrorKind::ConnectionRefused,
            "Database connection refused",
            Some(message.clone()),
        ),
        RawDbError::Timeout { timeout_ms } => UsageFailure::new(
            ErrorKind::ConnectionRefused,
            "Database request timed out",
            Some(format!("no response within {}ms", timeout_ms)),
        ),
        RawDbError::Binding { message } => {
            UsageFailure::new(ErrorKind::BadRequest, message.clone(), None)
        }
        RawDbError::Decode { message } => UsageFailure::new(
            ErrorKind::BadDatabaseResponse,
            "Could not decode database response",
            Some(message.clone()),
        ),
        RawDbError::UnknownNetwork { network_id } => UsageFailure::new(
            ErrorKind::UnknownNetwork,
            format!("Unknown network: {}", network_id),
            None,
        ),
        RawDbError::Other { message } => UsageFailure::new(
            ErrorKind::BadDatabaseResponse,
            "Bad database response",
            Some(message.clone()),
        ),
    }
}

/// Classify a failure raised while talking to `target`, scrubbing its password
pub fn classify_for_target(err: &RawDbError, target: &DatabaseTarget) -> UsageFailure {
    classify(err).redact(&target.password)
}

fn is_authentication_failure(code: Option<u32>, status: u16) -> bool {
    match code {
        Some(code) => AUTHENTICATION_CODES.contains(&code),
        None => status == 401 || status == 403,
    }
}
