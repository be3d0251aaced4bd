//! Type definitions for Token API providers
//!
//! Shared request/response contracts: chain families, bound query parameters,
//! the success/failure usage envelope and the health report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ErrorKind, TokenApiError};

/// A result row: column name -> JSON value
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Bound query parameters, keyed by placeholder name
pub type BoundParameters = BTreeMap<String, ParamValue>;

/// Blockchain family a network belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// EVM-compatible chains (Ethereum, Base, BSC, Arbitrum, ...)
    Evm,
    /// Solana Virtual Machine
    Svm,
    /// Tron Virtual Machine
    Tvm,
}

impl ChainType {
    /// All supported chain families
    pub const ALL: [ChainType; 3] = [ChainType::Evm, ChainType::Svm, ChainType::Tvm];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainType::Evm => "evm",
            ChainType::Svm => "svm",
            ChainType::Tvm => "tvm",
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainType {
    type Err = TokenApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "evm" => Ok(ChainType::Evm),
            "svm" => Ok(ChainType::Svm),
            "tvm" => Ok(ChainType::Tvm),
            other => Err(TokenApiError::UnknownChainType(other.to_string())),
        }
    }
}

/// A value bound to a query placeholder.
///
/// Only these four shapes are accepted. JSON `null`, objects and arrays of
/// non-strings fail to deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    StringList(Vec<String>),
}

impl ParamValue {
    /// Human readable shape name, used in binding error messages
    pub fn shape(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "boolean",
            ParamValue::Number(_) => "number",
            ParamValue::String(_) => "string",
            ParamValue::StringList(_) => "string list",
        }
    }

    /// Interpret the value as an unsigned integer (numbers and numeric strings)
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            ParamValue::Number(n) => n.as_u64(),
            ParamValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::StringList(value)
    }
}

/// Strip surrounding whitespace and a `0x` prefix, then lowercase.
///
/// This is the key form used by the symbol patch table and the bound form of
/// EVM address parameters.
pub fn normalize_address(address: &str) -> String {
    let trimmed = address.trim();
    let stripped = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    stripped.to_ascii_lowercase()
}

/// Database-side execution statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryStatistics {
    /// Server-side elapsed seconds
    #[serde(default)]
    pub elapsed: f64,
    /// Rows scanned
    #[serde(default)]
    pub rows_read: u64,
    /// Bytes scanned
    #[serde(default)]
    pub bytes_read: u64,
}

impl QueryStatistics {
    /// Add another statement's statistics to this one
    pub fn accumulate(&mut self, other: &QueryStatistics) {
        self.elapsed += other.elapsed;
        self.rows_read += other.rows_read;
        self.bytes_read += other.bytes_read;
    }
}

/// Page cursor attached to paginated responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub previous_page: u64,
    pub current_page: u64,
}

impl Pagination {
    pub fn for_page(page: u64) -> Self {
        Self {
            previous_page: page.saturating_sub(1).max(1),
            current_page: page,
        }
    }
}

/// Successful query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSuccess {
    /// Result rows, in template submission order
    pub data: Vec<Row>,
    /// Summed database statistics
    pub statistics: QueryStatistics,
    /// Number of rows returned
    pub rows: usize,
    /// Wall-clock time spent in the executor
    pub duration_ms: u64,
    /// Page cursor, when the request was paginated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl UsageSuccess {
    pub fn new(data: Vec<Row>, statistics: QueryStatistics, elapsed: Duration) -> Self {
        Self {
            rows: data.len(),
            data,
            statistics,
            duration_ms: elapsed.as_millis() as u64,
            pagination: None,
        }
    }
}

/// Classified failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageFailure {
    /// HTTP status associated with `kind`
    pub status: u16,
    /// Stable failure kind
    #[serde(rename = "code")]
    pub kind: ErrorKind,
    /// Human readable summary
    pub message: String,
    /// Diagnostic detail (never contains credentials)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl UsageFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            status: kind.status(),
            kind,
            message: message.into(),
            detail,
        }
    }

    /// Replace every occurrence of `secret` in the message and detail
    pub fn redact(mut self, secret: &str) -> Self {
        if secret.is_empty() {
            return self;
        }
        self.message = self.message.replace(secret, "[REDACTED]");
        self.detail = self.detail.map(|d| d.replace(secret, "[REDACTED]"));
        self
    }
}

/// The single return contract of query execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UsageResponse {
    Success(UsageSuccess),
    Failure(UsageFailure),
}

impl UsageResponse {
    /// Build a failure response
    pub fn failure(kind: ErrorKind, message: impl Into<String>, detail: Option<String>) -> Self {
        UsageResponse::Failure(UsageFailure::new(kind, message, detail))
    }

    /// A success carrying no rows
    pub fn empty() -> Self {
        UsageResponse::Success(UsageSuccess::new(
            Vec::new(),
            QueryStatistics::default(),
            Duration::ZERO,
        ))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UsageResponse::Success(_))
    }

    /// HTTP status the transport layer should answer with
    pub fn status(&self) -> u16 {
        match self {
            UsageResponse::Success(_) => 200,
            UsageResponse::Failure(failure) => failure.status,
        }
    }

    pub fn as_success(&self) -> Option<&UsageSuccess> {
        match self {
            UsageResponse::Success(success) => Some(success),
            UsageResponse::Failure(_) => None,
        }
    }

    pub fn as_failure(&self) -> Option<&UsageFailure> {
        match self {
            UsageResponse::Success(_) => None,
            UsageResponse::Failure(failure) => Some(failure),
        }
    }

    /// Mutable access to the rows of a success; `None` for failures
    pub fn rows_mut(&mut self) -> Option<&mut Vec<Row>> {
        match self {
            UsageResponse::Success(success) => Some(&mut success.data),
            UsageResponse::Failure(_) => None,
        }
    }
}

impl From<UsageFailure> for UsageResponse {
    fn from(failure: UsageFailure) -> Self {
        UsageResponse::Failure(failure)
    }
}

/// Overall health of the configured database targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Every probe succeeded
    Healthy,
    /// Some probes failed, at least one succeeded
    Degraded,
    /// Every probe failed
    Unhealthy,
}

impl HealthState {
    /// Reduce probe counts into an overall state
    pub fn from_probe_counts(succeeded: usize, failed: usize) -> Self {
        if failed == 0 {
            HealthState::Healthy
        } else if succeeded > 0 {
            HealthState::Degraded
        } else {
            HealthState::Unhealthy
        }
    }
}

/// Probe outcome for one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkHealth {
    pub network_id: String,
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Aggregated health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    pub status: HealthState,
    pub checked_at: DateTime<Utc>,
    /// Per-network outcomes, ordered by network id
    pub networks: Vec<NetworkHealth>,
}

impl HealthResult {
    pub fn new(status: HealthState, networks: Vec<NetworkHealth>) -> Self {
        Self {
            status,
            checked_at: Utc::now(),
            networks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chain_type_parse() {
        assert_eq!("evm".parse::<ChainType>().unwrap(), ChainType::Evm);
        assert_eq!(" SVM ".parse::<ChainType>().unwrap(), ChainType::Svm);
        assert_eq!("tvm".parse::<ChainType>().unwrap(), ChainType::Tvm);
        assert!("utxo".parse::<ChainType>().is_err());
    }

    #[test]
    fn test_param_value_shapes() {
        let params: BoundParameters = serde_json::from_value(json!({
            "address": "0xabc",
            "limit": 10,
            "include_zero": false,
            "contracts": ["0x1", "0x2"]
        }))
        .unwrap();

        assert_eq!(params["address"], ParamValue::from("0xabc"));
        assert_eq!(params["limit"].as_u64(), Some(10));
        assert_eq!(params["include_zero"], ParamValue::Bool(false));
        assert_eq!(params["contracts"].shape(), "string list");
    }

    #[test]
    fn test_param_value_rejects_null_and_objects() {
        assert!(serde_json::from_value::<ParamValue>(json!(null)).is_err());
        assert!(serde_json::from_value::<ParamValue>(json!({"a": 1})).is_err());
        assert!(serde_json::from_value::<ParamValue>(json!([1, 2])).is_err());
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address(" 0x95222290DD7278Aa3Ddd389Cc1E1d165CC4BAfe5 "),
            "95222290dd7278aa3ddd389cc1e1d165cc4bafe5"
        );
        assert_eq!(normalize_address("0XABC"), "abc");
        assert_eq!(normalize_address("abc"), "abc");
    }

    #[test]
    fn test_pagination_for_page() {
        assert_eq!(Pagination::for_page(1).previous_page, 1);
        assert_eq!(Pagination::for_page(3).previous_page, 2);
        assert_eq!(Pagination::for_page(3).current_page, 3);
    }

    #[test]
    fn test_health_state_reduction() {
        assert_eq!(HealthState::from_probe_counts(3, 0), HealthState::Healthy);
        assert_eq!(HealthState::from_probe_counts(2, 1), HealthState::Degraded);
        assert_eq!(HealthState::from_probe_counts(0, 3), HealthState::Unhealthy);
        assert_eq!(HealthState::from_probe_counts(0, 0), HealthState::Healthy);
    }

    #[test]
    fn test_failure_envelope_wire_format() {
        let response = UsageResponse::failure(
            ErrorKind::ConnectionRefused,
            "Database connection refused",
            Some("connect error".to_string()),
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status"], 502);
        assert_eq!(value["code"], "connection_refused");
        assert_eq!(value["message"], "Database connection refused");
        assert_eq!(response.status(), 502);
    }

    #[test]
    fn test_success_envelope_deserializes_as_success() {
        let value = json!({
            "data": [{"symbol": "ETH"}],
            "statistics": {"elapsed": 0.1, "rows_read": 5, "bytes_read": 100},
            "rows": 1,
            "duration_ms": 12
        });
        let response: UsageResponse = serde_json::from_value(value).unwrap();
        assert!(response.is_success());
        assert_eq!(response.as_success().unwrap().rows, 1);
    }

    #[test]
    fn test_redact_removes_secret() {
        let failure = UsageFailure::new(
            ErrorKind::AuthenticationFailed,
            "Database authentication failed",
            Some("password hunter2 is incorrect".to_string()),
        )
        .redact("hunter2");
        assert_eq!(
            failure.detail.as_deref(),
            Some("password [REDACTED] is incorrect")
        );
    }
}
