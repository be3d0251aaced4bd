//! Database client seam
//!
//! The executor and the health aggregator talk to ClickHouse only through
//! [`DatabaseClient`], so tests can substitute an in-memory client.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use token_api_common::{BoundParameters, DatabaseTarget, QueryStatistics, Row};

/// Low-level failure raised by a database client, before classification
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RawDbError {
    /// The database answered with a structured error
    #[error("Database error (code {code:?}, HTTP {status}): {message}")]
    Backend {
        /// ClickHouse exception code, when one could be read
        code: Option<u32>,
        /// HTTP status of the response
        status: u16,
        message: String,
    },

    /// The database could not be reached
    #[error("Connection failed: {message}")]
    Connect { message: String },

    /// The statement did not complete in time
    #[error("Query timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A parameter could not be bound to a placeholder
    #[error("Parameter binding failed: {message}")]
    Binding { message: String },

    /// The response body could not be decoded
    #[error("Undecodable database response: {message}")]
    Decode { message: String },

    /// The requested network is not configured for the chain type
    #[error("Unknown network: {network_id}")]
    UnknownNetwork { network_id: String },

    /// Anything else
    #[error("{message}")]
    Other { message: String },
}

/// Rows and statistics of one executed statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub statistics: QueryStatistics,
}

/// Per-statement execution options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Upper bound for a single statement
    pub timeout: Duration,
    /// Row cap enforced by the database
    pub max_rows: Option<u64>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_rows: None,
        }
    }
}

/// Executes statements against a database target
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Run one parameterized statement and return its rows
    async fn query(
        &self,
        target: &DatabaseTarget,
        sql: &str,
        params: &BoundParameters,
        options: &QueryOptions,
    ) -> Result<QueryOutput, RawDbError>;

    /// Cheap liveness probe (`SELECT 1`)
    async fn ping(&self, target: &DatabaseTarget) -> Result<(), RawDbError>;
}
