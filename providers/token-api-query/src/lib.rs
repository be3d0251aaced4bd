//! Token API Query Provider
//!
//! wasmCloud capability provider running the Token API query pipeline:
//! template resolution, parameter binding, execution against the per-network
//! ClickHouse database, error classification, response enrichment and health
//! aggregation.
//!
//! This provider:
//! - Listens on NATS subjects: `tokenapi.{chain_type}.{network_id}.query`
//! - Answers health checks on `tokenapi.health`
//!
//! Configuration via HostData properties or `TOKEN_API_*` environment variables.

pub mod classifier;
pub mod clickhouse;
pub mod client;
pub mod enrichment;
pub mod executor;
pub mod health;
pub mod nats_listener;
pub mod provider;
pub mod service;

pub use classifier::{classify, classify_for_target};
pub use clickhouse::ClickHouseHttpClient;
pub use client::{DatabaseClient, QueryOptions, QueryOutput, RawDbError};
pub use enrichment::{Enrichment, IconTable, SymbolRecord, SymbolTable};
pub use executor::QueryExecutor;
pub use health::HealthAggregator;
pub use nats_listener::{NatsQueryListener, NatsQueryListenerConfig};
pub use provider::TokenApiQueryProvider;
pub use service::{QueryRequest, QueryService};

// Re-export common types
pub use token_api_common::{
    ChainType, DatabaseTarget, ErrorKind, HealthResult, HealthState, NetworkRegistry, ParamValue,
    QueryTemplateRegistry, TokenApiConfig, UsageFailure, UsageResponse, UsageSuccess,
};
