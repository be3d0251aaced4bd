//! Query service
//!
//! The entry point route handlers and the NATS ingress call. Wires the
//! network registry, the template registry, parameter normalization, the
//! executor and enrichment into one request -> envelope operation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use token_api_common::{
    normalize_address, BoundParameters, ChainType, HealthResult, NetworkRegistry, Pagination,
    ParamValue, QueryTemplateRegistry, TokenApiConfig, UsageResponse, UsageSuccess,
};

use crate::classifier::classify;
use crate::clickhouse::ClickHouseHttpClient;
use crate::client::{DatabaseClient, QueryOptions, RawDbError};
use crate::enrichment::Enrichment;
use crate::executor::QueryExecutor;
use crate::health::HealthAggregator;

/// Parameters holding addresses, normalized before binding
pub const ADDRESS_PARAMS: [&str; 7] = ["address", "contract", "owner", "token", "pool", "from", "to"];

pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 1000;

/// A logical query against one network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query keys to run, in order (e.g. `["balances", "balances_native"]`)
    pub query_keys: Vec<String>,
    pub chain_type: ChainType,
    pub network_id: String,
    #[serde(default)]
    pub params: BoundParameters,
}

/// Orchestrates query execution and health reporting
#[derive(Clone)]
pub struct QueryService {
    networks: Arc<NetworkRegistry>,
    templates: Arc<QueryTemplateRegistry>,
    executor: QueryExecutor,
    enrichment: Enrichment,
    health: HealthAggregator,
    options: QueryOptions,
}

impl QueryService {
    /// Build the service against ClickHouse from configuration
    pub fn new(config: &TokenApiConfig) -> Result<Self> {
        let client = ClickHouseHttpClient::new()?;
        let networks =
            NetworkRegistry::from_config(config).context("Failed to load network registry")?;
        let enrichment =
            Enrichment::from_config(config).context("Failed to load enrichment tables")?;

        Ok(Self::from_parts(
            config,
            Arc::new(client),
            networks,
            QueryTemplateRegistry::builtin(),
            enrichment,
        ))
    }

    /// Assemble the service from already-built parts
    pub fn from_parts(
        config: &TokenApiConfig,
        client: Arc<dyn DatabaseClient>,
        networks: NetworkRegistry,
        templates: QueryTemplateRegistry,
        enrichment: Enrichment,
    ) -> Self {
        let networks = Arc::new(networks);
        let health = HealthAggregator::new(
            Arc::clone(&client),
            Arc::clone(&networks),
            config.health_probe_timeout(),
            config.health_max_concurrency,
        );

        Self {
            networks,
            templates: Arc::new(templates),
            executor: QueryExecutor::new(client),
            enrichment,
            health,
            options: QueryOptions {
                timeout: config.query_timeout(),
                max_rows: config.max_result_rows,
            },
        }
    }

    pub fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    /// Run a logical query and return the enriched envelope
    #[instrument(skip(self, request), fields(network = %request.network_id, chain_type = %request.chain_type))]
    pub async fn query(&self, request: &QueryRequest) -> UsageResponse {
        let network = match self.networks.lookup(&request.network_id) {
            Some(network) if network.chain_type == request.chain_type => network,
            _ => {
                info!("Unknown network {} for {}", request.network_id, request.chain_type);
                return classify(&RawDbError::UnknownNetwork {
                    network_id: request.network_id.clone(),
                })
                .into();
            }
        };

        let templates: Vec<&str> = self
            .templates
            .resolve_all(&request.query_keys, request.chain_type)
            .into_iter()
            .flatten()
            .collect();
        if templates.is_empty() {
            debug!(
                "None of {:?} supported on {}; returning empty result",
                request.query_keys, request.chain_type
            );
            return UsageResponse::empty();
        }

        let (params, page) = match normalize_params(&request.params, request.chain_type) {
            Ok(normalized) => normalized,
            Err(err) => return classify(&err).into(),
        };

        let mut response = self
            .executor
            .execute(&network.target, &templates, &params, &self.options)
            .await;

        self.enrichment.apply(&mut response, &network.id);
        if let UsageResponse::Success(UsageSuccess { pagination, .. }) = &mut response {
            *pagination = Some(Pagination::for_page(page));
        }
        response
    }

    /// Aggregate liveness across every configured database target
    pub async fn health(&self, skip_endpoints: bool) -> HealthResult {
        self.health.evaluate(skip_endpoints).await
    }
}

/// Normalize address parameters and resolve pagination into `limit`/`offset`.
/// Returns the bound parameters and the requested page.
pub fn normalize_params(
    params: &BoundParameters,
    chain_type: ChainType,
) -> Result<(BoundParameters, u64), RawDbError> {
    let mut bound = BoundParameters::new();

    for (name, value) in params {
        let value = if ADDRESS_PARAMS.contains(&name.as_str()) {
            normalize_address_value(value, chain_type)
        } else {
            value.clone()
        };
        bound.insert(name.clone(), value);
    }

    let limit = pagination_value(bound.remove("limit"), "limit", DEFAULT_LIMIT)?;
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(RawDbError::Binding {
            message: format!("Parameter 'limit' must be between 1 and {}", MAX_LIMIT),
        });
    }
    let page = pagination_value(bound.remove("page"), "page", 1)?;
    if page == 0 {
        return Err(RawDbError::Binding {
            message: "Parameter 'page' must be at least 1".to_string(),
        });
    }
    let offset = (page - 1).checked_mul(limit).ok_or_else(|| RawDbError::Binding {
        message: "Parameter 'page' is too large".to_string(),
    })?;

    bound.insert("limit".to_string(), ParamValue::from(limit));
    bound.insert("offset".to_string(), ParamValue::from(offset));
    Ok((bound, page))
}

fn normalize_address_value(value: &ParamValue, chain_type: ChainType) -> ParamValue {
    let normalize = |s: &str| match chain_type {
        ChainType::Evm => normalize_address(s),
        ChainType::Svm | ChainType::Tvm => s.trim().to_string(),
    };
    match value {
        ParamValue::String(s) => ParamValue::String(normalize(s)),
        ParamValue::StringList(items) => {
            ParamValue::StringList(items.iter().map(|s| normalize(s)).collect())
        }
        other => other.clone(),
    }
}

fn pagination_value(value: Option<ParamValue>, name: &str, default: u64) -> Result<u64, RawDbError> {
    match value {
        None => Ok(default),
        Some(value) => value.as_u64().ok_or_else(|| RawDbError::Binding {
            message: format!(
                "Parameter '{}' must be a positive integer, got {}",
                name,
                value.shape()
            ),
        }),
    }
}
