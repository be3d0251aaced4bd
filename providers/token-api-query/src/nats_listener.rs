//! NATS listener for Token API queries and health checks
//!
//! Listens to:
//! - `tokenapi.*.*.query` - logical query execution
//! - `tokenapi.health` - health aggregation
//!
//! Every request with a reply subject gets a JSON reply; malformed subjects
//! or payloads are answered with a `bad_request` envelope.

use anyhow::{Context, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use token_api_common::subject_parser::{SubjectInfo, SUBJECT_PREFIX};
use token_api_common::{BoundParameters, ErrorKind, HealthResult, UsageFailure, UsageResponse};

use crate::service::{QueryRequest, QueryService};

/// Query payload carried on `tokenapi.{chain}.{network}.query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPayload {
    pub query_keys: Vec<String>,
    #[serde(default)]
    pub params: BoundParameters,
}

/// Health payload carried on `tokenapi.health` (may be empty)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthPayload {
    #[serde(default)]
    pub skip_endpoints: bool,
}

/// NATS listener configuration
#[derive(Debug, Clone)]
pub struct NatsQueryListenerConfig {
    /// NATS server URL
    pub nats_url: String,
    /// Subject pattern for queries
    pub query_subject_pattern: String,
    /// Subject for health requests
    pub health_subject: String,
}

impl Default for NatsQueryListenerConfig {
    fn default() -> Self {
        Self {
            nats_url: "nats://localhost:4222".to_string(),
            query_subject_pattern: SubjectInfo::subscription_pattern_all_queries(),
            health_subject: format!("{}.health", SUBJECT_PREFIX),
        }
    }
}

impl NatsQueryListenerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            nats_url: std::env::var("NATS_URL").unwrap_or(defaults.nats_url),
            query_subject_pattern: std::env::var("TOKEN_API_QUERY_SUBJECT")
                .unwrap_or(defaults.query_subject_pattern),
            health_subject: std::env::var("TOKEN_API_HEALTH_SUBJECT")
                .unwrap_or(defaults.health_subject),
        }
    }

    /// Load configuration from wasmCloud HostData properties.
    pub fn from_properties(props: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let nats_url = props
            .get("nats_url")
            .or_else(|| props.get("NATS_URL"))
            .cloned()
            .unwrap_or(defaults.nats_url);

        let query_subject_pattern = props
            .get("query_subject")
            .or_else(|| props.get("TOKEN_API_QUERY_SUBJECT"))
            .cloned()
            .unwrap_or(defaults.query_subject_pattern);

        let health_subject = props
            .get("health_subject")
            .or_else(|| props.get("TOKEN_API_HEALTH_SUBJECT"))
            .cloned()
            .unwrap_or(defaults.health_subject);

        Self {
            nats_url,
            query_subject_pattern,
            health_subject,
        }
    }
}

/// NATS listener dispatching to the query service
#[derive(Clone)]
pub struct NatsQueryListener {
    config: NatsQueryListenerConfig,
    service: Arc<QueryService>,
}

impl NatsQueryListener {
    pub fn new(config: NatsQueryListenerConfig, service: Arc<QueryService>) -> Self {
        Self { config, service }
    }

    /// Start listening for query and health requests
    #[instrument(skip(self))]
    pub async fn start(self) -> Result<()> {
        info!("Connecting to NATS at {}", self.config.nats_url);

        let client = async_nats::connect(&self.config.nats_url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        let mut query_subscriber = client
            .subscribe(self.config.query_subject_pattern.clone())
            .await
            .context("Failed to subscribe to query subject pattern")?;

        let mut health_subscriber = client
            .subscribe(self.config.health_subject.clone())
            .await
            .context("Failed to subscribe to health subject")?;

        info!("Token API Query Listener is ready");
        info!("  Query: {}", self.config.query_subject_pattern);
        info!("  Health: {}", self.config.health_subject);

        // Each request runs in its own task so a slow statement never holds up the loop
        loop {
            tokio::select! {
                Some(message) = query_subscriber.next() => {
                    let Some(reply_subject) = message.reply.clone() else {
                        debug!("Ignoring query on {} without reply subject", message.subject);
                        continue;
                    };
                    let listener = self.clone();
                    let client = client.clone();
                    tokio::spawn(async move {
                        let response = listener
                            .handle_query(message.subject.as_str(), &message.payload)
                            .await;
                        if let Err(e) = client.publish(reply_subject, reply_bytes(&response).into()).await {
                            error!("Failed to send query response: {}", e);
                        }
                    });
                }

                Some(message) = health_subscriber.next() => {
                    let Some(reply_subject) = message.reply.clone() else {
                        continue;
                    };
                    let listener = self.clone();
                    let client = client.clone();
                    tokio::spawn(async move {
                        let bytes = match listener.handle_health(&message.payload).await {
                            Ok(result) => reply_bytes(&result),
                            Err(failure) => reply_bytes(&failure),
                        };
                        if let Err(e) = client.publish(reply_subject, bytes.into()).await {
                            error!("Failed to send health response: {}", e);
                        }
                    });
                }

                else => {
                    warn!("All NATS subscriptions ended");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle one query message
    #[instrument(skip(self, payload), fields(subject = %subject))]
    pub async fn handle_query(&self, subject: &str, payload: &[u8]) -> UsageResponse {
        let info = match SubjectInfo::parse(subject) {
            Ok(info) => info,
            Err(e) => {
                warn!("Rejecting query on malformed subject: {}", e);
                return UsageResponse::failure(ErrorKind::BadRequest, e.to_string(), None);
            }
        };

        let payload: QueryPayload = match serde_json::from_slice(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Rejecting malformed query payload: {}", e);
                return UsageResponse::failure(
                    ErrorKind::BadRequest,
                    "Invalid query payload",
                    Some(e.to_string()),
                );
            }
        };

        let request = QueryRequest {
            query_keys: payload.query_keys,
            chain_type: info.chain_type,
            network_id: info.network_id,
            params: payload.params,
        };
        self.service.query(&request).await
    }

    /// Handle one health message; an empty payload probes every endpoint
    pub async fn handle_health(
        &self,
        payload: &[u8],
    ) -> std::result::Result<HealthResult, UsageFailure> {
        let request: HealthPayload = if payload.is_empty() {
            HealthPayload::default()
        } else {
            serde_json::from_slice(payload).map_err(|e| {
                UsageFailure::new(
                    ErrorKind::BadRequest,
                    "Invalid health payload",
                    Some(e.to_string()),
                )
            })?
        };

        Ok(self.service.health(request.skip_endpoints).await)
    }
}

fn reply_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_else(|e| {
        error!("Failed to serialize reply: {}", e);
        format!(
            r#"{{"status":500,"code":"{}","message":"Failed to serialize reply"}}"#,
            ErrorKind::BadDatabaseResponse
        )
        .into_bytes()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NatsQueryListenerConfig::default();
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.query_subject_pattern, "tokenapi.*.*.query");
        assert_eq!(config.health_subject, "tokenapi.health");
    }

    #[test]
    fn test_config_from_properties() {
        let mut props = HashMap::new();
        props.insert("nats_url".to_string(), "nats://nats.ekko.svc:4222".to_string());
        props.insert("query_subject".to_string(), "tokenapi.evm.*.query".to_string());

        let config = NatsQueryListenerConfig::from_properties(&props);
        assert_eq!(config.nats_url, "nats://nats.ekko.svc:4222");
        assert_eq!(config.query_subject_pattern, "tokenapi.evm.*.query");
        assert_eq!(config.health_subject, "tokenapi.health");
    }

    #[test]
    fn test_query_payload_parsing() {
        let payload: QueryPayload = serde_json::from_str(
            r#"{"query_keys": ["balances", "balances_native"], "params": {"address": "0xabc", "limit": 5}}"#,
        )
        .unwrap();
        assert_eq!(payload.query_keys, vec!["balances", "balances_native"]);
        assert_eq!(payload.params["limit"].as_u64(), Some(5));

        assert!(serde_json::from_str::<QueryPayload>(r#"{"query_keys": ["x"], "params": {"a": null}}"#).is_err());
    }

    #[test]
    fn test_health_payload_defaults() {
        let payload: HealthPayload = serde_json::from_str("{}").unwrap();
        assert!(!payload.skip_endpoints);
    }
}
