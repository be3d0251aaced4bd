//! wasmCloud provider implementation for the Token API query pipeline
//!
//! Implements the wasmCloud provider lifecycle.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use wasmcloud_provider_sdk::Provider;

use token_api_common::{HealthState, TokenApiConfig};

use crate::nats_listener::{NatsQueryListener, NatsQueryListenerConfig};
use crate::service::QueryService;

/// Token API Query Provider
#[derive(Clone)]
pub struct TokenApiQueryProvider {
    service: Arc<QueryService>,
    nats_config: NatsQueryListenerConfig,
}

impl TokenApiQueryProvider {
    /// Create the provider with configuration from wasmCloud HostData.
    ///
    /// An empty map means "not running under a host": configuration is read
    /// from the environment instead.
    #[instrument(skip(config))]
    pub fn with_config(config: HashMap<String, String>) -> Result<Self> {
        info!("Creating Token API Query Provider with config from HostData");

        let token_api_config = if !config.is_empty() {
            TokenApiConfig::from_properties(&config)?
        } else {
            TokenApiConfig::from_env()?
        };
        info!("Configuration: {:?}", token_api_config);

        let nats_config = if !config.is_empty() {
            NatsQueryListenerConfig::from_properties(&config)
        } else {
            NatsQueryListenerConfig::from_env()
        };

        let service = Arc::new(QueryService::new(&token_api_config)?);
        info!(
            "Query service ready with {} networks",
            service.networks().len()
        );

        Ok(Self {
            service,
            nats_config,
        })
    }

    /// Create the provider from environment variables
    #[instrument]
    pub fn new() -> Result<Self> {
        Self::with_config(HashMap::new())
    }

    pub fn service(&self) -> Arc<QueryService> {
        Arc::clone(&self.service)
    }

    /// Start the provider
    #[instrument(skip(self))]
    pub async fn start(self: Arc<Self>) -> Result<()> {
        info!("Starting Token API Query Provider");

        // Unreachable databases are reported, not fatal: health replies carry the detail
        let health = self.service.health(false).await;
        match health.status {
            HealthState::Healthy => info!("All database targets reachable"),
            state => warn!(
                "Database targets {:?} at start-up: {} networks checked",
                state,
                health.networks.len()
            ),
        }

        let listener = NatsQueryListener::new(self.nats_config.clone(), self.service());

        // This blocks until NATS connection is lost
        listener.start().await?;

        info!("Token API Query Provider stopped");
        Ok(())
    }
}

impl Provider for TokenApiQueryProvider {}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmcloud_provider_sdk::Provider;

    #[test]
    fn test_provider_traits() {
        fn assert_provider<T: Provider + Clone>() {}
        assert_provider::<TokenApiQueryProvider>();
    }

    #[test]
    fn test_with_properties() {
        let mut props = HashMap::new();
        props.insert(
            "clickhouse_url".to_string(),
            "http://clickhouse.ekko.svc:8123".to_string(),
        );
        props.insert("nats_url".to_string(), "nats://nats:4222".to_string());

        let provider = TokenApiQueryProvider::with_config(props).unwrap();
        assert_eq!(provider.nats_config.nats_url, "nats://nats:4222");
        let mainnet = provider.service().networks().lookup("eth-mainnet").cloned();
        assert_eq!(
            mainnet.map(|n| n.target.url),
            Some("http://clickhouse.ekko.svc:8123".to_string())
        );
    }
}
