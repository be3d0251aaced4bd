//! Configuration for Token API providers
//!
//! One ClickHouse cluster serves every network; each network reads from its
//! own database on that cluster (`{network}:{chain suffix}` unless the
//! network list overrides it).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use url::Url;

use crate::types::ChainType;

/// Token API provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenApiConfig {
    // ClickHouse connection
    /// ClickHouse HTTP interface URL
    pub clickhouse_url: String,
    /// ClickHouse user
    pub clickhouse_username: String,
    /// ClickHouse password
    #[serde(skip_serializing)]
    pub clickhouse_password: String,

    // Network registry
    /// JSON network list; the embedded default list is used when unset
    pub networks_file: Option<String>,
    /// Database name suffix for EVM networks
    pub evm_db_suffix: String,
    /// Database name suffix for SVM networks
    pub svm_db_suffix: String,
    /// Database name suffix for TVM networks
    pub tvm_db_suffix: String,

    // Enrichment tables
    /// JSON symbol patch table; embedded default when unset
    pub symbols_file: Option<String>,
    /// JSON icon table; embedded default when unset
    pub icons_file: Option<String>,

    // Execution
    /// Per-statement timeout in seconds
    pub query_timeout_seconds: u64,
    /// Row cap applied by the database (`max_result_rows`)
    pub max_result_rows: Option<u64>,

    // Health
    /// Per-probe timeout in milliseconds
    pub health_probe_timeout_ms: u64,
    /// Maximum probes in flight
    pub health_max_concurrency: usize,

    /// Provider instance ID
    pub instance_id: String,
}

impl std::fmt::Debug for TokenApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenApiConfig")
            .field("clickhouse_url", &self.clickhouse_url)
            .field("clickhouse_username", &self.clickhouse_username)
            .field("networks_file", &self.networks_file)
            .field("evm_db_suffix", &self.evm_db_suffix)
            .field("svm_db_suffix", &self.svm_db_suffix)
            .field("tvm_db_suffix", &self.tvm_db_suffix)
            .field("symbols_file", &self.symbols_file)
            .field("icons_file", &self.icons_file)
            .field("query_timeout_seconds", &self.query_timeout_seconds)
            .field("max_result_rows", &self.max_result_rows)
            .field("health_probe_timeout_ms", &self.health_probe_timeout_ms)
            .field("health_max_concurrency", &self.health_max_concurrency)
            .field("instance_id", &self.instance_id)
            .finish_non_exhaustive()
    }
}

impl TokenApiConfig {
    /// Load configuration from wasmCloud properties HashMap
    ///
    /// Properties (from wasmCloud link config):
    /// - clickhouse_url, clickhouse_username, clickhouse_password
    /// - networks_file, evm_db_suffix, svm_db_suffix, tvm_db_suffix
    /// - symbols_file, icons_file
    /// - query_timeout_seconds, max_result_rows
    /// - health_probe_timeout_ms, health_max_concurrency
    /// - instance_id
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        Self::from_source(|key| props.get(key).cloned())
    }

    /// Load configuration from environment variables
    ///
    /// Same keys as [`TokenApiConfig::from_properties`], upper-cased and
    /// prefixed with `TOKEN_API_` (e.g. `TOKEN_API_CLICKHOUSE_URL`).
    pub fn from_env() -> Result<Self> {
        Self::from_source(|key| env::var(format!("TOKEN_API_{}", key.to_ascii_uppercase())).ok())
    }

    fn from_source(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let clickhouse_url = get("clickhouse_url").unwrap_or(defaults.clickhouse_url);
        let clickhouse_username =
            get("clickhouse_username").unwrap_or(defaults.clickhouse_username);
        let clickhouse_password =
            get("clickhouse_password").unwrap_or(defaults.clickhouse_password);

        let networks_file = get("networks_file").filter(|v| !v.trim().is_empty());
        let evm_db_suffix = get("evm_db_suffix").unwrap_or(defaults.evm_db_suffix);
        let svm_db_suffix = get("svm_db_suffix").unwrap_or(defaults.svm_db_suffix);
        let tvm_db_suffix = get("tvm_db_suffix").unwrap_or(defaults.tvm_db_suffix);

        let symbols_file = get("symbols_file").filter(|v| !v.trim().is_empty());
        let icons_file = get("icons_file").filter(|v| !v.trim().is_empty());

        let query_timeout_seconds = parse_or(
            get("query_timeout_seconds"),
            "query_timeout_seconds",
            defaults.query_timeout_seconds,
        )?;
        let max_result_rows = match get("max_result_rows") {
            Some(v) if !v.trim().is_empty() => Some(
                v.trim()
                    .parse()
                    .with_context(|| format!("Invalid max_result_rows: {}", v))?,
            ),
            _ => defaults.max_result_rows,
        };
        let health_probe_timeout_ms = parse_or(
            get("health_probe_timeout_ms"),
            "health_probe_timeout_ms",
            defaults.health_probe_timeout_ms,
        )?;
        let health_max_concurrency = parse_or(
            get("health_max_concurrency"),
            "health_max_concurrency",
            defaults.health_max_concurrency,
        )?;
        let instance_id = get("instance_id").unwrap_or(defaults.instance_id);

        let config = Self {
            clickhouse_url,
            clickhouse_username,
            clickhouse_password,
            networks_file,
            evm_db_suffix,
            svm_db_suffix,
            tvm_db_suffix,
            symbols_file,
            icons_file,
            query_timeout_seconds,
            max_result_rows,
            health_probe_timeout_ms,
            health_max_concurrency,
            instance_id,
        };
        config.validate()?;
        Ok(config)
    }

    /// Database suffix for a chain family
    pub fn db_suffix(&self, chain_type: ChainType) -> &str {
        match chain_type {
            ChainType::Evm => &self.evm_db_suffix,
            ChainType::Svm => &self.svm_db_suffix,
            ChainType::Tvm => &self.tvm_db_suffix,
        }
    }

    /// Default database name for a network
    pub fn database_name(&self, network_id: &str, chain_type: ChainType) -> String {
        format!("{}:{}", network_id, self.db_suffix(chain_type))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_seconds)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health_probe_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.clickhouse_url)
            .with_context(|| format!("Invalid ClickHouse URL: {}", self.clickhouse_url))?;

        if self.clickhouse_username.is_empty() {
            return Err(anyhow::anyhow!("ClickHouse username cannot be empty"));
        }
        for chain_type in ChainType::ALL {
            if self.db_suffix(chain_type).trim().is_empty() {
                return Err(anyhow::anyhow!(
                    "Database suffix for {} cannot be empty",
                    chain_type
                ));
            }
        }
        if self.query_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Query timeout must be greater than 0"));
        }
        if self.health_probe_timeout_ms == 0 {
            return Err(anyhow::anyhow!("Health probe timeout must be greater than 0"));
        }
        if self.health_max_concurrency == 0 {
            return Err(anyhow::anyhow!(
                "Health probe concurrency must be greater than 0"
            ));
        }

        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {}", key, v)),
        _ => Ok(default),
    }
}

impl Default for TokenApiConfig {
    fn default() -> Self {
        Self {
            clickhouse_url: "http://localhost:8123".to_string(),
            clickhouse_username: "default".to_string(),
            clickhouse_password: String::new(),
            networks_file: None,
            evm_db_suffix: "evm-tokens@v1".to_string(),
            svm_db_suffix: "svm-tokens@v1".to_string(),
            tvm_db_suffix: "tvm-tokens@v1".to_string(),
            symbols_file: None,
            icons_file: None,
            query_timeout_seconds: 10,
            max_result_rows: None,
            health_probe_timeout_ms: 3000,
            health_max_concurrency: 8,
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let config = TokenApiConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_clickhouse_url() {
        let mut config = TokenApiConfig::default();
        config.clickhouse_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = TokenApiConfig::default();
        config.health_max_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_name() {
        let config = TokenApiConfig::default();
        assert_eq!(
            config.database_name("eth-mainnet", ChainType::Evm),
            "eth-mainnet:evm-tokens@v1"
        );
        assert_eq!(
            config.database_name("solana", ChainType::Svm),
            "solana:svm-tokens@v1"
        );
    }

    #[test]
    fn test_from_properties() {
        let mut props = HashMap::new();
        props.insert(
            "clickhouse_url".to_string(),
            "http://clickhouse.ekko.svc:8123".to_string(),
        );
        props.insert("clickhouse_password".to_string(), "secret".to_string());
        props.insert("evm_db_suffix".to_string(), "evm-tokens@v2".to_string());
        props.insert("query_timeout_seconds".to_string(), "30".to_string());
        props.insert("max_result_rows".to_string(), "5000".to_string());

        let config = TokenApiConfig::from_properties(&props).unwrap();
        assert_eq!(config.clickhouse_url, "http://clickhouse.ekko.svc:8123");
        assert_eq!(config.clickhouse_password, "secret");
        assert_eq!(config.evm_db_suffix, "evm-tokens@v2");
        assert_eq!(config.query_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_result_rows, Some(5000));
        assert_eq!(config.health_max_concurrency, 8);
    }

    #[test]
    fn test_from_properties_rejects_garbage_numbers() {
        let mut props = HashMap::new();
        props.insert("health_probe_timeout_ms".to_string(), "soon".to_string());
        assert!(TokenApiConfig::from_properties(&props).is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let mut config = TokenApiConfig::default();
        config.clickhouse_password = "hunter2".to_string();
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
