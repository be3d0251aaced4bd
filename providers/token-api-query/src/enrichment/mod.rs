//! Response enrichment
//!
//! Post-processing applied to successful responses: the symbol patch pass,
//! then the icon pass. Both leave row count and order untouched and are
//! no-ops on failures.

pub mod icons;
pub mod symbols;

use std::sync::Arc;

use token_api_common::{TokenApiConfig, TokenApiError, UsageResponse};

pub use icons::{enrich_icons, IconTable};
pub use symbols::{enrich_symbols, SymbolRecord, SymbolTable};

/// Shared, immutable enrichment tables
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    symbols: Arc<SymbolTable>,
    icons: Arc<IconTable>,
}

impl Enrichment {
    pub fn new(symbols: SymbolTable, icons: IconTable) -> Self {
        Self {
            symbols: Arc::new(symbols),
            icons: Arc::new(icons),
        }
    }

    /// Load the tables named by the configuration, or the embedded defaults
    pub fn from_config(config: &TokenApiConfig) -> Result<Self, TokenApiError> {
        let symbols = match &config.symbols_file {
            Some(path) => SymbolTable::from_file(path)?,
            None => SymbolTable::builtin()?,
        };
        let icons = match &config.icons_file {
            Some(path) => IconTable::from_file(path)?,
            None => IconTable::builtin()?,
        };
        Ok(Self::new(symbols, icons))
    }

    /// Apply both passes to a response for `network`
    pub fn apply(&self, response: &mut UsageResponse, network: &str) {
        if let Some(rows) = response.rows_mut() {
            enrich_symbols(rows, &self.symbols, network);
            enrich_icons(rows, &self.icons);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use token_api_common::{ErrorKind, QueryStatistics, Row, UsageSuccess};

    #[test]
    fn test_apply_is_idempotent_and_skips_failures() {
        let enrichment = Enrichment::from_config(&TokenApiConfig::default()).unwrap();

        let mut row = Row::new();
        row.insert(
            "contract".to_string(),
            json!("0x9f8f72aa9304c8b593d555f12ef6589cc3a579a2"),
        );
        let mut response = UsageResponse::Success(UsageSuccess::new(
            vec![row],
            QueryStatistics::default(),
            std::time::Duration::ZERO,
        ));

        enrichment.apply(&mut response, "eth-mainnet");
        let once = response.clone();
        enrichment.apply(&mut response, "eth-mainnet");
        assert_eq!(once, response);

        let data = &response.as_success().unwrap().data;
        assert_eq!(data[0]["symbol"], "MKR");
        assert_eq!(data[0]["icon"], json!({"web3icon": "MKR"}));

        let mut failure = UsageResponse::failure(ErrorKind::BadDatabaseResponse, "x", None);
        let before = failure.clone();
        enrichment.apply(&mut failure, "eth-mainnet");
        assert_eq!(before, failure);
    }
}
