//! Icon table
//!
//! Maps token symbols to web3icons identifiers. Wrapped tokens share the icon
//! of their underlying asset (WETH -> ETH) through a one-character fallback.

use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use token_api_common::{Row, TokenApiError};

const DEFAULT_ICONS: &str = include_str!("../../data/icons.json");

/// Symbol -> icon identifier
#[derive(Debug, Clone, Default)]
pub struct IconTable {
    icons: HashMap<String, String>,
}

impl IconTable {
    pub fn new(icons: HashMap<String, String>) -> Self {
        Self { icons }
    }

    pub fn builtin() -> Result<Self, TokenApiError> {
        Self::from_json(DEFAULT_ICONS)
    }

    pub fn from_json(json: &str) -> Result<Self, TokenApiError> {
        let icons: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| TokenApiError::TableLoadError(format!("icons: {}", e)))?;
        Ok(Self::new(icons))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TokenApiError> {
        let path = path.as_ref();
        info!("Loading icon table from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Exact, case-sensitive match first; then retry with one leading `W` removed
    pub fn lookup(&self, symbol: &str) -> Option<&str> {
        self.icons
            .get(symbol)
            .or_else(|| symbol.strip_prefix('W').and_then(|s| self.icons.get(s)))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

/// Set `icon = {"web3icon": id}` on rows whose `symbol` has an icon
pub fn enrich_icons(rows: &mut [Row], table: &IconTable) {
    for row in rows.iter_mut() {
        let icon = match row.get("symbol").and_then(|v| v.as_str()) {
            Some(symbol) if !symbol.is_empty() => table.lookup(symbol),
            _ => None,
        };
        if let Some(icon) = icon {
            row.insert("icon".to_string(), json!({ "web3icon": icon }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> IconTable {
        IconTable::new(
            [("ETH", "ETH"), ("BTC", "BTC"), ("WOO", "WOO")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn row(symbol: serde_json::Value) -> Row {
        let mut row = Row::new();
        row.insert("symbol".to_string(), symbol);
        row
    }

    #[test]
    fn test_lookup_exact_then_wrapped() {
        let table = table();
        assert_eq!(table.lookup("ETH"), Some("ETH"));
        assert_eq!(table.lookup("WETH"), Some("ETH"));
        assert_eq!(table.lookup("WBTC"), Some("BTC"));
        assert_eq!(table.lookup("WOO"), Some("WOO"));
        assert_eq!(table.lookup("eth"), None);
        assert_eq!(table.lookup("WWETH"), None);
    }

    #[test]
    fn test_enrich_icons() {
        let table = table();
        let mut rows = vec![
            row(json!("WETH")),
            row(json!("")),
            row(json!("UNKNOWN")),
            row(json!(7)),
        ];

        enrich_icons(&mut rows, &table);

        assert_eq!(rows[0]["icon"], json!({"web3icon": "ETH"}));
        assert!(rows[1].get("icon").is_none());
        assert!(rows[2].get("icon").is_none());
        assert!(rows[3].get("icon").is_none());
    }

    #[test]
    fn test_builtin_table_loads() {
        let table = IconTable::builtin().unwrap();
        assert_eq!(table.lookup("WETH"), Some("ETH"));
    }
}
