//! Symbol patch table
//!
//! Some contracts report wrong or missing metadata on-chain (MKR and SAI
//! return `bytes32` symbols) and native assets have no contract at all. The
//! table overrides `symbol`, `decimals` and `name` for those addresses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use token_api_common::{normalize_address, Row, TokenApiError};

const DEFAULT_SYMBOLS: &str = include_str!("../../data/symbols.json");

/// Corrected metadata for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    pub address: String,
    pub symbol: String,
    pub decimals: u32,
    pub name: String,
    /// Restrict the record to one network (native asset placeholders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

/// Address -> metadata lookup, keyed by normalized address
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    scoped: HashMap<(String, String), SymbolRecord>,
    unscoped: HashMap<String, SymbolRecord>,
}

impl SymbolTable {
    pub fn new(records: impl IntoIterator<Item = SymbolRecord>) -> Self {
        let mut table = Self::default();
        for mut record in records {
            let key = normalize_address(&record.address);
            record.address = key.clone();
            match record.network.clone() {
                Some(network) => {
                    table.scoped.insert((network, key), record);
                }
                None => {
                    table.unscoped.insert(key, record);
                }
            }
        }
        table
    }

    /// Table compiled into the binary
    pub fn builtin() -> Result<Self, TokenApiError> {
        Self::from_json(DEFAULT_SYMBOLS)
    }

    pub fn from_json(json: &str) -> Result<Self, TokenApiError> {
        let records: Vec<SymbolRecord> = serde_json::from_str(json)
            .map_err(|e| TokenApiError::TableLoadError(format!("symbols: {}", e)))?;
        Ok(Self::new(records))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TokenApiError> {
        let path = path.as_ref();
        info!("Loading symbol table from {}", path.display());
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Look up an address; a record scoped to `network` wins over an unscoped one
    pub fn lookup(&self, address: &str, network: &str) -> Option<&SymbolRecord> {
        let key = normalize_address(address);
        self.scoped
            .get(&(network.to_string(), key.clone()))
            .or_else(|| self.unscoped.get(&key))
    }

    pub fn len(&self) -> usize {
        self.scoped.len() + self.unscoped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Overwrite `symbol`, `decimals` and `name` on rows whose `contract` (or,
/// failing that, `address`) is in the table.
pub fn enrich_symbols(rows: &mut [Row], table: &SymbolTable, network: &str) {
    let mut patched = 0usize;
    for row in rows.iter_mut() {
        let Some(key) = ["contract", "address"]
            .iter()
            .find_map(|field| row.get(*field).and_then(|v| v.as_str()))
        else {
            continue;
        };
        let Some(record) = table.lookup(key, network) else {
            continue;
        };

        row.insert("symbol".to_string(), record.symbol.clone().into());
        row.insert("decimals".to_string(), record.decimals.into());
        row.insert("name".to_string(), record.name.clone().into());
        patched += 1;
    }
    if patched > 0 {
        debug!("Patched symbol metadata on {} rows", patched);
    }
}
