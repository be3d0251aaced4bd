//! Query template registry
//!
//! Maps (query key, chain type) to a ClickHouse statement with typed
//! placeholders (`{address:String}`). A missing entry means the query is not
//! supported on that chain; it is not an error.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::TokenApiError;
use crate::types::ChainType;

pub const BALANCES: &str = "balances";
pub const BALANCES_NATIVE: &str = "balances_native";
pub const TRANSFERS: &str = "transfers";
pub const SWAPS: &str = "swaps";
pub const POOLS: &str = "pools";
pub const HOLDERS: &str = "holders";
pub const NFT_OWNERSHIPS: &str = "nft_ownerships";
pub const PRICES: &str = "prices";
pub const TOKENS: &str = "tokens";

/// Built-in templates: (chain type, query key, statement)
const BUILTIN_TEMPLATES: &[(ChainType, &str, &str)] = &[
    (ChainType::Evm, BALANCES, include_str!("../sql/evm/balances.sql")),
    (ChainType::Evm, BALANCES_NATIVE, include_str!("../sql/evm/balances_native.sql")),
    (ChainType::Evm, TRANSFERS, include_str!("../sql/evm/transfers.sql")),
    (ChainType::Evm, SWAPS, include_str!("../sql/evm/swaps.sql")),
    (ChainType::Evm, POOLS, include_str!("../sql/evm/pools.sql")),
    (ChainType::Evm, HOLDERS, include_str!("../sql/evm/holders.sql")),
    (ChainType::Evm, NFT_OWNERSHIPS, include_str!("../sql/evm/nft_ownerships.sql")),
    (ChainType::Evm, PRICES, include_str!("../sql/evm/prices.sql")),
    (ChainType::Evm, TOKENS, include_str!("../sql/evm/tokens.sql")),
    (ChainType::Svm, BALANCES, include_str!("../sql/svm/balances.sql")),
    (ChainType::Svm, TRANSFERS, include_str!("../sql/svm/transfers.sql")),
    (ChainType::Svm, SWAPS, include_str!("../sql/svm/swaps.sql")),
    (ChainType::Svm, HOLDERS, include_str!("../sql/svm/holders.sql")),
    (ChainType::Tvm, BALANCES, include_str!("../sql/tvm/balances.sql")),
    (ChainType::Tvm, TRANSFERS, include_str!("../sql/tvm/transfers.sql")),
    (ChainType::Tvm, TOKENS, include_str!("../sql/tvm/tokens.sql")),
];

/// `{name:Type}`; the type may carry quoted arguments such as `DateTime64(3, 'UTC')`
static PLACEHOLDER_RE: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*:\s*([A-Za-z][^{}]*?)\s*\}")
});

/// A typed placeholder found in a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    /// ClickHouse type as written, e.g. `String`, `Array(String)`
    pub type_name: String,
}

/// Immutable (chain type, query key) -> template map
#[derive(Debug, Clone, Default)]
pub struct QueryTemplateRegistry {
    templates: HashMap<(ChainType, String), String>,
}

impl QueryTemplateRegistry {
    /// Registry with no templates
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the compiled-in templates
    pub fn builtin() -> Self {
        BUILTIN_TEMPLATES
            .iter()
            .fold(Self::empty(), |registry, (chain_type, key, sql)| {
                registry.with_template(*chain_type, *key, sql.trim())
            })
    }

    /// Add or replace a template
    pub fn with_template(
        mut self,
        chain_type: ChainType,
        key: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.templates
            .insert((chain_type, key.into()), template.into());
        self
    }

    /// Template for a key on a chain, `None` when unsupported
    pub fn resolve(&self, key: &str, chain_type: ChainType) -> Option<&str> {
        self.templates
            .get(&(chain_type, key.to_string()))
            .map(String::as_str)
    }

    /// Resolve several keys; the output is parallel to `keys`
    pub fn resolve_all<K: AsRef<str>>(&self, keys: &[K], chain_type: ChainType) -> Vec<Option<&str>> {
        keys.iter()
            .map(|key| self.resolve(key.as_ref(), chain_type))
            .collect()
    }

    /// Keys available on a chain, sorted
    pub fn supported_keys(&self, chain_type: ChainType) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .templates
            .keys()
            .filter(|(c, _)| *c == chain_type)
            .map(|(_, key)| key.as_str())
            .collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Extract the typed placeholders of a template, in order of appearance.
/// A name used several times is reported once.
pub fn extract_placeholders(template: &str) -> Result<Vec<Placeholder>, TokenApiError> {
    let re = PLACEHOLDER_RE
        .as_ref()
        .map_err(|e| TokenApiError::TemplateError(format!("invalid placeholder regex: {e}")))?;

    let mut placeholders: Vec<Placeholder> = Vec::new();
    for cap in re.captures_iter(template) {
        let (Some(name), Some(type_name)) = (cap.get(1), cap.get(2)) else {
            continue;
        };
        if placeholders.iter().any(|p| p.name == name.as_str()) {
            continue;
        }
        placeholders.push(Placeholder {
            name: name.as_str().to_string(),
            type_name: type_name.as_str().to_string(),
        });
    }
    Ok(placeholders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_builtin_resolves_evm_balances() {
        let registry = QueryTemplateRegistry::builtin();
        let sql = registry.resolve(BALANCES, ChainType::Evm).unwrap();
        assert!(sql.contains("{address:String}"));
    }

    #[test]
    fn test_unsupported_key_is_absent() {
        let registry = QueryTemplateRegistry::builtin();
        assert!(registry.resolve(NFT_OWNERSHIPS, ChainType::Tvm).is_none());
        assert!(registry.resolve("unknown", ChainType::Evm).is_none());
    }

    #[test]
    fn test_resolve_all_preserves_order_with_gaps() {
        let registry = QueryTemplateRegistry::builtin();
        let resolved = registry.resolve_all(&[BALANCES, POOLS, TRANSFERS], ChainType::Tvm);
        assert_eq!(resolved.len(), 3);
        assert!(resolved[0].is_some());
        assert!(resolved[1].is_none());
        assert!(resolved[2].is_some());
    }

    #[test]
    fn test_supported_keys_sorted() {
        let registry = QueryTemplateRegistry::builtin();
        assert_eq!(
            registry.supported_keys(ChainType::Tvm),
            vec![BALANCES, TOKENS, TRANSFERS]
        );
    }

    #[test]
    fn test_every_builtin_template_has_placeholders() {
        let registry = QueryTemplateRegistry::builtin();
        for chain_type in ChainType::ALL {
            for key in registry.supported_keys(chain_type) {
                let sql = registry.resolve(key, chain_type).unwrap();
                let placeholders = extract_placeholders(sql).unwrap();
                assert!(
                    !placeholders.is_empty(),
                    "{chain_type}/{key} has no placeholders"
                );
            }
        }
    }

    #[test]
    fn test_extract_placeholders() {
        let sql = "SELECT * FROM t WHERE a = {address:String} AND c IN {contracts: Array(String)} \
                   AND a2 = {address:String} LIMIT {limit:UInt64}";
        let placeholders = extract_placeholders(sql).unwrap();
        assert_eq!(
            placeholders,
            vec![
                Placeholder {
                    name: "address".to_string(),
                    type_name: "String".to_string()
                },
                Placeholder {
                    name: "contracts".to_string(),
                    type_name: "Array(String)".to_string()
                },
                Placeholder {
                    name: "limit".to_string(),
                    type_name: "UInt64".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_extract_placeholders_with_quoted_type_arguments() {
        let sql = "SELECT * FROM t WHERE ts >= {since: DateTime64(3, 'UTC')} AND tz = {zone:String}";
        let placeholders = extract_placeholders(sql).unwrap();
        assert_eq!(
            placeholders,
            vec![
                Placeholder {
                    name: "since".to_string(),
                    type_name: "DateTime64(3, 'UTC')".to_string()
                },
                Placeholder {
                    name: "zone".to_string(),
                    type_name: "String".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_paginated_templates_bind_offset() {
        let registry = QueryTemplateRegistry::builtin();
        for chain_type in ChainType::ALL {
            for key in registry.supported_keys(chain_type) {
                let sql = registry.resolve(key, chain_type).unwrap();
                let names: Vec<String> = extract_placeholders(sql)
                    .unwrap()
                    .into_iter()
                    .map(|p| p.name)
                    .collect();
                if names.iter().any(|n| n == "limit") {
                    assert!(
                        names.iter().any(|n| n == "offset"),
                        "{chain_type}/{key} is limited but ignores the page offset"
                    );
                }
            }
        }
    }

    #[test]
    fn test_extract_placeholders_ignores_map_literals() {
        let sql = "SELECT map('a', 1) AS m, {'x': 1} AS literal FROM t WHERE id = {id:UInt32}";
        let placeholders = extract_placeholders(sql).unwrap();
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].name, "id");
    }
}
