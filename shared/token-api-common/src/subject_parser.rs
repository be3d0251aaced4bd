//! NATS subject parser for Token API providers
//!
//! Parses query subjects in the format:
//! `tokenapi.{chain_type}.{network_id}.query`
//!
//! Examples:
//! - `tokenapi.evm.eth-mainnet.query`
//! - `tokenapi.svm.solana.query`
//! - `tokenapi.tvm.tron.query`

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::ChainType;

/// Subject prefix shared by every Token API subject
pub const SUBJECT_PREFIX: &str = "tokenapi";

/// Parsed information from a query subject
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubjectInfo {
    /// Chain family of the target network
    pub chain_type: ChainType,
    /// Target network id (e.g., "eth-mainnet", "solana")
    pub network_id: String,
    /// Action to perform (currently always "query")
    pub action: String,
}

impl SubjectInfo {
    /// Parse a NATS subject into SubjectInfo
    ///
    /// Expected format: `tokenapi.{chain_type}.{network_id}.{action}`
    ///
    /// # Examples
    /// ```
    /// use token_api_common::{ChainType, SubjectInfo};
    ///
    /// let info = SubjectInfo::parse("tokenapi.evm.eth-mainnet.query").unwrap();
    /// assert_eq!(info.chain_type, ChainType::Evm);
    /// assert_eq!(info.network_id, "eth-mainnet");
    /// assert_eq!(info.action, "query");
    /// ```
    pub fn parse(subject: &str) -> Result<Self, SubjectParseError> {
        let parts: Vec<&str> = subject.split('.').collect();

        if parts.len() != 4 {
            return Err(SubjectParseError::InvalidFormat(format!(
                "Expected format 'tokenapi.{{chain_type}}.{{network_id}}.{{action}}', got: {}",
                subject
            )));
        }

        if parts[0] != SUBJECT_PREFIX {
            return Err(SubjectParseError::InvalidPrefix(format!(
                "Subject must start with '{}', got: {}",
                SUBJECT_PREFIX, parts[0]
            )));
        }

        let chain_type: ChainType = parts[1].parse().map_err(|_| {
            SubjectParseError::InvalidChainType(format!(
                "Unknown chain type: {}. Valid chain types: evm, svm, tvm",
                parts[1]
            ))
        })?;

        let network_id = parts[2].to_string();
        if network_id.is_empty() || network_id == "*" || network_id == ">" {
            return Err(SubjectParseError::InvalidFormat(format!(
                "Network id must be concrete, got: {}",
                subject
            )));
        }

        let action = parts[3].to_string();
        if !Self::is_valid_action(&action) {
            return Err(SubjectParseError::InvalidAction(format!(
                "Unknown action: {}. Valid actions: query",
                action
            )));
        }

        Ok(Self {
            chain_type,
            network_id,
            action,
        })
    }

    /// Check if an action is valid
    pub fn is_valid_action(action: &str) -> bool {
        matches!(action, "query")
    }

    /// Get the full NATS subject for this info
    pub fn to_subject(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            SUBJECT_PREFIX, self.chain_type, self.network_id, self.action
        )
    }

    /// Subscription pattern for every query on every network
    ///
    /// Returns: `tokenapi.*.*.query`
    pub fn subscription_pattern_all_queries() -> String {
        format!("{}.*.*.query", SUBJECT_PREFIX)
    }

    /// Subscription pattern for every network of one chain family
    ///
    /// Returns: `tokenapi.{chain_type}.*.query`
    pub fn subscription_pattern_for_chain(chain_type: ChainType) -> String {
        format!("{}.{}.*.query", SUBJECT_PREFIX, chain_type)
    }
}

impl fmt::Display for SubjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_subject())
    }
}

/// Errors that can occur when parsing NATS subjects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectParseError {
    /// Subject format is invalid
    InvalidFormat(String),
    /// Subject doesn't start with 'tokenapi'
    InvalidPrefix(String),
    /// Chain type is not recognized
    InvalidChainType(String),
    /// Action is not recognized
    InvalidAction(String),
}

impl fmt::Display for SubjectParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectParseError::InvalidFormat(msg) => write!(f, "Invalid subject format: {}", msg),
            SubjectParseError::InvalidPrefix(msg) => write!(f, "Invalid subject prefix: {}", msg),
            SubjectParseError::InvalidChainType(msg) => write!(f, "Invalid chain type: {}", msg),
            SubjectParseError::InvalidAction(msg) => write!(f, "Invalid action: {}", msg),
        }
    }
}

impl std::error::Error for SubjectParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_subject() {
        let info = SubjectInfo::parse("tokenapi.evm.eth-mainnet.query").unwrap();
        assert_eq!(info.chain_type, ChainType::Evm);
        assert_eq!(info.network_id, "eth-mainnet");
        assert_eq!(info.action, "query");
    }

    #[test]
    fn test_parse_all_chain_types() {
        for (name, chain_type) in [
            ("evm", ChainType::Evm),
            ("svm", ChainType::Svm),
            ("tvm", ChainType::Tvm),
        ] {
            let subject = format!("tokenapi.{}.some-network.query", name);
            let info = SubjectInfo::parse(&subject).unwrap();
            assert_eq!(info.chain_type, chain_type);
        }
    }

    #[test]
    fn test_parse_invalid_format() {
        let result = SubjectInfo::parse("tokenapi.evm.query");
        assert!(matches!(result, Err(SubjectParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_parse_invalid_prefix() {
        let result = SubjectInfo::parse("otherapi.evm.eth-mainnet.query");
        assert!(matches!(result, Err(SubjectParseError::InvalidPrefix(_))));
    }

    #[test]
    fn test_parse_invalid_chain_type() {
        let result = SubjectInfo::parse("tokenapi.utxo.bitcoin.query");
        assert!(matches!(result, Err(SubjectParseError::InvalidChainType(_))));
    }

    #[test]
    fn test_parse_invalid_action() {
        let result = SubjectInfo::parse("tokenapi.evm.eth-mainnet.write");
        assert!(matches!(result, Err(SubjectParseError::InvalidAction(_))));
    }

    #[test]
    fn test_wildcard_network_rejected() {
        let result = SubjectInfo::parse("tokenapi.evm.*.query");
        assert!(matches!(result, Err(SubjectParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_to_subject_roundtrip() {
        let original = "tokenapi.tvm.tron.query";
        let info = SubjectInfo::parse(original).unwrap();
        assert_eq!(info.to_subject(), original);
    }

    #[test]
    fn test_subscription_patterns() {
        assert_eq!(
            SubjectInfo::subscription_pattern_all_queries(),
            "tokenapi.*.*.query"
        );
        assert_eq!(
            SubjectInfo::subscription_pattern_for_chain(ChainType::Svm),
            "tokenapi.svm.*.query"
        );
    }
}
