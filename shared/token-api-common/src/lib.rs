//! Token API Common Library
//!
//! Shared types, registries and configuration for the Token API query
//! provider. Every network reads from its own ClickHouse database; the
//! registries here are built once at start-up and shared read-only.

pub mod config;
pub mod error;
pub mod networks;
pub mod subject_parser;
pub mod templates;
pub mod types;

pub use config::TokenApiConfig;
pub use error::{ErrorKind, TokenApiError};
pub use networks::{DatabaseTarget, NetworkDescriptor, NetworkRegistry, NetworkSpec, TargetGroup};
pub use subject_parser::{SubjectInfo, SubjectParseError};
pub use templates::{extract_placeholders, Placeholder, QueryTemplateRegistry};
pub use types::*;

/// Result type alias for Token API operations
pub type Result<T> = std::result::Result<T, TokenApiError>;
