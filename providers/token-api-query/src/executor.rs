//! Query executor
//!
//! Validates parameter binding for every template up front, then runs the
//! templates one after another against a single database target and
//! concatenates their rows. Failures are classified, never raised.

use std::sync::Arc;
use std::time::Instant;

use token_api_common::{
    extract_placeholders, BoundParameters, DatabaseTarget, ParamValue, QueryStatistics, Row,
    UsageResponse, UsageSuccess,
};
use tracing::{debug, info, instrument, warn};

use crate::classifier::{classify, classify_for_target};
use crate::client::{DatabaseClient, QueryOptions, RawDbError};

/// Executes resolved templates against a database target
#[derive(Clone)]
pub struct QueryExecutor {
    client: Arc<dyn DatabaseClient>,
}

impl QueryExecutor {
    pub fn new(client: Arc<dyn DatabaseClient>) -> Self {
        Self { client }
    }

    /// Execute `templates` in order and merge their rows.
    ///
    /// Nothing is sent to the database unless every placeholder of every
    /// template has a compatible bound value.
    #[instrument(skip_all, fields(target = %target, templates = templates.len()))]
    pub async fn execute(
        &self,
        target: &DatabaseTarget,
        templates: &[&str],
        params: &BoundParameters,
        options: &QueryOptions,
    ) -> UsageResponse {
        let start = Instant::now();

        for template in templates {
            if let Err(err) = validate_binding(template, params) {
                warn!("Rejecting query before execution: {}", err);
                return classify(&err).into();
            }
        }

        let mut data: Vec<Row> = Vec::new();
        let mut statistics = QueryStatistics::default();

        for (index, template) in templates.iter().enumerate() {
            match self.client.query(target, template, params, options).await {
                Ok(output) => {
                    debug!("Template {} returned {} rows", index, output.rows.len());
                    statistics.accumulate(&output.statistics);
                    data.extend(output.rows);
                }
                Err(err) => {
                    let failure = classify_for_target(&err, target);
                    warn!(
                        "Template {} failed on {}: {} ({})",
                        index,
                        target,
                        failure.message,
                        failure.detail.as_deref().unwrap_or("no detail")
                    );
                    return failure.into();
                }
            }
        }

        let success = UsageSuccess::new(data, statistics, start.elapsed());
        info!(
            "Query executed: {} rows in {}ms",
            success.rows, success.duration_ms
        );
        UsageResponse::Success(success)
    }
}

/// Check that every placeholder of `template` has a value of a compatible shape
pub fn validate_binding(template: &str, params: &BoundParameters) -> Result<(), RawDbError> {
    let placeholders = extract_placeholders(template).map_err(|e| RawDbError::Other {
        message: e.to_string(),
    })?;

    for placeholder in placeholders {
        let value = params.get(&placeholder.name).ok_or_else(|| RawDbError::Binding {
            message: format!("Missing parameter '{}'", placeholder.name),
        })?;

        if !accepts(&placeholder.type_name, value) {
            return Err(RawDbError::Binding {
                message: format!(
                    "Parameter '{}' expects {}, got {}",
                    placeholder.name,
                    placeholder.type_name,
                    value.shape()
                ),
            });
        }
    }
    Ok(())
}

/// Whether a ClickHouse placeholder type accepts a bound value
fn accepts(type_name: &str, value: &ParamValue) -> bool {
    let base = strip_modifiers(type_name.trim());

    if base == "String" || base.starts_with("FixedString(") || base == "UUID" {
        return matches!(value, ParamValue::String(_));
    }
    if base.starts_with("Array(") {
        return matches!(value, ParamValue::StringList(_));
    }
    if base == "Bool" || base == "Boolean" {
        return matches!(value, ParamValue::Bool(_));
    }
    if base.starts_with("UInt") {
        return matches!(value, ParamValue::Number(n) if n.as_u64().is_some());
    }
    if base.starts_with("Int") {
        return matches!(value, ParamValue::Number(n) if n.is_i64() || n.is_u64());
    }
    if base.starts_with("Float") || base.starts_with("Decimal") {
        return matches!(value, ParamValue::Number(_));
    }
    if base.starts_with("DateTime") || base.starts_with("Date") {
        return matches!(value, ParamValue::String(_) | ParamValue::Number(_));
    }

    // Anything else is parsed from its text form by the database
    matches!(value, ParamValue::String(_))
}

/// Unwrap `Nullable(..)` and `LowCardinality(..)`
fn strip_modifiers(type_name: &str) -> &str {
    let mut current = type_name;
    loop {
        let inner = ["Nullable(", "LowCardinality("].iter().find_map(|prefix| {
            current
                .strip_prefix(*prefix)
                .and_then(|rest| rest.strip_suffix(')'))
        });
        match inner {
            Some(inner) => current = inner.trim(),
            None => return current,
        }
    }
}
