//! ClickHouse HTTP interface client
//!
//! Statements are POSTed as the request body. Bound parameters travel as
//! `param_<name>` query arguments so values are never spliced into SQL text;
//! results come back in the `JSON` output format.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use token_api_common::{BoundParameters, DatabaseTarget, ParamValue, QueryStatistics, Row};

use crate::client::{DatabaseClient, QueryOptions, QueryOutput, RawDbError};

const EXCEPTION_CODE_HEADER: &str = "X-ClickHouse-Exception-Code";
const USER_HEADER: &str = "X-ClickHouse-User";
const KEY_HEADER: &str = "X-ClickHouse-Key";

static EXCEPTION_CODE_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^\s*Code:\s*(\d+)"));

/// Body of a `FORMAT JSON` response; `meta` and `rows` are not needed
#[derive(Debug, Deserialize)]
struct JsonFormatResponse {
    #[serde(default)]
    data: Vec<Row>,
    #[serde(default)]
    statistics: QueryStatistics,
}

/// ClickHouse client over the HTTP interface
#[derive(Debug, Clone)]
pub struct ClickHouseHttpClient {
    client: Client,
}

impl ClickHouseHttpClient {
    /// Create a client with its own connection pool
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent("token-api-query-provider/1.0")
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn query_args(
        target: &DatabaseTarget,
        params: &BoundParameters,
        options: &QueryOptions,
    ) -> Vec<(String, String)> {
        let mut args = vec![
            ("database".to_string(), target.database.clone()),
            ("default_format".to_string(), "JSON".to_string()),
        ];
        if let Some(max_rows) = options.max_rows {
            args.push(("max_result_rows".to_string(), max_rows.to_string()));
            args.push(("result_overflow_mode".to_string(), "break".to_string()));
        }
        args.extend(
            params
                .iter()
                .map(|(name, value)| (format!("param_{}", name), render_param(value))),
        );
        args
    }
}

#[async_trait]
impl DatabaseClient for ClickHouseHttpClient {
    async fn query(
        &self,
        target: &DatabaseTarget,
        sql: &str,
        params: &BoundParameters,
        options: &QueryOptions,
    ) -> Result<QueryOutput, RawDbError> {
        let start = Instant::now();
        let timeout_ms = options.timeout.as_millis() as u64;

        let response = self
            .client
            .post(&target.url)
            .query(&Self::query_args(target, params, options))
            .header(USER_HEADER, &target.username)
            .header(KEY_HEADER, &target.password)
            .timeout(options.timeout)
            .body(sql.to_string())
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout_ms))?;

        let status = response.status();
        let header_code = response
            .headers()
            .get(EXCEPTION_CODE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, timeout_ms))?;

        if !status.is_success() {
            let code = header_code.or_else(|| exception_code_from_body(&body));
            warn!(
                "ClickHouse returned HTTP {} (code {:?}) for {}",
                status.as_u16(),
                code,
                target
            );
            return Err(RawDbError::Backend {
                code,
                status: status.as_u16(),
                message: backend_message(status, &body),
            });
        }

        let parsed: JsonFormatResponse =
            serde_json::from_str(&body).map_err(|e| RawDbError::Decode {
                message: e.to_string(),
            })?;

        debug!(
            "ClickHouse returned {} rows from {} in {}ms",
            parsed.data.len(),
            target,
            start.elapsed().as_millis()
        );

        Ok(QueryOutput {
            rows: parsed.data,
            statistics: parsed.statistics,
        })
    }

    async fn ping(&self, target: &DatabaseTarget) -> Result<(), RawDbError> {
        self.query(target, "SELECT 1", &BTreeMap::new(), &QueryOptions::default())
            .await
            .map(|_| ())
    }
}

/// Render a bound value in the text form ClickHouse expects for `param_` arguments
pub fn render_param(value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(b) => b.to_string(),
        ParamValue::Number(n) => n.to_string(),
        ParamValue::String(s) => escape_text(s),
        ParamValue::StringList(items) => {
            let quoted: Vec<String> = items
                .iter()
                .map(|item| format!("'{}'", item.replace('\\', "\\\\").replace('\'', "\\'")))
                .collect();
            format!("[{}]", quoted.join(","))
        }
    }
}

fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Read the exception code from a `Code: 516. DB::Exception: ...` body
pub fn exception_code_from_body(body: &str) -> Option<u32> {
    let re = EXCEPTION_CODE_RE.as_ref().ok()?;
    re.captures(body)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn backend_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        body.to_string()
    }
}

fn map_transport_error(err: reqwest::Error, timeout_ms: u64) -> RawDbError {
    if err.is_timeout() {
        RawDbError::Timeout { timeout_ms }
    } else if err.is_connect() {
        RawDbError::Connect {
            message: err.to_string(),
        }
    } else if err.is_decode() || err.is_body() {
        RawDbError::Decode {
            message: err.to_string(),
        }
    } else {
        RawDbError::Other {
            message: err.to_string(),
        }
    }
}
