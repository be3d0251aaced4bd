//! In-memory database client shared by the pipeline and health tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

use token_api_common::{BoundParameters, DatabaseTarget, QueryStatistics, Row};
use token_api_query_provider::client::{DatabaseClient, QueryOptions, QueryOutput, RawDbError};

type Responder = Box<dyn Fn(&str) -> Result<Vec<Row>, RawDbError> + Send + Sync>;

/// A recorded `query` call
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub database: String,
    pub sql: String,
    pub params: BoundParameters,
}

pub struct FakeClient {
    responder: Responder,
    failing_databases: HashSet<String>,
    slow_databases: HashSet<String>,
    query_barrier: Option<Arc<Barrier>>,
    pub queries: Mutex<Vec<RecordedQuery>>,
    pub pings: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeClient {
    pub fn new(
        responder: impl Fn(&str) -> Result<Vec<Row>, RawDbError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            failing_databases: HashSet::new(),
            slow_databases: HashSet::new(),
            query_barrier: None,
            queries: Mutex::new(Vec::new()),
            pings: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(|_| Ok(Vec::new()))
    }

    /// Pings against this database fail with a connection error
    pub fn failing(mut self, database: &str) -> Self {
        self.failing_databases.insert(database.to_string());
        self
    }

    /// Pings against this database never answer in time
    pub fn slow(mut self, database: &str) -> Self {
        self.slow_databases.insert(database.to_string());
        self
    }

    /// Every query waits until `parties` queries are in flight at once
    pub fn with_query_barrier(mut self, parties: usize) -> Self {
        self.query_barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn recorded(&self) -> Vec<RecordedQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatabaseClient for FakeClient {
    async fn query(
        &self,
        target: &DatabaseTarget,
        sql: &str,
        params: &BoundParameters,
        _options: &QueryOptions,
    ) -> Result<QueryOutput, RawDbError> {
        self.queries.lock().unwrap().push(RecordedQuery {
            database: target.database.clone(),
            sql: sql.to_string(),
            params: params.clone(),
        });
        if let Some(barrier) = &self.query_barrier {
            barrier.wait().await;
        }
        let rows = (self.responder)(sql)?;
        Ok(QueryOutput {
            statistics: QueryStatistics {
                elapsed: 0.001,
                rows_read: 10,
                bytes_read: 100,
            },
            rows,
        })
    }

    async fn ping(&self, target: &DatabaseTarget) -> Result<(), RawDbError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let result = if self.slow_databases.contains(&target.database) {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        } else {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.failing_databases.contains(&target.database) {
                Err(RawDbError::Connect {
                    message: "tcp connect error: Connection refused (os error 111)".to_string(),
                })
            } else {
                Ok(())
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Build a row from a JSON object literal
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("row must be a JSON object, got {}", other),
    }
}
