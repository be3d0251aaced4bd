//! Health aggregator
//!
//! Probes every distinct database target once, with a cap on probes in
//! flight and a timeout per probe, then reduces the outcomes into one
//! overall state plus per-network detail. Results are never cached.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use token_api_common::{
    DatabaseTarget, ErrorKind, HealthResult, HealthState, NetworkHealth, NetworkRegistry,
};

use crate::classifier::{classify, classify_for_target};
use crate::client::{DatabaseClient, RawDbError};

/// Outcome of probing one target
#[derive(Debug, Clone, PartialEq)]
struct ProbeOutcome {
    reachable: bool,
    latency_ms: u64,
    error: Option<ErrorKind>,
    message: Option<String>,
}

/// Fans liveness probes out over the configured targets
#[derive(Clone)]
pub struct HealthAggregator {
    client: Arc<dyn DatabaseClient>,
    networks: Arc<NetworkRegistry>,
    probe_timeout: Duration,
    max_concurrency: usize,
}

impl HealthAggregator {
    pub fn new(
        client: Arc<dyn DatabaseClient>,
        networks: Arc<NetworkRegistry>,
        probe_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self {
            client,
            networks,
            probe_timeout,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Evaluate overall health. With `skip_endpoints` no probe is sent.
    #[instrument(skip(self))]
    pub async fn evaluate(&self, skip_endpoints: bool) -> HealthResult {
        if skip_endpoints {
            debug!("Endpoint probes skipped");
            return HealthResult::new(HealthState::Healthy, Vec::new());
        }

        let groups = self.networks.distinct_targets();
        if groups.is_empty() {
            return HealthResult::new(HealthState::Healthy, Vec::new());
        }

        // Completion order is arbitrary; each probe writes its own slot
        let mut outcomes: Vec<Option<ProbeOutcome>> = vec![None; groups.len()];
        let mut completed = stream::iter(groups.iter().enumerate().map(|(index, group)| {
            let target = &group.target;
            async move { (index, self.probe(target).await) }
        }))
        .buffer_unordered(self.max_concurrency);

        while let Some((index, outcome)) = completed.next().await {
            outcomes[index] = Some(outcome);
        }
        drop(completed);

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        let mut networks: Vec<NetworkHealth> = Vec::new();

        for (group, outcome) in groups.iter().zip(outcomes) {
            let outcome = outcome.unwrap_or_else(|| ProbeOutcome {
                reachable: false,
                latency_ms: 0,
                error: Some(ErrorKind::BadDatabaseResponse),
                message: Some("Probe did not complete".to_string()),
            });
            if outcome.reachable {
                succeeded += 1;
            } else {
                failed += 1;
            }
            networks.extend(group.network_ids.iter().map(|id| NetworkHealth {
                network_id: id.clone(),
                reachable: outcome.reachable,
                latency_ms: Some(outcome.latency_ms),
                error: outcome.error,
                message: outcome.message.clone(),
            }));
        }
        networks.sort_by(|a, b| a.network_id.cmp(&b.network_id));

        let status = HealthState::from_probe_counts(succeeded, failed);
        info!(
            "Health evaluated: {:?} ({} ok, {} failed)",
            status, succeeded, failed
        );
        HealthResult::new(status, networks)
    }

    async fn probe(&self, target: &DatabaseTarget) -> ProbeOutcome {
        let start = Instant::now();
        let result = tokio::time::timeout(self.probe_timeout, self.client.ping(target)).await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let failure = match result {
            Ok(Ok(())) => {
                return ProbeOutcome {
                    reachable: true,
                    latency_ms,
                    error: None,
                    message: None,
                }
            }
            Ok(Err(err)) => classify_for_target(&err, target),
            Err(_) => classify(&RawDbError::Timeout {
                timeout_ms: self.probe_timeout.as_millis() as u64,
            }),
        };

        warn!(
            "Health probe failed for {}: {} ({})",
            target,
            failure.message,
            failure.detail.as_deref().unwrap_or("no detail")
        );
        let message = match failure.detail {
            Some(detail) => format!("{}: {}", failure.message, detail),
            None => failure.message,
        };
        ProbeOutcome {
            reachable: false,
            latency_ms,
            error: Some(failure.kind),
            message: Some(message),
        }
    }
}
