//! Token API query provider
//!
//! Answers `tokenapi.{chain}.{network}.query` requests by running the
//! chain's SQL templates against the ClickHouse database of that network,
//! patching token symbols and icons into the rows, and replying with a
//! success or classified failure envelope. `tokenapi.health` replies with
//! the reachability of every distinct ClickHouse target.
//!
//! Configuration comes from wasmCloud HostData. Run outside a host, the
//! `TOKEN_API_*` and `NATS_URL` environment variables are used instead.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use wasmcloud_provider_sdk::{load_host_data, run_provider};

use token_api_query_provider::TokenApiQueryProvider;

const PROVIDER_NAME: &str = "token-api-query-provider";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("token_api_query_provider=info".parse()?)
                .add_directive("token_api_common=info".parse()?),
        )
        .init();

    info!(
        "Starting {} v{}",
        PROVIDER_NAME,
        env!("CARGO_PKG_VERSION")
    );

    let config: HashMap<String, String> = match load_host_data() {
        Ok(host_data) => {
            info!(
                "HostData for provider {:?}: {} config entries",
                host_data.provider_key,
                host_data.config.len()
            );
            host_data.config.clone()
        }
        Err(e) => {
            warn!("No HostData ({}), reading TOKEN_API_* environment", e);
            HashMap::new()
        }
    };

    let provider = TokenApiQueryProvider::with_config(config)?;
    let networks = provider.service().networks().len();
    let runtime_provider = provider.clone();
    let provider = Arc::new(provider);

    info!("Serving {} networks", networks);

    // Listener and runtime run side by side; a lost NATS connection is logged, not fatal
    tokio::spawn(async move {
        if let Err(e) = provider.start().await {
            error!("Query listener stopped: {:#}", e);
        }
    });

    let handler = run_provider(runtime_provider, PROVIDER_NAME)
        .await
        .context("Provider runtime error")?;
    handler.await;

    info!("{} shut down", PROVIDER_NAME);
    Ok(())
}
