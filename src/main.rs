//! x402 gateway HTTP entrypoint.
//!
//! Launches an axum-based reverse proxy that enforces HTTP 402 stablecoin
//! micropayments in front of third-party upstream APIs.
//!
//! Endpoints:
//! - `GET /health` — ledger-backed liveness/stats probe
//! - `GET /v1/services` — priced service catalog with per-rail payment requirements
//! - `GET /.well-known/x402.json` — x402 discovery manifest
//! - all other routes — dispatched per the embedded service catalog, gated by payment
//!
//! Environment: `.env` values loaded at startup; see `config.rs` for the full list.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;

use x402_gateway::cache::TtlCache;
use x402_gateway::config::Config;
use x402_gateway::credential::CredentialPool;
use x402_gateway::facilitator::external::ExternalFacilitatorClient;
use x402_gateway::facilitator::fast::FastRailFacilitator;
use x402_gateway::ledger::Ledger;
use x402_gateway::middleware::rate_limit::RateLimiter;
use x402_gateway::onchain::OnChainVerifier;
use x402_gateway::pipeline::{build_router, AppState};
use x402_gateway::service::ServiceRegistry;
use x402_gateway::sig_down::SigDown;
use x402_gateway::telemetry;
use x402_gateway::upstream::{JsonPassthroughHandler, UpstreamDispatcher};

/// Cache TTL for the illustrative passthrough handler's upstream responses.
const UPSTREAM_CACHE_TTL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init();

    let config = Config::from_env()?;
    tracing::info!(host = %config.host, port = config.port, "configuration loaded");

    let ledger = Arc::new(Ledger::connect(config.database_url.as_str(), config.database_pool_size).await?);
    ledger.run_migrations().await?;
    let flusher_handle = ledger.spawn_flusher();

    let fast_rail_stablecoin: Address = config
        .fast_rail_stablecoin_address
        .parse()
        .map_err(|_| "FAST_RAIL_STABLECOIN_ADDRESS is not a valid address")?;
    let onchain_verifier =
        OnChainVerifier::new(config.fast_rail_rpc_url.as_str(), fast_rail_stablecoin)?;
    let fast_facilitator = Arc::new(FastRailFacilitator::new(onchain_verifier, Arc::clone(&ledger)));
    let external_facilitator = Arc::new(ExternalFacilitatorClient::new(
        config.external_facilitator_url.clone(),
    ));

    let credentials = Arc::new(CredentialPool::new(config.provider_secrets.clone()));
    let cache = Arc::new(TtlCache::new());
    let rate_limiter = Arc::new(RateLimiter::new());
    let services = Arc::new(ServiceRegistry::load_embedded());
    let upstream = Arc::new(UpstreamDispatcher::new(
        Arc::clone(&cache),
        Arc::clone(&credentials),
        Arc::clone(&ledger),
    ));
    for service in services.all() {
        let tag = &service.upstream_provider_tag;
        if upstream.is_registered(tag) {
            continue;
        }
        let Some(upstream_url) = config.provider_upstream_urls.get(tag).cloned() else {
            tracing::warn!(provider_tag = %tag, "no PROVIDER_<TAG>_URL configured, route will 502");
            continue;
        };
        upstream.register(
            tag,
            Arc::new(JsonPassthroughHandler::new(upstream_url, Some(UPSTREAM_CACHE_TTL))),
        );
    }

    let base_url = format!("http://{}:{}", config.host, config.port);
    let state = AppState {
        config: Arc::new(config.clone()),
        services,
        ledger: Arc::clone(&ledger),
        fast_facilitator,
        external_facilitator,
        credentials,
        cache,
        rate_limiter,
        upstream,
        base_url,
    };

    let router = build_router(state);

    let addr = std::net::SocketAddr::new(config.host, config.port);
    tracing::info!("starting server at http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!("failed to bind to {addr}: {e}");
        std::process::exit(1);
    });

    let sig_down = SigDown::try_new()?;
    let cancellation_token = sig_down.cancellation_token();
    let graceful_shutdown = {
        let cancellation_token = cancellation_token.clone();
        async move { cancellation_token.cancelled().await }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    // Drain the request-log buffer before exit.
    tracing::info!("shutting down, draining request log buffer");
    tokio::time::timeout(Duration::from_secs(10), ledger.flush())
        .await
        .unwrap_or_else(|_| tracing::warn!("ledger flush timed out during shutdown"));
    flusher_handle.abort();

    Ok(())
}
