//! Cross-module integration tests exercising the assembled router end-to-end.
//!
//! These require a live Postgres (`DATABASE_URL`) and a fast-rail RPC endpoint
//! (`FAST_RAIL_RPC_URL`); marked `#[ignore]` so they don't run without that
//! infrastructure, matching common `sqlx` test conventions.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

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
use x402_gateway::upstream::UpstreamDispatcher;

async fn test_state() -> Option<AppState> {
    let database_url = std::env::var("DATABASE_URL").ok()?;
    let rpc_url = std::env::var("FAST_RAIL_RPC_URL").ok()?;

    let config = Config {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        database_url: url::Url::parse(&database_url).unwrap(),
        database_pool_size: 5,
        pay_to_fast: "0x000000000000000000000000000000000000f1".to_string(),
        pay_to_slow_b: "slowBtestrecipient".to_string(),
        fast_rail_rpc_url: url::Url::parse(&rpc_url).unwrap(),
        fast_rail_stablecoin_address: "0x0000000000000000000000000000000000f457".to_string(),
        external_facilitator_url: url::Url::parse("http://127.0.0.1:9999").unwrap(),
        provider_secrets: HashMap::new(),
        provider_upstream_urls: HashMap::new(),
        dev_bypass_secret: None,
        dev_bypass_enabled: false,
        request_log_retention_days: 30,
    };

    let ledger = Arc::new(Ledger::connect(&database_url, 5).await.unwrap());
    ledger.run_migrations().await.unwrap();

    let stablecoin = config.fast_rail_stablecoin_address.parse().unwrap();
    let verifier = OnChainVerifier::new(config.fast_rail_rpc_url.as_str(), stablecoin).unwrap();
    let fast_facilitator = Arc::new(FastRailFacilitator::new(verifier, Arc::clone(&ledger)));
    let external_facilitator = Arc::new(ExternalFacilitatorClient::new(
        config.external_facilitator_url.clone(),
    ));
    let credentials = Arc::new(CredentialPool::new(HashMap::new()));
    let cache = Arc::new(TtlCache::new());
    let services = Arc::new(ServiceRegistry::load_embedded());
    let upstream = Arc::new(UpstreamDispatcher::new(
        Arc::clone(&cache),
        Arc::clone(&credentials),
        Arc::clone(&ledger),
    ));

    Some(AppState {
        config: Arc::new(config),
        services,
        ledger,
        fast_facilitator,
        external_facilitator,
        credentials,
        cache,
        rate_limiter: Arc::new(RateLimiter::new()),
        upstream,
        base_url: "http://127.0.0.1:0".to_string(),
    })
}

#[tokio::test]
#[ignore]
async fn unpaid_request_to_a_paid_route_gets_402_with_accepts() {
    let Some(state) = test_state().await else {
        return;
    };
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/crypto/price?pair=ETH-USD")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert!(response.headers().contains_key("PAYMENT-REQUIRED"));
}

#[tokio::test]
#[ignore]
async fn malformed_payment_header_is_treated_as_absent() {
    let Some(state) = test_state().await else {
        return;
    };
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/crypto/price?pair=ETH-USD")
                .header("x-payment", "not-valid-base64!!!")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
#[ignore]
async fn unknown_route_returns_404() {
    let Some(state) = test_state().await else {
        return;
    };
    let router = build_router(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/v1/does-not-exist")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
