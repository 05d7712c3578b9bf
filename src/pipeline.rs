//! Pipeline assembler: fixed middleware ordering, built from axum's
//! `Router::layer` stacking (`Router::new().merge(...).layer(...).layer(...)`).

use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::cache::TtlCache;
use crate::config::Config;
use crate::credential::CredentialPool;
use crate::facilitator::external::ExternalFacilitatorClient;
use crate::facilitator::fast::FastRailFacilitator;
use crate::handlers;
use crate::ledger::Ledger;
use crate::middleware::{dev_bypass, facilitator_mw, fast_rail, rate_limit, timeout};
use crate::middleware::rate_limit::RateLimiter;
use crate::service::ServiceRegistry;
use crate::upstream::UpstreamDispatcher;

/// Shared, cloneable application state threaded through every handler and middleware
/// via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Arc<ServiceRegistry>,
    pub ledger: Arc<Ledger>,
    pub fast_facilitator: Arc<FastRailFacilitator>,
    pub external_facilitator: Arc<ExternalFacilitatorClient>,
    pub credentials: Arc<CredentialPool>,
    pub cache: Arc<TtlCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub upstream: Arc<UpstreamDispatcher>,
    pub base_url: String,
}

/// Builds the full axum `Router`, wiring the fixed middleware order (outermost
/// first): a hard request-body-size ceiling -> tracing -> CORS -> request-id ->
/// rate limiter -> timeout enforcer -> dev-bypass -> fast-rail middleware ->
/// facilitator middleware -> handlers (the 402 advertiser runs inside the fallback
/// handler when no `PaymentContext` is present by the time it runs).
const MAX_REQUEST_BODY_BYTES: usize = 50 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    // Paid catalog routes are data, not statically registered paths: anything not
    // matched by a discovery endpoint above falls through to the generic dispatcher,
    // which consults the Service Registry itself.
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/v1/services", get(handlers::get_services))
        .route(
            "/.well-known/x402.json",
            get(handlers::get_well_known_manifest),
        )
        .route("/", get(handlers::get_root))
        .fallback(handlers::dispatch_paid_route)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            facilitator_mw::facilitator_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            fast_rail::fast_rail_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            dev_bypass::dev_bypass_middleware,
        ))
        .layer(middleware::from_fn(timeout::timeout_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn(crate::trace_id::assign_request_id))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}
