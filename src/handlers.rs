//! Discovery endpoints: health check, service catalog, and the x402 well-known
//! manifest. Not part of the payment enforcement pipeline itself.

use axum::extract::{Request, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::instrument;

use crate::advertiser::build_payment_required;
use crate::error::GatewayError;
use crate::middleware::PaymentContext;
use crate::pipeline::AppState;

#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    let pkg_name = env!("CARGO_PKG_NAME");
    Json(json!({ "service": pkg_name, "version": env!("CARGO_PKG_VERSION") }))
}

#[instrument(skip_all)]
pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.stats().await {
        Ok(stats) => Json(json!({
            "status": "ok",
            "total_requests": stats.total_requests,
            "requests_last_day": stats.requests_last_day,
            "total_used_proofs": stats.total_used_proofs,
        }))
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "ledger unavailable during health check");
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded" })),
            )
                .into_response()
        }
    }
}

/// `GET /v1/services`: lists the priced catalog, with a fully-built 402 requirement
/// set per service so a client can discover pricing without first being rejected.
#[instrument(skip_all)]
pub async fn get_services(State(state): State<AppState>) -> impl IntoResponse {
    let entries: Vec<_> = state
        .services
        .all()
        .iter()
        .map(|service| {
            let requirements = build_payment_required(service, &state.base_url, &state.config);
            json!({
                "id": service.id,
                "display_name": service.display_name,
                "description": service.description,
                "method": service.method,
                "path": service.path,
                "category": service.category,
                "mime_type": service.mime_type,
                "accepts": requirements.accepts,
            })
        })
        .collect();
    Json(json!({ "services": entries }))
}

/// `GET /.well-known/x402.json`: the x402 discovery manifest, listing all fast-rail
/// and slow-rail chains this gateway accepts payments on.
#[instrument(skip_all)]
pub async fn get_well_known_manifest(State(state): State<AppState>) -> impl IntoResponse {
    let chains: Vec<_> = crate::chain::all()
        .iter()
        .map(|chain| {
            json!({
                "caip2": chain.caip2,
                "displayName": chain.display_name,
                "asset": chain.stablecoin.contract_address,
                "decimals": chain.stablecoin.decimals,
            })
        })
        .collect();
    Json(json!({
        "x402Version": 2,
        "facilitator": state.config.external_facilitator_url.to_string(),
        "chains": chains,
    }))
}

/// Uniform handler for every paid route. Route matching
/// against the service catalog happens here rather than per-route axum registration,
/// since the catalog is data, not code.
///
/// If the fast-rail/facilitator middlewares already marked this request paid, this
/// dispatches to the upstream handler. Otherwise it returns the 402 payment-required
/// response built by the advertiser.
#[instrument(skip_all)]
pub async fn dispatch_paid_route(State(state): State<AppState>, req: Request) -> Response {
    let Some(service) = state
        .services
        .match_route(req.method(), req.uri().path())
        .cloned()
    else {
        return GatewayError::NotFound(format!("no such route: {}", req.uri().path())).into_response();
    };

    let payment = req.extensions().get::<PaymentContext>().cloned();
    let Some(payment) = payment else {
        let body = build_payment_required(&service, &state.base_url, &state.config);
        let header_value = crate::advertiser::encode_header_value(&body);
        return GatewayError::PaymentRequired { header_value }.into_response();
    };

    let input = match extract_input(req).await {
        Ok(value) => value,
        Err(err) => return err.into_response(),
    };
    if let Err(reason) = service.validate_input(&input) {
        return GatewayError::BadRequest(reason).into_response();
    }
    let cache_key = format!("{}:{}", service.id, input);

    match state
        .upstream
        .dispatch(
            &service,
            &cache_key,
            &input,
            Some(payment.payer.clone()),
            Some(payment.caip2.clone()),
            Some(payment.amount_base_units.clone()),
        )
        .await
    {
        Ok(value) => Json(value).into_response(),
        Err(err) => err.into_response(),
    }
}

const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;
const TRANSCRIPTION_BODY_LIMIT_BYTES: usize = 50 * 1024 * 1024;

/// Per-route body size cap.
fn body_limit_for(path: &str) -> usize {
    if path.starts_with("/v1/audio/transcribe") {
        TRANSCRIPTION_BODY_LIMIT_BYTES
    } else {
        DEFAULT_BODY_LIMIT_BYTES
    }
}

/// Extracts the JSON input for a paid route: the query string for `GET` requests (as
/// a flat object of string values), the JSON body for `POST` requests. Malformed
/// input yields a 400.
async fn extract_input(req: Request) -> Result<serde_json::Value, GatewayError> {
    if req.method() == axum::http::Method::GET {
        let query = req.uri().query().unwrap_or("");
        let mut map = serde_json::Map::new();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            map.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        }
        return Ok(serde_json::Value::Object(map));
    }

    let limit = body_limit_for(req.uri().path());
    let bytes = axum::body::to_bytes(req.into_body(), limit)
        .await
        .map_err(|e| GatewayError::BadRequest(format!("failed to read request body: {e}")))?;
    if bytes.is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::BadRequest(format!("malformed JSON body: {e}")))
}
