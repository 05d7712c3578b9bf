//! Fast-rail payment middleware. Runs before the facilitator middleware
//! and short-circuits with a 402 on any fast-rail verification failure.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::chain::FAST_RAIL;
use crate::decimal::price_to_base_units;
use crate::facilitator::{Facilitator, PaymentPayload, PaymentRequirement, VerifyRequest, VerifyResponse};
use crate::ledger::RequestLogEntry;
use crate::payment_header::{self, Rail};
use crate::pipeline::AppState;

use super::{DevBypassed, PaymentContext, PaymentMethod};

const FAST_RAIL_LOG_SERVICE_ID: &str = "payment-fast";

pub async fn fast_rail_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let started = std::time::Instant::now();
    if req.extensions().get::<DevBypassed>().is_some()
        || req.extensions().get::<PaymentContext>().is_some()
    {
        return next.run(req).await;
    }

    let Some(header_value) = payment_header::extract_header_value(req.headers()).cloned() else {
        return next.run(req).await;
    };
    let Some(payload) = payment_header::decode(&header_value) else {
        return next.run(req).await;
    };
    if payload.rail() != Rail::Fast {
        return next.run(req).await;
    }

    let Some(service) = state.services.match_route(req.method(), req.uri().path()) else {
        return next.run(req).await;
    };
    let service = service.clone();

    let expected_amount = match price_to_base_units(&service.price, FAST_RAIL.decimals()) {
        Ok(amount) => amount,
        Err(_) => {
            return (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "catalog price is malformed" })),
            )
                .into_response();
        }
    };

    let tx_hash = payload
        .payload
        .get("txHash")
        .and_then(|v| v.as_str())
        .filter(|raw| raw.starts_with("0x"));
    let Some(tx_hash) = tx_hash else {
        return (
            axum::http::StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "error": "MegaETH-style payments require txHash in payload",
                "network": FAST_RAIL.caip2,
            })),
        )
            .into_response();
    };

    let verify_request = VerifyRequest {
        payload: PaymentPayload {
            raw: json!({ "txHash": tx_hash }),
        },
        requirement: PaymentRequirement {
            caip2: FAST_RAIL.caip2.to_string(),
            amount_base_units: expected_amount,
            pay_to: payload.accepted.pay_to.clone(),
        },
    };

    let outcome = state.fast_facilitator.verify(&verify_request).await;
    let response = match outcome {
        Ok(VerifyResponse::Valid { payer }) => {
            state
                .ledger
                .log_request(RequestLogEntry {
                    id: uuid::Uuid::now_v7(),
                    service_id: FAST_RAIL_LOG_SERVICE_ID.to_string(),
                    endpoint: req.uri().path().to_string(),
                    payer: Some(payer.clone()),
                    caip2: Some(FAST_RAIL.caip2.to_string()),
                    amount_base_units: Some(expected_amount.to_string()),
                    upstream_status: None,
                    latency_ms: started.elapsed().as_millis() as i64,
                    created_at: chrono::Utc::now(),
                })
                .await;
            req.extensions_mut().insert(PaymentContext {
                payer,
                caip2: FAST_RAIL.caip2.to_string(),
                amount_base_units: expected_amount.to_string(),
                proof_ref: tx_hash.to_string(),
                method: PaymentMethod::Direct,
            });
            return next.run(req).await;
        }
        Ok(VerifyResponse::Invalid { reason }) => (
            axum::http::StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "error": "Payment verification failed",
                "reason": reason,
                "network": FAST_RAIL.caip2,
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "fast rail facilitator error");
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "fast rail verification unavailable", "retryable": true })),
            )
                .into_response()
        }
    };
    response
}
