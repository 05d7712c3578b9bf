//! Facilitator payment middleware: verifies slow-rail payments through
//! the external facilitator and settles after the upstream handler completes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::chain::{self, Rail as ChainRail};
use crate::decimal::price_to_base_units;
use crate::facilitator::{
    Facilitator, PaymentPayload, PaymentRequirement, SettleRequest, VerifyRequest, VerifyResponse,
};
use crate::payment_header::{self, Rail};
use crate::pipeline::AppState;

use super::{DevBypassed, PaymentContext, PaymentMethod};

pub async fn facilitator_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
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
    if matches!(payload.rail(), Rail::Unknown | Rail::Fast) {
        return next.run(req).await;
    }

    let Some(service) = state.services.match_route(req.method(), req.uri().path()) else {
        return next.run(req).await;
    };
    let service = service.clone();

    let Some(chain) = chain::lookup(&payload.accepted.caip2) else {
        return next.run(req).await;
    };

    let expected_amount = match price_to_base_units(&service.price, chain.decimals()) {
        Ok(amount) => amount,
        Err(_) => {
            return (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "catalog price is malformed" })),
            )
                .into_response();
        }
    };

    let requirement = PaymentRequirement {
        caip2: payload.accepted.caip2.clone(),
        amount_base_units: expected_amount,
        pay_to: payload.accepted.pay_to.clone(),
    };
    let verify_request = VerifyRequest {
        payload: PaymentPayload {
            raw: payload.payload.clone(),
        },
        requirement: requirement.clone(),
    };

    match state.external_facilitator.verify(&verify_request).await {
        Ok(VerifyResponse::Valid { payer }) => {
            req.extensions_mut().insert(PaymentContext {
                payer,
                caip2: payload.accepted.caip2.clone(),
                amount_base_units: expected_amount.to_string(),
                proof_ref: format!("{payer}:{}", payload.accepted.caip2),
                method: PaymentMethod::Facilitator,
            });
            let response = next.run(req).await;

            // Slow rails require an explicit settlement step; the fast rail's
            // settle() is a no-op handled entirely inside its own middleware.
            if matches!(chain.rail, ChainRail::SlowA | ChainRail::SlowB) {
                let settle_request = SettleRequest {
                    payload: PaymentPayload {
                        raw: payload.payload.clone(),
                    },
                    requirement,
                };
                let external = state.external_facilitator.clone();
                tokio::spawn(async move {
                    if let Err(err) = external.settle(&settle_request).await {
                        tracing::warn!(error = %err, "settlement failed after response was served");
                    }
                });
            }

            response
        }
        Ok(VerifyResponse::Invalid { reason }) => (
            axum::http::StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "error": "Payment verification failed",
                "reason": reason,
                "network": payload.accepted.caip2,
            })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "external facilitator error");
            (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "facilitator unavailable", "retryable": true })),
            )
                .into_response()
        }
    }
}
