//! The gateway's error taxonomy and its mapping onto HTTP responses.
//!
//! Every middleware and handler returns a [`GatewayError`] on failure rather than
//! throwing; the [`IntoResponse`] impl below performs the kind -> status/body mapping
//! in one place.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::onchain::VerificationFailure;

/// Discriminated error kinds, one per row of taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// No payment header present for a priced route; caller must consult the
    /// `PAYMENT-REQUIRED` header built by the advertiser.
    #[error("payment required")]
    PaymentRequired { header_value: String },

    /// A payment header was present but lacked the rail-specific proof field
    /// (e.g. fast-rail payload missing `txHash`).
    #[error("payment proof missing: {hint}")]
    PaymentMissingProof { hint: &'static str },

    /// Payment verification ran and rejected the proof.
    #[error("payment rejected: {reason}")]
    PaymentRejected {
        reason: VerificationFailure,
        network: String,
    },

    #[error("rate limited")]
    RateLimited,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("timeout after {elapsed_ms}ms (deadline {timeout_ms}ms)")]
    Timeout { timeout_ms: u64, elapsed_ms: u64 },

    #[error("upstream not configured: {0}")]
    UpstreamNotConfigured(String),

    #[error("internal error")]
    Internal(#[source] Option<anyhow::Error>),
}

impl GatewayError {
    pub fn internal<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        GatewayError::Internal(Some(anyhow::Error::new(err)))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::PaymentRequired { header_value } => {
                let mut response = (StatusCode::PAYMENT_REQUIRED, Json(json!({}))).into_response();
                if let Ok(value) = HeaderValue::from_str(&header_value) {
                    response.headers_mut().insert("PAYMENT-REQUIRED", value);
                }
                response
            }
            GatewayError::PaymentMissingProof { hint } => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "error": "Payment proof missing", "hint": hint })),
            )
                .into_response(),
            GatewayError::PaymentRejected { reason, network } => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({
                    "error": "Payment verification failed",
                    "reason": reason,
                    "network": network,
                })),
            )
                .into_response(),
            GatewayError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Rate limit exceeded" })),
            )
                .into_response(),
            GatewayError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            GatewayError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            GatewayError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized" })),
            )
                .into_response(),
            GatewayError::UpstreamUnavailable(msg) => {
                let mut response = (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": msg, "retryable": true })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert("Retry-After", HeaderValue::from_static("2"));
                response
            }
            GatewayError::Timeout {
                timeout_ms,
                elapsed_ms,
            } => (
                StatusCode::REQUEST_TIMEOUT,
                Json(json!({
                    "error": "Request timed out",
                    "retryable": true,
                    "timeout_ms": timeout_ms,
                    "elapsed_ms": elapsed_ms,
                })),
            )
                .into_response(),
            GatewayError::UpstreamNotConfigured(msg) => {
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": msg }))).into_response()
            }
            GatewayError::Internal(source) => {
                if let Some(err) = &source {
                    tracing::error!(error = %err, "internal error");
                }
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({ "error": "Internal error", "retryable": true })),
                )
                    .into_response()
            }
        }
    }
}
