//! Request-timeout enforcer: a per-path-prefix deadline implemented with
//! `tokio::time::timeout`, cancelling the wrapped future (and any in-flight
//! RPC/HTTP/DB call within it) on expiry.

use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Deadline for a given path table.
fn deadline_for(path: &str) -> Duration {
    const LLM_PREFIX: &str = "/v1/llm";
    const VIDEO_PREFIX: &str = "/v1/video";
    const MEDIUM_PREFIXES: &[&str] = &["/v1/image", "/v1/audio", "/v1/code"];
    const SHORT_PREFIXES: &[&str] = &["/v1/travel", "/v1/ipfs"];

    if path.starts_with(LLM_PREFIX) {
        Duration::from_secs(180)
    } else if path.starts_with(VIDEO_PREFIX) {
        Duration::from_secs(300)
    } else if MEDIUM_PREFIXES.iter().any(|p| path.starts_with(p)) {
        Duration::from_secs(90)
    } else if SHORT_PREFIXES.iter().any(|p| path.starts_with(p)) {
        Duration::from_secs(60)
    } else {
        Duration::from_secs(30)
    }
}

pub async fn timeout_middleware(req: Request, next: Next) -> Response {
    let deadline = deadline_for(req.uri().path());
    let started = Instant::now();
    match tokio::time::timeout(deadline, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            (
                axum::http::StatusCode::REQUEST_TIMEOUT,
                Json(json!({
                    "error": "Request timed out",
                    "retryable": true,
                    "timeout_ms": deadline.as_millis() as u64,
                    "elapsed_ms": elapsed_ms,
                })),
            )
                .into_response()
        }
    }
}
