//! Dev-bypass gate: a constant-time equality check of a configured
//! secret against a specific header, active only when the environment flag is set.
//! When matched, all payment middlewares downstream are skipped.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::pipeline::AppState;

use super::DevBypassed;

const DEV_BYPASS_HEADER: &str = "x-dev-bypass";

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub async fn dev_bypass_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let mut bypassed = false;
    if state.config.dev_bypass_enabled {
        if let Some(expected) = &state.config.dev_bypass_secret {
            let presented = req
                .headers()
                .get(DEV_BYPASS_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
                req.extensions_mut().insert(DevBypassed);
                tracing::warn!("request admitted via dev bypass");
                bypassed = true;
            }
        }
    }
    let mut response = next.run(req).await;
    if bypassed {
        response.headers_mut().insert(
            "x-dev-bypass-active",
            axum::http::HeaderValue::from_static("true"),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_secrets_match() {
        assert!(constant_time_eq(b"secret", b"secret"));
    }

    #[test]
    fn different_length_does_not_match() {
        assert!(!constant_time_eq(b"secret", b"secrets"));
    }

    #[test]
    fn different_content_does_not_match() {
        assert!(!constant_time_eq(b"secreu", b"secret"));
    }
}
