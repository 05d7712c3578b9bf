//! Rate limiter: three tiers by path class, keyed by client identity.
//!
//! Same `DashMap`-per-key counter shape as [`crate::credential::CredentialPool`] and
//! [`crate::cache::TtlCache`], rather than a dedicated rate-limiting crate.

use std::sync::atomic::{AtomicU32, AtomicU64};
use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use serde_json::json;

use crate::pipeline::AppState;

const WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Free,
    Paid,
    Expensive,
}

impl Tier {
    fn limit(self) -> u32 {
        match self {
            Tier::Free => 60,
            Tier::Paid => 300,
            Tier::Expensive => 10,
        }
    }
}

/// Classifies a path into a rate-limit tier. Paid, non-"expensive" categories default
/// to the `Paid` tier; compute-heavy categories (image/LLM/audio/video) are
/// `Expensive`; unmatched/free-route paths are `Free`.
pub fn classify_path(path: &str) -> Tier {
    const EXPENSIVE_PREFIXES: &[&str] = &[
        "/v1/image",
        "/v1/llm",
        "/v1/audio",
        "/v1/video",
    ];
    const PAID_PREFIXES: &[&str] = &[
        "/v1/crypto",
        "/v1/nft",
        "/v1/travel",
        "/v1/ipfs",
        "/v1/rpc",
    ];
    if EXPENSIVE_PREFIXES.iter().any(|p| path.starts_with(p)) {
        Tier::Expensive
    } else if PAID_PREFIXES.iter().any(|p| path.starts_with(p)) {
        Tier::Paid
    } else {
        Tier::Free
    }
}

struct Window {
    count: AtomicU32,
    window_start: AtomicU64,
}

/// In-process counters keyed by `(client_id, tier)`.
pub struct RateLimiter {
    windows: DashMap<(String, &'static str), Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Returns `true` if the call is admitted, `false` if the client is over its
    /// tier's per-minute limit.
    pub fn check(&self, client_id: &str, tier: Tier) -> bool {
        let tier_key = match tier {
            Tier::Free => "free",
            Tier::Paid => "paid",
            Tier::Expensive => "expensive",
        };
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let entry = self
            .windows
            .entry((client_id.to_string(), tier_key))
            .or_insert_with(|| Window {
                count: AtomicU32::new(0),
                window_start: AtomicU64::new(now),
            });

        let window_start = entry.window_start.load(Ordering::Relaxed);
        if now.saturating_sub(window_start) >= WINDOW_SECS {
            entry.window_start.store(now, Ordering::Relaxed);
            entry.count.store(0, Ordering::Relaxed);
        }

        let count = entry.count.fetch_add(1, Ordering::Relaxed) + 1;
        count <= tier.limit()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

fn client_identity(req: &Request) -> String {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let tier = classify_path(req.uri().path());
    let client_id = client_identity(&req);
    if !state.rate_limiter.check(&client_id, tier) {
        return (
            axum::http::StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "Rate limit exceeded" })),
        )
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_expensive_paths() {
        assert_eq!(classify_path("/v1/image/generate"), Tier::Expensive);
        assert_eq!(classify_path("/v1/llm/chat"), Tier::Expensive);
    }

    #[test]
    fn classifies_paid_paths() {
        assert_eq!(classify_path("/v1/crypto/price"), Tier::Paid);
    }

    #[test]
    fn defaults_to_free() {
        assert_eq!(classify_path("/health"), Tier::Free);
    }

    #[test]
    fn admits_until_limit_then_rejects() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert!(limiter.check("client-a", Tier::Expensive));
        }
        assert!(!limiter.check("client-a", Tier::Expensive));
    }

    #[test]
    fn separate_clients_have_separate_budgets() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert!(limiter.check("client-a", Tier::Expensive));
        }
        assert!(limiter.check("client-b", Tier::Expensive));
    }
}
