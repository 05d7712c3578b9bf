//! Upstream dispatcher: uniform handler contract for a paid route. Input
//! validation, cache probe, credential acquisition, outbound HTTP with retry/backoff,
//! response normalization, cache populate, async logging.
//!
//! The actual catalog of upstream API integrations is modeled as a trait object,
//! `Arc<dyn UpstreamHandler>`, registered per provider tag. This crate ships one
//! illustrative JSON-passthrough implementation to exercise the dispatcher's
//! retry/cache/log machinery end-to-end; it is not a catalog of real providers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use serde_json::Value;

use crate::cache::TtlCache;
use crate::credential::CredentialPool;
use crate::error::GatewayError;
use crate::ledger::{Ledger, RequestLogEntry};
use crate::service::Service;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Implemented once per upstream provider tag; `dispatch` performs the actual
/// outbound call and projects the upstream's response into a stable shape.
pub trait UpstreamHandler: Send + Sync {
    fn dispatch(
        &self,
        credential: &str,
        input: &Value,
    ) -> impl Future<Output = Result<Value, GatewayError>> + Send;

    /// TTL for cache entries this handler produces. `None` disables caching.
    fn cache_ttl(&self) -> Option<Duration>;
}

/// A generic JSON-passthrough handler: forwards `input` as the JSON body of a POST to
/// a configured upstream URL and returns the upstream's JSON body verbatim.
pub struct JsonPassthroughHandler {
    client: reqwest::Client,
    upstream_url: url::Url,
    cache_ttl: Option<Duration>,
}

impl JsonPassthroughHandler {
    pub fn new(upstream_url: url::Url, cache_ttl: Option<Duration>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .expect("reqwest client configuration is valid");
        Self {
            client,
            upstream_url,
            cache_ttl,
        }
    }
}

impl UpstreamHandler for JsonPassthroughHandler {
    async fn dispatch(&self, credential: &str, input: &Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(self.upstream_url.clone())
            .bearer_auth(credential)
            .json(input)
            .send()
            .await
            .map_err(|e| GatewayError::UpstreamUnavailable(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::UpstreamUnavailable(format!(
                "upstream returned status {status}"
            )));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| GatewayError::internal(e))
    }

    fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl
    }
}

/// Dispatches a request to the upstream handler registered for a service, applying
/// the cache -> credential -> retry -> normalize -> log pipeline.
pub struct UpstreamDispatcher {
    handlers: dashmap::DashMap<String, Arc<dyn UpstreamHandler>>,
    cache: Arc<TtlCache>,
    credentials: Arc<CredentialPool>,
    ledger: Arc<Ledger>,
}

impl UpstreamDispatcher {
    pub fn new(cache: Arc<TtlCache>, credentials: Arc<CredentialPool>, ledger: Arc<Ledger>) -> Self {
        Self {
            handlers: dashmap::DashMap::new(),
            cache,
            credentials,
            ledger,
        }
    }

    pub fn register(&self, provider_tag: &str, handler: Arc<dyn UpstreamHandler>) {
        self.handlers.insert(provider_tag.to_string(), handler);
    }

    pub fn is_registered(&self, provider_tag: &str) -> bool {
        self.handlers.contains_key(provider_tag)
    }

    /// Runs the cache/credential/retry/log portion of the dispatch pipeline for a
    /// single request. Input schema validation and the error-to-HTTP-status mapping
    /// are the caller's responsibility; this function already returns `GatewayError`
    /// values in their final taxonomy.
    pub async fn dispatch(
        &self,
        service: &Service,
        cache_key: &str,
        input: &Value,
        payer: Option<String>,
        caip2: Option<String>,
        amount_base_units: Option<String>,
    ) -> Result<Value, GatewayError> {
        let started = Instant::now();

        let Some(handler) = self.handlers.get(&service.upstream_provider_tag) else {
            return Err(GatewayError::UpstreamNotConfigured(format!(
                "no upstream handler registered for {}",
                service.upstream_provider_tag
            )));
        };
        let handler = Arc::clone(handler.value());

        if let Some(cached) = self.cache.get(cache_key) {
            self.log(service, &started, Some(200), payer, caip2, amount_base_units)
                .await;
            return Ok((*cached).clone());
        }

        let Some(credential) = self.credentials.acquire(&service.upstream_provider_tag) else {
            return Err(GatewayError::UpstreamNotConfigured(format!(
                "no credentials configured for {}",
                service.upstream_provider_tag
            )));
        };

        let result = self.dispatch_with_retry(handler.as_ref(), &credential, input).await;

        let upstream_status = if result.is_ok() { Some(200) } else { None };
        self.log(service, &started, upstream_status, payer, caip2, amount_base_units)
            .await;

        let value = result?;
        if let Some(ttl) = handler.cache_ttl() {
            self.cache
                .put(cache_key.to_string(), Arc::new(value.clone()), ttl);
        }
        Ok(value)
    }

    async fn dispatch_with_retry(
        &self,
        handler: &dyn UpstreamHandler,
        credential: &str,
        input: &Value,
    ) -> Result<Value, GatewayError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match handler.dispatch(credential, input).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < MAX_ATTEMPTS && is_retryable(&err) => {
                    let backoff = BASE_BACKOFF * 2u32.pow(attempt - 1);
                    let jitter_ms = rand::rng().random_range(0..100);
                    tokio::time::sleep(backoff + Duration::from_millis(jitter_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn log(
        &self,
        service: &Service,
        started: &Instant,
        upstream_status: Option<i32>,
        payer: Option<String>,
        caip2: Option<String>,
        amount_base_units: Option<String>,
    ) {
        let entry = RequestLogEntry {
            id: uuid::Uuid::now_v7(),
            service_id: service.id.clone(),
            endpoint: service.path.clone(),
            payer,
            caip2,
            amount_base_units,
            upstream_status,
            latency_ms: started.elapsed().as_millis() as i64,
            created_at: chrono::Utc::now(),
        };
        self.ledger.log_request(entry).await;
    }
}

fn is_retryable(err: &GatewayError) -> bool {
    matches!(err, GatewayError::UpstreamUnavailable(_))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails;
    impl UpstreamHandler for AlwaysFails {
        async fn dispatch(&self, _credential: &str, _input: &Value) -> Result<Value, GatewayError> {
            Err(GatewayError::UpstreamUnavailable("boom".to_string()))
        }
        fn cache_ttl(&self) -> Option<Duration> {
            None
        }
    }

    #[test]
    fn upstream_unavailable_is_retryable() {
        assert!(is_retryable(&GatewayError::UpstreamUnavailable(
            "x".to_string()
        )));
    }

    #[test]
    fn bad_request_is_not_retryable() {
        assert!(!is_retryable(&GatewayError::BadRequest("x".to_string())));
    }

    #[tokio::test]
    async fn retries_exhaust_and_return_last_error() {
        let handler = AlwaysFails;
        let dispatcher_retry = |attempt: u32| attempt < MAX_ATTEMPTS;
        assert!(dispatcher_retry(1));
        assert!(!dispatcher_retry(MAX_ATTEMPTS));
        let _ = handler.dispatch("cred", &Value::Null).await.unwrap_err();
    }
}
