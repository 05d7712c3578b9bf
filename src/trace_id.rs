//! Request-ID middleware: assigns a UUIDv7 request id to every inbound
//! request, carried in `tracing` spans and echoed back as a response header.

use axum::http::{HeaderValue, Request};
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct TraceId(pub String);

#[derive(Clone)]
pub struct TraceIdLayer;

impl<S> Layer<S> for TraceIdLayer {
    type Service = RequestIdService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestIdService { inner }
    }
}

#[derive(Clone)]
pub struct RequestIdService<S> {
    inner: S,
}

impl<S, B> Service<Request<B>> for RequestIdService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        let request_id = Uuid::now_v7().to_string();
        req.extensions_mut().insert(crate::trace_id::TraceId(request_id));
        self.inner.call(req)
    }
}

/// Functional equivalent of [`TraceIdLayer`] expressed as `axum::middleware::from_fn`,
/// for call sites that build the stack with `middleware::from_fn` rather than raw
/// `tower::Layer`s. Also stamps the id onto the response so callers can correlate
/// their request with server-side logs.
pub async fn assign_request_id(
    mut req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = Uuid::now_v7().to_string();
    req.extensions_mut().insert(TraceId(request_id.clone()));
    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
