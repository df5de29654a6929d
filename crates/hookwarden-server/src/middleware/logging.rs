//! Request logging middleware.

use crate::webhook::{DELIVERY_HEADER, EVENT_HEADER};
use axum::{body::Body, extract::Request, http::Response};
use futures::future::BoxFuture;
use std::{
    task::{Context, Poll},
    time::Instant,
};
use tower::{Layer, Service};
use tracing::{info, info_span, warn, Instrument};

/// Polled by health checks often enough to drown everything else.
const UNLOGGED_PATHS: &[&str] = &["/healthz"];

/// Request logging layer.
#[derive(Clone, Default)]
pub struct LoggingLayer;

impl LoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingMiddleware { inner }
    }
}

#[derive(Clone)]
pub struct LoggingMiddleware<S> {
    inner: S,
}

fn header_str(req: &Request, name: &str) -> String {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_default()
}

impl<S> Service<Request> for LoggingMiddleware<S>
where
    S: Service<Request, Response = Response<Body>, Error = std::convert::Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Take the service that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let path = req.uri().path().to_string();
        if UNLOGGED_PATHS.contains(&path.as_str()) {
            return Box::pin(inner.call(req));
        }

        let method = req.method().clone();
        let request_id = header_str(&req, "x-request-id");
        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path,
            event = %header_str(&req, EVENT_HEADER),
            delivery = %header_str(&req, DELIVERY_HEADER),
        );

        Box::pin(
            async move {
                let start = Instant::now();
                let response = inner.call(req).await?;

                let status = response.status();
                let duration_ms = start.elapsed().as_millis() as u64;
                if status.is_server_error() {
                    warn!(status = status.as_u16(), duration_ms, "request_completed");
                } else {
                    info!(status = status.as_u16(), duration_ms, "request_completed");
                }

                Ok(response)
            }
            .instrument(span),
        )
    }
}
