//! Prometheus telemetry
//!
//! A private [`Registry`] (no global default registry) holding the request
//! counter and the latency histogram, rendered in the text exposition format.

use async_trait::async_trait;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Response, StatusCode};
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

use crate::http::{body_from, text_response, Req, Resp};
use crate::middleware::Handler;

/// Path label shared by every 404
pub const NOT_FOUND_LABEL: &str = "not_found";

/// Path label shared by every 405
pub const METHOD_NOT_ALLOWED_LABEL: &str = "method_not_allowed";

/// Path label for any other error status
pub const ERROR_LABEL: &str = "error";

pub const METRICS_PATH: &str = "/metrics";

#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
}

impl Telemetry {
    pub fn new(namespace: &str) -> anyhow::Result<Self> {
        let registry = Registry::new();

        let request_opts =
            Opts::new("http_requests_total", "HTTP responses grouped by path and status code")
                .namespace(namespace);
        let requests = IntCounterVec::new(request_opts, &["path", "code"])?;
        registry.register(Box::new(requests.clone()))?;

        let duration_opts = HistogramOpts::new(
            "http_request_duration_seconds",
            "Time spent producing a response, grouped by path",
        )
        .namespace(namespace);
        let duration = HistogramVec::new(duration_opts, &["path"])?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self { inner: Arc::new(TelemetryInner { registry, requests, duration }) })
    }

    /// Record one finished request.
    pub fn observe(&self, path: &str, status: StatusCode, elapsed: Duration) {
        let path = path_label(path, status);
        self.inner.requests.with_label_values(&[path, status.as_str()]).inc();
        self.inner.duration.with_label_values(&[path]).observe(elapsed.as_secs_f64());
    }

    pub fn request_count(&self, path: &str, status: StatusCode) -> u64 {
        self.inner.requests.with_label_values(&[path, status.as_str()]).get()
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<Vec<u8>> {
        let families = self.inner.registry.gather();
        let mut payload = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut payload)
            .map_err(|e| anyhow::anyhow!("failed to encode metrics: {}", e))?;
        if payload.is_empty() {
            payload.extend_from_slice(b"# no metrics available\n");
        }
        Ok(payload)
    }

    /// Response for a Prometheus scrape
    pub fn scrape_response(&self) -> Resp {
        match self.render() {
            Ok(payload) => {
                let len = payload.len();
                let mut resp = Response::new(body_from(payload));
                let headers = resp.headers_mut();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
                headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
                resp
            }
            Err(e) => {
                log::error!("{:#}", e);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n")
            }
        }
    }
}

/// Label for a request path. Only statuses produced for an existing record
/// keep the path, so the label set is bounded by the site's contents.
pub fn path_label(path: &str, status: StatusCode) -> &str {
    match status {
        StatusCode::NOT_FOUND => NOT_FOUND_LABEL,
        StatusCode::METHOD_NOT_ALLOWED => METHOD_NOT_ALLOWED_LABEL,
        StatusCode::NOT_MODIFIED | StatusCode::RANGE_NOT_SATISFIABLE => path,
        s if s.is_success() => path,
        _ => ERROR_LABEL,
    }
}

/// Handler for the dedicated metrics listener: `GET /metrics` or 404
pub struct MetricsEndpoint {
    telemetry: Telemetry,
}

impl MetricsEndpoint {
    pub fn new(telemetry: Telemetry) -> Self {
        Self { telemetry }
    }
}

/// Whether a request is a scrape of the metrics path
pub fn is_scrape(req: &Req) -> bool {
    req.method() == Method::GET && req.uri().path() == METRICS_PATH
}

#[async_trait]
impl Handler for MetricsEndpoint {
    async fn call(&self, req: Req) -> Resp {
        if is_scrape(&req) {
            self.telemetry.scrape_response()
        } else {
            text_response(StatusCode::NOT_FOUND, "404 page not found\n")
        }
    }
}
