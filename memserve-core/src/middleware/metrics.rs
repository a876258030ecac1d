use async_trait::async_trait;
use std::time::Instant;

use super::Handler;
use crate::http::{Req, Resp};
use crate::path::sanitize_path;
use crate::telemetry::Telemetry;

/// Records request count and latency per path
pub struct Metrics<H> {
    inner: H,
    telemetry: Telemetry,
}

impl<H: Handler> Metrics<H> {
    pub fn new(inner: H, telemetry: Telemetry) -> Self {
        Self { inner, telemetry }
    }
}

#[async_trait]
impl<H: Handler> Handler for Metrics<H> {
    async fn call(&self, req: Req) -> Resp {
        let path = sanitize_path(req.uri().path());
        let started = Instant::now();
        let resp = self.inner.call(req).await;
        self.telemetry.observe(&path, resp.status(), started.elapsed());
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::ContentHandler;
    use crate::http::text_response;
    use crate::store::{FileRecord, MemoryStore};
    use hyper::{Method, Request, StatusCode};
    use std::sync::Arc;
    use std::time::SystemTime;

    struct Status(StatusCode);

    #[async_trait]
    impl Handler for Status {
        async fn call(&self, _req: Req) -> Resp {
            text_response(self.0, "x")
        }
    }

    #[tokio::test]
    async fn test_records_requests() {
        let telemetry = Telemetry::new("test").unwrap();
        let layer = Metrics::new(Status(StatusCode::OK), telemetry.clone());

        for _ in 0..2 {
            let req = Request::builder().uri("/post/hello.html?x=1").body(()).unwrap();
            assert_eq!(layer.call(req).await.status(), StatusCode::OK);
        }

        assert_eq!(telemetry.request_count("/post/hello.html", StatusCode::OK), 2);
        let text = String::from_utf8(telemetry.render().unwrap()).unwrap();
        assert!(text.contains("test_http_request_duration_seconds_count{path=\"/post/hello.html\"} 2"));
    }

    #[tokio::test]
    async fn test_not_found_collapses_label() {
        let telemetry = Telemetry::new("test").unwrap();
        let layer = Metrics::new(Status(StatusCode::NOT_FOUND), telemetry.clone());

        for path in ["/a", "/b", "/c"] {
            layer.call(Request::builder().uri(path).body(()).unwrap()).await;
        }
        assert_eq!(telemetry.request_count("not_found", StatusCode::NOT_FOUND), 3);
        assert_eq!(telemetry.request_count("/a", StatusCode::NOT_FOUND), 0);
    }

    #[tokio::test]
    async fn test_unknown_paths_share_bounded_labels() {
        let store = MemoryStore::from_records([FileRecord::new(
            "/index.html",
            "<h1>Home</h1>",
            SystemTime::now(),
        )]);
        let telemetry = Telemetry::new("test").unwrap();
        let layer = Metrics::new(ContentHandler::new(Arc::new(store)), telemetry.clone());

        for i in 0..200 {
            let post = Request::builder()
                .method(Method::POST)
                .uri(format!("/random-{i}"))
                .body(())
                .unwrap();
            assert_eq!(layer.call(post).await.status(), StatusCode::METHOD_NOT_ALLOWED);
            let get = Request::builder().uri(format!("/missing-{i}")).body(()).unwrap();
            assert_eq!(layer.call(get).await.status(), StatusCode::NOT_FOUND);
        }
        layer.call(Request::builder().uri("/index.html").body(()).unwrap()).await;

        let text = String::from_utf8(telemetry.render().unwrap()).unwrap();
        let series = text.lines().filter(|l| l.starts_with("test_http_requests_total{")).count();
        assert_eq!(series, 3);
        let rejected = telemetry.request_count("method_not_allowed", StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(rejected, 200);
        assert_eq!(telemetry.request_count("not_found", StatusCode::NOT_FOUND), 200);
        assert_eq!(telemetry.request_count("/index.html", StatusCode::OK), 1);
    }
}
