//! Access log in combined log format
//!
//! One line per request on the `memserve::access` log target, so operators
//! can route or silence it with `RUST_LOG=memserve::access=off`.

use async_trait::async_trait;
use http_body::Body as _;
use hyper::header::{HeaderName, REFERER, USER_AGENT};
use hyper::Request;

use super::Handler;
use crate::http::{resolve_client_ip, PeerAddr, Req, Resp, TrustedProxies};
use crate::path::strip_control;

pub const ACCESS_TARGET: &str = "memserve::access";

const TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

pub struct AccessLog<H> {
    inner: H,
    trusted: TrustedProxies,
}

impl<H: Handler> AccessLog<H> {
    pub fn new(inner: H, trusted: TrustedProxies) -> Self {
        Self { inner, trusted }
    }
}

#[async_trait]
impl<H: Handler> Handler for AccessLog<H> {
    async fn call(&self, req: Req) -> Resp {
        let started = chrono::Utc::now();
        let peer = req.extensions().get::<PeerAddr>().map(|p| p.0);
        let client = resolve_client_ip(&req, peer, &self.trusted);
        let request_line = format!(
            "{} {} {:?}",
            req.method(),
            strip_control(&req.uri().to_string()),
            req.version()
        );
        let referer = quoted_header(&req, REFERER);
        let agent = quoted_header(&req, USER_AGENT);

        let resp = self.inner.call(req).await;

        let bytes = resp
            .body()
            .size_hint()
            .exact()
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        log::info!(
            target: ACCESS_TARGET,
            "{} - - [{}] \"{}\" {} {} \"{}\" \"{}\"",
            client,
            started.format(TIME_FORMAT),
            escape(&request_line),
            resp.status().as_u16(),
            bytes,
            referer,
            agent
        );
        resp
    }
}

fn quoted_header<T>(req: &Request<T>, name: HeaderName) -> String {
    match req.headers().get(name) {
        Some(value) => escape(&String::from_utf8_lossy(value.as_bytes())),
        None => "-".to_string(),
    }
}

/// Strip control characters and escape quotes for a quoted log field.
pub fn escape(field: &str) -> String {
    strip_control(field).replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::text_response;
    use hyper::StatusCode;

    struct Ok200;

    #[async_trait]
    impl Handler for Ok200 {
        async fn call(&self, _req: Req) -> Resp {
            text_response(StatusCode::OK, "<h1>Home</h1>")
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("curl/8.0"), "curl/8.0");
        assert_eq!(escape("a\"b"), "a\\\"b");
        assert_eq!(escape("evil\r\nline"), "evilline");
    }

    #[test]
    fn test_quoted_header_defaults_to_dash() {
        let req = Request::builder()
            .uri("/")
            .header(USER_AGENT, "Mozilla/5.0 \"x\"")
            .body(())
            .unwrap();
        assert_eq!(quoted_header(&req, REFERER), "-");
        assert_eq!(quoted_header(&req, USER_AGENT), "Mozilla/5.0 \\\"x\\\"");
    }

    #[tokio::test]
    async fn test_passes_response_through() {
        let layer = AccessLog::new(Ok200, TrustedProxies::defaults());
        let mut req = Request::builder().uri("/index.html").body(()).unwrap();
        req.extensions_mut().insert(PeerAddr("127.0.0.1:5000".parse().unwrap()));
        let resp = layer.call(req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body().size_hint().exact(), Some(13));
    }
}
