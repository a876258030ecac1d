//! Gzip response compression

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression as Level;
use http_body_util::BodyExt;
use hyper::header::{
    HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, VARY,
};
use hyper::{Response, StatusCode};
use std::io::Write;

use super::Handler;
use crate::config::ContentConfig;
use crate::http::{body_from, empty, HeadContent, Req, Resp};

pub struct Compression<H> {
    inner: H,
    enabled: bool,
    min_bytes: usize,
}

impl<H: Handler> Compression<H> {
    pub fn new(inner: H, enabled: bool, min_bytes: usize) -> Self {
        Self { inner, enabled, min_bytes }
    }

    pub fn from_config(inner: H, config: &ContentConfig) -> Self {
        Self::new(inner, config.gzip, config.gzip_min_bytes)
    }
}

#[async_trait]
impl<H: Handler> Handler for Compression<H> {
    async fn call(&self, req: Req) -> Resp {
        let accept_gzip = accepts_gzip(req.headers());
        let mut resp = self.inner.call(req).await;

        if !self.enabled || !compressible(&resp) {
            return resp;
        }
        // The representation depends on Accept-Encoding even when this
        // client gets it uncompressed
        resp.headers_mut().append(VARY, HeaderValue::from_static("Accept-Encoding"));
        if !accept_gzip {
            return resp;
        }
        gzip(resp, self.min_bytes).await
    }
}

/// Decided from status and headers alone, so a HEAD response gets the same
/// treatment as the matching GET.
fn compressible(resp: &Resp) -> bool {
    let status = resp.status();
    let carries_body = !status.is_informational()
        && !matches!(
            status,
            StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED | StatusCode::PARTIAL_CONTENT
        );
    carries_body
        && !resp.headers().contains_key(CONTENT_ENCODING)
        && resp.headers().get(CONTENT_LENGTH).map_or(true, |len| len.as_bytes() != b"0")
}

/// Whether `Accept-Encoding` allows gzip (explicitly or via `*`, with q > 0).
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|item| {
            let mut params = item.split(';');
            let coding = params.next().unwrap_or_default().trim();
            let known = coding.eq_ignore_ascii_case("gzip")
                || coding.eq_ignore_ascii_case("x-gzip")
                || coding == "*";
            if !known {
                return false;
            }
            let quality = params
                .filter_map(|p| p.trim().strip_prefix("q="))
                .next()
                .and_then(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            quality > 0.0
        })
}

async fn gzip(resp: Resp, min_bytes: usize) -> Resp {
    let (mut parts, body) = resp.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };
    // HEAD: encode what the GET would send, to report its length
    let head = parts.extensions.remove::<HeadContent>();
    let plain = match &head {
        Some(HeadContent(content)) => content.clone(),
        None => bytes.clone(),
    };
    if plain.is_empty() || plain.len() < min_bytes {
        return Response::from_parts(parts, body_from(bytes));
    }

    let mut encoder = GzEncoder::new(Vec::with_capacity(plain.len() / 2 + 32), Level::default());
    let compressed = match encoder.write_all(&plain).and_then(|_| encoder.finish()) {
        Ok(compressed) => compressed,
        Err(e) => {
            log::warn!("gzip failed, sending identity body: {}", e);
            return Response::from_parts(parts, body_from(bytes));
        }
    };

    parts.headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(compressed.len()));
    let body = if head.is_some() { empty() } else { body_from(compressed) };
    Response::from_parts(parts, body)
}
