//! Request handler: serve records from a [`ContentStore`]

use async_trait::async_trait;
use hyper::header::{
    HeaderName, HeaderValue, ACCEPT_RANGES, ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, ETAG, LAST_MODIFIED,
};
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;

use crate::http::{
    body_from, empty, is_not_modified, requested_range, set_header, text_response, HeadContent,
    RangeOutcome, Req, Resp,
};
use crate::middleware::Handler;
use crate::path::{resolve, sanitize_path};
use crate::store::{ContentStore, FileRecord};
use crate::telemetry::{is_scrape, Telemetry};

/// Content never changes without a restart
pub const CACHE_CONTROL_VALUE: &str = "max-age=31536000";

pub const NOT_FOUND_BODY: &str = "404 page not found\n";

#[derive(Clone)]
pub struct ContentHandler {
    store: Arc<dyn ContentStore>,
}

impl ContentHandler {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Look up a raw request path, applying the directory-index rule.
    pub async fn find(&self, raw_path: &str) -> Option<Arc<FileRecord>> {
        let resolution = resolve(&sanitize_path(raw_path));
        for key in resolution.candidates() {
            if let Some(record) = self.store.lookup(key).await {
                return Some(record);
            }
        }
        None
    }
}

#[async_trait]
impl Handler for ContentHandler {
    async fn call(&self, req: Req) -> Resp {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            let mut resp = text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n");
            resp.headers_mut().insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return resp;
        }

        match self.find(req.uri().path()).await {
            Some(record) => serve_record(&req, &record),
            None => text_response(StatusCode::NOT_FOUND, NOT_FOUND_BODY),
        }
    }
}

/// Build the response for a hit: caching and validation headers, then the
/// body, a 304, or a single byte range.
pub fn serve_record<T>(req: &Request<T>, record: &FileRecord) -> Resp {
    let mut resp = Response::new(empty());
    let headers = resp.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    set_header(headers, LAST_MODIFIED, &record.http_date());
    set_header(headers, ETAG, &record.etag());

    if is_not_modified(req, record) {
        *resp.status_mut() = StatusCode::NOT_MODIFIED;
        return resp;
    }

    set_header(headers, CONTENT_TYPE, &record.content_type);
    headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));

    let len = record.len();
    let (status, range) = match requested_range(req, record) {
        RangeOutcome::Full => (StatusCode::OK, 0..len),
        RangeOutcome::Partial(range) => {
            set_header(
                headers,
                CONTENT_RANGE,
                &format!("bytes {}-{}/{}", range.start, range.end - 1, len),
            );
            (StatusCode::PARTIAL_CONTENT, range)
        }
        RangeOutcome::Unsatisfiable => {
            set_header(headers, CONTENT_RANGE, &format!("bytes */{}", len));
            (StatusCode::RANGE_NOT_SATISFIABLE, 0..0)
        }
    };
    headers.insert(CONTENT_LENGTH, HeaderValue::from(range.len()));
    *resp.status_mut() = status;

    if range.is_empty() {
        return resp;
    }
    let content = record.content.slice(range);
    if req.method() == Method::HEAD {
        resp.extensions_mut().insert(HeadContent(content));
    } else {
        *resp.body_mut() = body_from(content);
    }
    resp
}

/// Top of the handler stack: the scrape route (when metrics share the
/// content port), then content.
pub struct Routes {
    content: ContentHandler,
    scrape: Option<Telemetry>,
}

impl Routes {
    pub fn new(content: ContentHandler, scrape: Option<Telemetry>) -> Self {
        Self { content, scrape }
    }
}

#[async_trait]
impl Handler for Routes {
    async fn call(&self, req: Req) -> Resp {
        if let Some(telemetry) = &self.scrape {
            if is_scrape(&req) {
                return telemetry.scrape_response();
            }
        }
        self.content.call(req).await
    }
}
