//! HTTP utility functions for the hyper-based server
//!
//! Type aliases shared by the handler chain, small response builders, and
//! client address resolution behind reverse proxies.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use ipnet::IpNet;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::path::strip_control;

/// Common HTTP type aliases for the handler chain.
///
/// Request bodies are never read, so the chain works on `Request<()>`.
pub type RespBody = BoxBody<Bytes, Infallible>;
pub type Req = Request<()>;
pub type Resp = Response<RespBody>;

/// The bytes a GET would carry, attached to HEAD responses so outer layers
/// can size an encoded representation without a body to read.
#[derive(Debug, Clone)]
pub struct HeadContent(pub Bytes);

/// Create a response body from any data that can be converted to Bytes
pub fn body_from<T: Into<Bytes>>(data: T) -> RespBody {
    Full::new(data.into()).boxed()
}

pub fn empty() -> RespBody {
    Empty::<Bytes>::new().boxed()
}

/// Plain text response with `Content-Type`, `Content-Length` and `nosniff`.
pub fn text_response(status: StatusCode, body: &'static str) -> Resp {
    let mut resp = Response::new(body_from(body));
    *resp.status_mut() = status;
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    resp
}

/// Insert a header built from a runtime string.
///
/// Values that are not valid header text are dropped with a warning.
pub fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => log::warn!("Dropping invalid {} header value {:?}", name, value),
    }
}

/// Socket address of the connection a request arrived on.
///
/// Inserted as a request extension by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr(pub SocketAddr);

/// Proxy addresses trusted to set `X-Forwarded-For` / `X-Real-IP`
pub const DEFAULT_TRUSTED_PROXIES: &[&str] =
    &["127.0.0.0/8", "::1/128", "10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16", "fc00::/7"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies {
    nets: Vec<IpNet>,
}

impl TrustedProxies {
    /// Parse CIDR blocks. A bare address is treated as a single-host network.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> anyhow::Result<Self> {
        let mut nets = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.as_ref().trim();
            let net = match entry.parse::<IpNet>() {
                Ok(net) => net,
                Err(_) => entry
                    .parse::<IpAddr>()
                    .map(IpNet::from)
                    .map_err(|_| anyhow::anyhow!("invalid trusted proxy '{}'", entry))?,
            };
            nets.push(net);
        }
        Ok(Self { nets })
    }

    /// Loopback and private networks
    pub fn defaults() -> Self {
        // The defaults are constants known to parse
        Self::parse(DEFAULT_TRUSTED_PROXIES).unwrap_or_default()
    }

    /// Trust no proxy: always log the socket peer.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.nets.iter().any(|net| net.contains(&ip))
    }
}

/// Extract client IP from proxy headers (`X-Forwarded-For`, `X-Real-IP`).
///
/// Returns `Some(ip)` only if a proxy header is present. These headers are
/// trivially spoofed; see [`resolve_client_ip`] for the trusted wrapper.
pub fn extract_client_ip<T>(req: &Request<T>) -> Option<String> {
    // Check X-Forwarded-For header first, the left-most hop is the client
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            if let Some(first_ip) = forwarded_str.split(',').next() {
                let trimmed = first_ip.trim();
                if !trimmed.is_empty() {
                    return Some(strip_control(trimmed).into_owned());
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            let trimmed = ip_str.trim();
            if !trimmed.is_empty() {
                return Some(strip_control(trimmed).into_owned());
            }
        }
    }

    None
}

/// Resolve the real client IP.
///
/// Proxy headers are only honored when `remote_addr` is in `trusted`.
/// Without a known peer the proxy headers are ignored and `-` is returned.
pub fn resolve_client_ip<T>(
    req: &Request<T>,
    remote_addr: Option<SocketAddr>,
    trusted: &TrustedProxies,
) -> String {
    let Some(remote_addr) = remote_addr else {
        return "-".to_string();
    };
    let ip = remote_addr.ip().to_canonical();

    if trusted.contains(ip) {
        extract_client_ip(req).unwrap_or_else(|| ip.to_string())
    } else {
        ip.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_extract_prefers_forwarded_for() {
        let req = request(&[
            ("x-forwarded-for", "203.0.113.7, 10.0.0.2"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(extract_client_ip(&req).as_deref(), Some("203.0.113.7"));

        let req = request(&[("x-real-ip", "198.51.100.1")]);
        assert_eq!(extract_client_ip(&req).as_deref(), Some("198.51.100.1"));

        assert_eq!(extract_client_ip(&request(&[])), None);
    }

    #[test]
    fn test_resolve_trusts_only_configured_proxies() {
        let trusted = TrustedProxies::defaults();
        let req = request(&[("x-forwarded-for", "203.0.113.7")]);

        let via_proxy: SocketAddr = "127.0.0.1:40000".parse().unwrap();
        assert_eq!(resolve_client_ip(&req, Some(via_proxy), &trusted), "203.0.113.7");

        let direct: SocketAddr = "198.51.100.9:40000".parse().unwrap();
        assert_eq!(resolve_client_ip(&req, Some(direct), &trusted), "198.51.100.9");

        assert_eq!(resolve_client_ip(&req, Some(via_proxy), &TrustedProxies::none()), "127.0.0.1");
        assert_eq!(resolve_client_ip(&req, None, &trusted), "-");
    }

    #[test]
    fn test_mapped_ipv4_peer_is_canonicalized() {
        let trusted = TrustedProxies::parse(&["10.1.0.0/16"]).unwrap();
        let peer: SocketAddr = "[::ffff:10.1.2.3]:8080".parse().unwrap();
        let req = request(&[("x-real-ip", "192.0.2.44")]);
        assert_eq!(resolve_client_ip(&req, Some(peer), &trusted), "192.0.2.44");
    }

    #[test]
    fn test_parse_trusted_proxies() {
        let trusted = TrustedProxies::parse(&["192.0.2.10", "2001:db8::/32"]).unwrap();
        assert!(trusted.contains("192.0.2.10".parse().unwrap()));
        assert!(!trusted.contains("192.0.2.11".parse().unwrap()));
        assert!(trusted.contains("2001:db8::1".parse().unwrap()));
        assert!(TrustedProxies::parse(&["not-an-ip"]).is_err());
        assert!(TrustedProxies::defaults().contains("fd00::1".parse().unwrap()));
    }

    #[test]
    fn test_text_response_headers() {
        let resp = text_response(StatusCode::NOT_FOUND, "404 page not found\n");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[CONTENT_LENGTH], "19");
        assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    }

    #[test]
    fn test_set_header_drops_invalid_values() {
        let mut headers = HeaderMap::new();
        set_header(&mut headers, CONTENT_TYPE, "text/html");
        set_header(&mut headers, HeaderName::from_static("etag"), "bad\nvalue");
        assert_eq!(headers[CONTENT_TYPE], "text/html");
        assert!(!headers.contains_key("etag"));
    }
}
