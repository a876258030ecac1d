//! HTTP plumbing shared by the handler and the middleware chain

pub mod conditional;
pub mod utils;

pub use conditional::{etag_matches, is_not_modified, parse_range, requested_range, RangeOutcome};
pub use utils::{
    body_from, empty, extract_client_ip, resolve_client_ip, set_header, text_response, HeadContent,
    PeerAddr, Req, Resp, RespBody, TrustedProxies, DEFAULT_TRUSTED_PROXIES,
};
