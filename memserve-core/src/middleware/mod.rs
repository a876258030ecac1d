//! Middleware chain
//!
//! Every layer implements [`Handler`] and wraps the next one. The server
//! assembles them as:
//!
//! ```text
//! Compression -> Metrics -> AccessLog -> Routes -> ContentHandler
//! ```
//!
//! Compression is outermost so metrics and the access log see the
//! uncompressed response.

pub mod access_log;
pub mod compression;
pub mod metrics;

pub use access_log::{AccessLog, ACCESS_TARGET};
pub use compression::{accepts_gzip, Compression};
pub use metrics::Metrics;

use async_trait::async_trait;

use crate::http::{Req, Resp};

/// Something that turns a request into a response
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, req: Req) -> Resp;
}
