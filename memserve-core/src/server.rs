//! HTTP server
//!
//! Builds the content store before anything binds, then runs the content
//! listener and the metrics listener side by side on the tokio runtime.
//!
//! ```rust,no_run
//! use memserve_core::{config::MemserveConfig, MemServer};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let server = MemServer::from_config(MemserveConfig::load()?)?;
//! server.bind().await?.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await?;
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::server::join_host_port;
use crate::config::MemserveConfig;
use crate::handler::{ContentHandler, Routes};
use crate::http::{PeerAddr, Resp};
use crate::middleware::{AccessLog, Compression, Handler, Metrics};
use crate::store::{open_store, ContentStore};
use crate::telemetry::{MetricsEndpoint, Telemetry};

/// The content port's handler stack, outermost first
pub type ServeChain = Compression<Metrics<AccessLog<Routes>>>;

pub struct MemServer {
    config: MemserveConfig,
    store: Arc<dyn ContentStore>,
    telemetry: Telemetry,
}

impl MemServer {
    /// Validate the configuration and load the content store.
    pub fn from_config(config: MemserveConfig) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.content)
            .with_context(|| format!("Failed to load content from {}", config.content.web_root))?;
        Self::new(config, store)
    }

    /// Assemble a server around an already built store.
    pub fn new(config: MemserveConfig, store: Arc<dyn ContentStore>) -> Result<Self> {
        let telemetry = Telemetry::new(&config.metrics.namespace)?;
        Ok(Self { config, store, telemetry })
    }

    pub fn config(&self) -> &MemserveConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Build the middleware chain for the content port.
    pub fn handler(&self) -> Result<Arc<ServeChain>> {
        let trusted = self.config.server.trusted_proxies()?;
        let scrape = match self.config.metrics.listen_port() {
            Some(_) => None,
            None => Some(self.telemetry.clone()),
        };

        let routes = Routes::new(ContentHandler::new(Arc::clone(&self.store)), scrape);
        let chain = Compression::from_config(
            Metrics::new(AccessLog::new(routes, trusted), self.telemetry.clone()),
            &self.config.content,
        );
        Ok(Arc::new(chain))
    }

    /// Bind both listeners.
    pub async fn bind(self) -> Result<BoundServer> {
        let handler = self.handler()?;

        let addr = self.config.server.bind_addr();
        let content = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        log::info!(
            "Serving {} ({} store) on http://{}",
            self.config.content.web_root,
            self.store.kind(),
            content.local_addr()?
        );

        let metrics = match self.config.metrics.listen_port() {
            Some(port) => {
                let addr = join_host_port(&self.config.server.host, port);
                let listener = TcpListener::bind(&addr)
                    .await
                    .with_context(|| format!("Failed to bind metrics listener to {}", addr))?;
                log::info!("Metrics on http://{}/metrics", listener.local_addr()?);
                Some(listener)
            }
            None => {
                log::info!("Metrics on the content port at /metrics");
                None
            }
        };

        Ok(BoundServer {
            content,
            metrics,
            handler,
            endpoint: Arc::new(MetricsEndpoint::new(self.telemetry)),
            header_timeout: Duration::from_secs(self.config.server.header_read_timeout_secs),
        })
    }
}

pub struct BoundServer {
    content: TcpListener,
    metrics: Option<TcpListener>,
    handler: Arc<ServeChain>,
    endpoint: Arc<MetricsEndpoint>,
    header_timeout: Duration,
}

impl BoundServer {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.content.local_addr()
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Serve until the process is killed.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves. Both accept loops stop; connections
    /// already accepted finish on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let (stop_tx, stop_rx) = watch::channel(false);

        let content = tokio::spawn(accept_loop(
            self.content,
            self.handler,
            self.header_timeout,
            stop_rx.clone(),
        ));
        let metrics = self.metrics.map(|listener| {
            tokio::spawn(accept_loop(listener, self.endpoint, self.header_timeout, stop_rx))
        });

        shutdown.await;
        log::info!("Shutting down");
        let _ = stop_tx.send(true);

        content.await?;
        if let Some(metrics) = metrics {
            metrics.await?;
        }
        Ok(())
    }
}

async fn accept_loop<H: Handler>(
    listener: TcpListener,
    handler: Arc<H>,
    header_timeout: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let (stream, remote_addr) = tokio::select! {
            _ = stop.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    log::warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            },
        };
        let handler = Arc::clone(&handler);

        tokio::spawn(async move {
            let io = TokioIo::new(stream);

            let service = service_fn(move |req: Request<Incoming>| {
                let handler = Arc::clone(&handler);
                async move {
                    Ok::<_, Infallible>(dispatch(handler.as_ref(), req, remote_addr).await)
                }
            });

            let mut builder = http1::Builder::new();
            builder.timer(TokioTimer::new()).header_read_timeout(header_timeout);
            if let Err(err) = builder.serve_connection(io, service).await {
                log::debug!("Connection error from {}: {}", remote_addr, err);
            }
        });
    }
}

/// Drop the request body and tag the request with its peer address.
async fn dispatch<H: Handler>(handler: &H, req: Request<Incoming>, peer: SocketAddr) -> Resp {
    let (parts, _body) = req.into_parts();
    let mut req = Request::from_parts(parts, ());
    req.extensions_mut().insert(PeerAddr(peer));
    handler.call(req).await
}
