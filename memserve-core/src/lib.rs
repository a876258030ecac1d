//! memserve - Core
//!
//! A memory-first static site server. At startup the web root is walked once
//! and every file is loaded into a map from URL path to content; requests are
//! then answered from that map without touching the disk.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use memserve_core::{config::MemserveConfig, logging::init_logging, MemServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = MemserveConfig::load()?;
//!     init_logging(&config.logging);
//!     MemServer::from_config(config)?.bind().await?.run().await
//! }
//! ```
//!
//! # Architecture
//!
//! - [`path`] - URL path canonicalization and the directory-index rule
//! - [`store`] - `FileRecord`, the in-memory and disk content stores
//! - [`handler`] - Serve records with caching and validation headers
//! - [`middleware`] - Compression, metrics and access log layers
//! - [`telemetry`] - Prometheus registry and scrape endpoint
//! - [`server`] - Listeners, accept loops, shutdown
//! - [`config`] / [`logging`] - TOML + environment configuration, `env_logger` setup

pub mod config;
pub mod handler;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod path;
pub mod server;
pub mod store;
pub mod telemetry;

pub use config::MemserveConfig;
pub use handler::ContentHandler;
pub use server::{BoundServer, MemServer};
pub use store::{ContentStore, DiskStore, FileRecord, MemoryStore, StoreError};
pub use telemetry::Telemetry;
