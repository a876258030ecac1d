//! memserve CLI - serve a generated static site from memory.
//!
//! ```bash
//! memserve --web-root ./public --port 8080
//! memserve check --web-root ./public
//! ```
//!
//! See `memserve --help` for all options. Every flag can also be set in
//! `memserve.toml` or through `MEMSERVE_*` environment variables.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use memserve_core::config::{MemserveConfig, DEFAULT_CONFIG_FILE};
use memserve_core::logging::{init_logging, LogFormat};
use memserve_core::{MemServer, MemoryStore};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "memserve", about = "Serve a static site from memory", version)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the web root (default)
    Serve,
    /// Load the web root, print a summary and exit
    Check,
}

#[derive(Args, Default)]
struct Overrides {
    /// Config file (default: memserve.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory to serve
    #[arg(long, global = true)]
    web_root: Option<String>,

    /// Content port
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Metrics port, or "off" to serve /metrics on the content port
    #[arg(long, global = true)]
    metrics_port: Option<String>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    /// Read files from disk on every request instead of loading them
    #[arg(long, global = true)]
    no_memory: bool,

    /// Disable gzip compression
    #[arg(long, global = true)]
    no_gzip: bool,

    /// Log format: human or json
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

impl Overrides {
    fn load(&self) -> Result<MemserveConfig> {
        let path = self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if self.config.is_some() && !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let mut config = MemserveConfig::load_from(&path)?;
        self.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut MemserveConfig) -> Result<()> {
        if let Some(root) = &self.web_root {
            config.content.web_root = root.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(port) = &self.metrics_port {
            config.metrics.set_port(port)?;
        }
        if self.debug {
            config.logging.debug = true;
        }
        if self.no_memory {
            config.content.use_memory = false;
        }
        if self.no_gzip {
            config.content.gzip = false;
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        Ok(())
    }
}

fn check(config: &MemserveConfig) -> Result<()> {
    let store = MemoryStore::load(&config.content.web_root)
        .with_context(|| format!("Failed to load {}", config.content.web_root))?;
    println!(
        "{}: {} entries, {} bytes",
        config.content.web_root,
        store.len(),
        store.total_bytes()
    );
    Ok(())
}

async fn serve(config: MemserveConfig) -> Result<()> {
    let server = MemServer::from_config(config)?;
    server
        .bind()
        .await?
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.overrides.load()?;
    init_logging(&config.logging);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Check => check(&config),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
