//! srvtopo-cache server
//!
//! Serves serving graph lookups over HTTP from a resilient cache in front of
//! a topology snapshot file.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      srvtopo-cache                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────────┐    ┌──────────────┐   │
//! │  │  HTTP API    │───▶│ ResilientSrvTopo │───▶│ FileTopo     │   │
//! │  │ /endpoints…  │    │ Server (cache)   │    │ Server       │   │
//! │  └──────────────┘    └──────────────────┘    └──────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use prometheus::Registry;
use tokio::net::TcpListener;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use srvtopo_cache::adapters::FileTopoServer;
use srvtopo_cache::api;
use srvtopo_cache::{ResilientConfig, ResilientSrvTopoServer};

// =============================================================================
// CLI Arguments
// =============================================================================

/// srvtopo-cache - Resilient serving graph lookups
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Serving graph snapshot (YAML, or JSON with a .json extension)
    #[arg(long, env = "SRV_TOPO_FILE", default_value = "/etc/srvtopo/topology.yaml")]
    topology_file: PathBuf,

    /// How long to use cached entries for topology, in milliseconds
    #[arg(long, env = "SRV_TOPO_CACHE_TTL_MS", default_value = "1000")]
    srv_topo_cache_ttl_ms: u64,

    /// Lookup, metrics and health server bind address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:15991")]
    listen_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    info!("Starting srvtopo-cache");
    info!("  Topology file: {}", args.topology_file.display());
    info!("  Cache TTL: {} ms", args.srv_topo_cache_ttl_ms);

    let store = Arc::new(FileTopoServer::new(args.topology_file.clone()));
    let config =
        ResilientConfig::default().with_cache_ttl(Duration::from_millis(args.srv_topo_cache_ttl_ms));
    let server = Arc::new(ResilientSrvTopoServer::new(store, config)?);

    let registry = Arc::new(Registry::new());
    server.counters().register(&registry)?;

    run_server(&args.listen_addr, server, registry).await
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}

// =============================================================================
// HTTP Server
// =============================================================================

async fn run_server(
    addr: &str,
    server: Arc<ResilientSrvTopoServer>,
    registry: Arc<Registry>,
) -> anyhow::Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", addr))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Listening on {}", addr);

    loop {
        let (stream, peer) = listener.accept().await.context("Accept error")?;
        let io = TokioIo::new(stream);
        let server = Arc::clone(&server);
        let registry = Arc::clone(&registry);

        tokio::spawn(async move {
            let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                let server = Arc::clone(&server);
                let registry = Arc::clone(&registry);
                async move {
                    let response = api::handle(&server, &registry, req.uri().path()).await;
                    Ok::<_, std::convert::Infallible>(response)
                }
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
