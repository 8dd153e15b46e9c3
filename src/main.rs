//! Storage Bridge
//!
//! Serves the resource API and translates it into storage engine JSON-RPC
//! calls.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storage_bridge::{ApiServer, ApiServerConfig, BridgeConfig, JsonRpcClient, ResourceManager};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Storage Bridge - NVMe/virtio control plane over a JSON-RPC storage engine
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, short = 'c', env = "BRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Engine socket (`unix:<path>`, `tcp:<host:port>`, or a bare path)
    #[arg(long, env = "ENGINE_ADDR")]
    engine_addr: Option<String>,

    /// REST API bind address
    #[arg(long, env = "API_ADDR")]
    api_addr: Option<String>,

    /// Directory holding vfio-user controller sockets
    #[arg(long, env = "VFIO_USER_DIR")]
    vfio_user_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// File settings first, then command-line and environment overrides
    fn bridge_config(&self) -> anyhow::Result<BridgeConfig> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => BridgeConfig::default(),
        };

        if let Some(addr) = &self.engine_addr {
            config.engine.address = addr.clone();
        }
        if let Some(addr) = &self.api_addr {
            config.api.rest_addr = addr.clone();
        }
        if let Some(dir) = &self.vfio_user_dir {
            config.transport.vfio_user.ctrlr_dir = dir.clone();
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = args.bridge_config()?;

    info!("Starting Storage Bridge");
    info!("  Version: {}", storage_bridge::VERSION);
    info!("  Engine: {}", config.engine.address);
    info!("  REST API: {}", config.api.rest_addr);

    let engine = Arc::new(JsonRpcClient::new(&config.engine)?);
    let manager = Arc::new(ResourceManager::with_engine(engine, &config.transport));

    match manager.engine_version().await {
        Ok(version) => info!("Engine reports {}", version.version),
        Err(e) => error!("Engine not reachable yet: {}", e),
    }

    let server = Arc::new(ApiServer::new(
        ApiServerConfig::try_from(&config.api)?,
        manager,
    ));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Cannot listen for interrupt: {}", e),
        }
    });

    server.run().await?;

    info!("Storage Bridge shutdown complete");
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "tower=warn", "tower_http=info", "axum=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

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
}
