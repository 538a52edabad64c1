//! # Edge Unified Host Binary
//!
//! Runs the cooperative event loop with the built-in demo drivers: a
//! simulated LED blinker and a simulated telemetry publisher.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default configuration
//! edge_unified --config /etc/edge/config.toml
//!
//! # Keep persisted driver data somewhere else
//! edge_unified --config config/edge.toml --store-dir /tmp/edge
//!
//! # Stop after 1000 ticks, verbose JSON logs
//! edge_unified --config config/edge.toml --ticks 1000 -v --json
//! ```

#![deny(warnings)]

use clap::Parser;
use edge_common::config::{ConfigLoader, EdgeConfig};
use edge_common::consts::DEFAULT_CONFIG_PATH;
use edge_unified::core::EdgeCore;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

/// Edge Unified - cooperative driver scheduler with persistence
#[derive(Parser, Debug)]
#[command(name = "edge_unified")]
#[command(version)]
#[command(about = "Cooperative driver scheduler with persistence and deferred UI binding")]
#[command(long_about = None)]
struct Args {
    /// Path to the host configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the persistence store directory.
    #[arg(long, value_name = "DIR")]
    store_dir: Option<PathBuf>,

    /// Stop after this many ticks (overrides event_loop.max_ticks).
    #[arg(long)]
    ticks: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("Edge host failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = EdgeConfig::load(&args.config);
    let level = match &loaded {
        _ if args.verbose => Level::DEBUG,
        Ok(config) => config.shared.log_level.into(),
        Err(_) => Level::INFO,
    };
    setup_tracing(level, args.json);

    info!("Edge Unified v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Loading configuration from {:?}", args.config);
    let mut config = loaded?;
    if let Some(ticks) = args.ticks {
        config.event_loop.max_ticks = ticks;
    }

    let mut core = EdgeCore::new(config)?;
    if let Some(dir) = &args.store_dir {
        core = core.with_store_root(dir);
    }

    let running = core.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    core.init()?;
    if let Err(e) = core.run() {
        error!("Event loop error: {}", e);
    }
    core.shutdown();

    let stats = core.stats();
    info!(
        "Edge Unified shutdown complete ({} ticks, max {}us, store {:?})",
        stats.tick_count,
        stats.max_tick_us,
        core.store_root()
    );
    Ok(())
}

/// Setup tracing subscriber.
fn setup_tracing(level: Level, json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
