//! attention-focusd - user daemon that focuses windows demanding attention.
//!
//! Instead of a "window is ready" notification, the window is raised and
//! focused right away unless its title is blocklisted.

use attention_focusd::backend::{self, BackendKind};
use attention_focusd::config::Config;
use attention_focusd::daemon::{Daemon, DaemonOptions};

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Focus windows that demand attention.
///
/// Listens for urgent windows and focuses them unless their title matches the blocklist.
#[derive(Parser, Debug)]
#[command(name = "attention-focusd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable dry-run mode (log instead of focusing).
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print attention events to stdout.
    #[arg(long)]
    print_events: bool,

    /// Compositor backend, overriding the config file.
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,

    /// Additional blocklist entry (may be repeated).
    #[arg(long = "block", value_name = "PATTERN")]
    block: Vec<String>,

    /// Run in oneshot mode: print a few attention events without focusing, then exit.
    #[arg(long)]
    oneshot: bool,

    /// Number of events to capture in oneshot mode.
    #[arg(long, default_value = "5")]
    oneshot_count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level)?;

    info!("attention-focusd v{} starting", env!("CARGO_PKG_VERSION"));

    // Load config
    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    // Override config with CLI args
    if args.dry_run {
        config.dry_run = true;
    }
    if let Some(kind) = args.backend {
        config.backend = kind;
    }
    config.blocklist.extend(args.block);
    config.validate().context("Invalid blocklist")?;

    // Check environment
    match config.backend.resolve() {
        Ok(kind) => config.backend = kind,
        Err(e) => {
            error!("{}", e);
            for diag in backend::get_diagnostics() {
                error!("  {}", diag);
            }
            error!("");
            error!("If running as a systemd user service, ensure these variables are available.");
            error!("See: systemctl --user import-environment DISPLAY HYPRLAND_INSTANCE_SIGNATURE");
            anyhow::bail!("No compositor available");
        }
    }

    for diag in backend::get_diagnostics() {
        debug!("{}", diag);
    }

    info!(
        "Configuration loaded (backend={:?}, blocklist={}, dry_run={})",
        config.backend,
        config.blocklist().len(),
        config.dry_run
    );

    // Oneshot mode
    if args.oneshot {
        return run_oneshot(config.backend, args.oneshot_count, args.print_events).await;
    }

    // Normal daemon mode
    let options = DaemonOptions {
        dry_run: config.dry_run,
        print_events: args.print_events,
    };
    let kind = config.backend;
    Daemon::new(config.blocklist(), options)
        .run(|| backend::connect(kind), shutdown_signal())
        .await
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("attention_focusd={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Run in oneshot mode: capture a few events and exit without focusing.
async fn run_oneshot(kind: BackendKind, count: usize, print_events: bool) -> Result<()> {
    info!("Running in oneshot mode, capturing {} events", count);

    let mut source = backend::connect(kind).await?;

    let mut captured = 0;
    while captured < count {
        match tokio::time::timeout(Duration::from_secs(30), source.next_event()).await {
            Ok(Ok(window)) => {
                captured += 1;
                if print_events {
                    println!(
                        "[{}] | window_id={} title={:?}",
                        captured, window.id, window.title
                    );
                } else {
                    info!(
                        "Event {}/{}: window_id={}, title={:?}",
                        captured, count, window.id, window.title
                    );
                }
            }
            Ok(Err(e)) => {
                error!("Attention event error: {}", e);
                break;
            }
            Err(_) => {
                warn!("Timeout waiting for attention events");
                break;
            }
        }
    }

    info!("Oneshot mode complete, captured {} events", captured);
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for SIGINT")?,
        _ = terminate.recv() => {}
    }

    Ok(())
}
