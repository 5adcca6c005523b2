//! Kiosk Display (kiosk-display) - Main entry point
//!
//! Headless display client: connects to the remote controller, preloads the
//! media catalog after the unlock gesture, and plays image+audio pairs on
//! command.
//!
//! Local input on stdin, one command per line:
//! - `u` or an empty line: unlock playback
//! - `p` or `space`: pause/resume
//! - `q`: quit

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kiosk_display::config::DisplayConfig;
use kiosk_display::diagnostics::{DiagnosticsLayer, DiagnosticsLog};
use kiosk_display::media::HttpFetcher;
use kiosk_display::playback::ClockOutput;
use kiosk_display::Session;

/// Command-line arguments for kiosk-display
#[derive(Parser, Debug)]
#[command(name = "kiosk-display")]
#[command(about = "Remote-controlled kiosk display client")]
#[command(version)]
struct Args {
    /// Config file (default: discovered display.toml)
    #[arg(short, long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    /// Controller WebSocket endpoint
    #[arg(long, env = "KIOSK_CONTROLLER_URL")]
    controller_url: Option<String>,

    /// Base URL hosting <id3>.jpg and <id3>.mp3
    #[arg(long, env = "KIOSK_MEDIA_BASE_URL")]
    media_base_url: Option<String>,

    /// Number of assets in the catalog
    #[arg(long, env = "KIOSK_CATALOG_SIZE")]
    catalog_size: Option<u16>,

    /// Concurrent fetch pairs during preload
    #[arg(long, env = "KIOSK_MAX_CONCURRENT_FETCHES")]
    max_concurrent_fetches: Option<usize>,

    /// Preload audio buffering timeout in milliseconds
    #[arg(long, env = "KIOSK_AUDIO_TIMEOUT_MS")]
    audio_timeout_ms: Option<u64>,

    /// Control channel reconnect delay in milliseconds
    #[arg(long, env = "KIOSK_RECONNECT_INTERVAL_MS")]
    reconnect_interval_ms: Option<u64>,

    /// Unlock playback at startup
    #[arg(long, env = "KIOSK_AUTO_UNLOCK")]
    auto_unlock: bool,
}

impl Args {
    fn apply(&self, config: &mut DisplayConfig) {
        if let Some(url) = &self.controller_url {
            config.controller_url = url.clone();
        }
        if let Some(url) = &self.media_base_url {
            config.media_base_url = url.clone();
        }
        if let Some(size) = self.catalog_size {
            config.catalog_size = size;
        }
        if let Some(k) = self.max_concurrent_fetches {
            config.max_concurrent_fetches = k;
        }
        if let Some(ms) = self.audio_timeout_ms {
            config.audio_timeout_ms = ms;
        }
        if let Some(ms) = self.reconnect_interval_ms {
            config.reconnect_interval_ms = ms;
        }
        if self.auto_unlock {
            config.auto_unlock = true;
        }
    }
}

// All session tasks share one thread
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let diagnostics = DiagnosticsLog::default();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kiosk_display=debug,kiosk_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(DiagnosticsLayer::new(diagnostics.clone()))
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    let mut config =
        DisplayConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!("Starting kiosk display");
    info!("Controller: {}", config.controller_url);
    info!(
        "Media: {} ({} assets, {} concurrent)",
        config.media_base_url, config.catalog_size, config.max_concurrent_fetches
    );

    let fetcher = Arc::new(
        HttpFetcher::new(config.http_timeout()).context("Failed to build HTTP client")?,
    );
    let output = Arc::new(ClockOutput::new(config.progress_interval()));
    let auto_unlock = config.auto_unlock;

    let session = Session::start(config, fetcher, output, diagnostics)
        .context("Failed to start session")?;

    if auto_unlock {
        session.unlock().await.context("Unlock failed")?;
    } else {
        info!("Waiting for unlock: press Enter");
    }

    run_input(&session).await;

    session.shutdown().await.context("Shutdown failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// Read operator input until `q`, Ctrl+C or SIGTERM
async fn run_input(session: &Session) {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "" | "u" => match session.unlock().await {
                        Ok(true) => {}
                        Ok(false) => warn!("Playback still locked"),
                        Err(e) => warn!("Unlock failed: {}", e),
                    },
                    "p" | "space" => {
                        if let Err(e) = session.toggle_pause().await {
                            warn!("Pause failed: {}", e);
                        }
                    }
                    "q" => {
                        info!("Quit requested");
                        return;
                    }
                    other => warn!("Unknown input {:?}", other),
                },
                Ok(None) => {
                    info!("stdin closed, running until signalled");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    stdin_open = false;
                }
            },
            _ = &mut shutdown => return,
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
