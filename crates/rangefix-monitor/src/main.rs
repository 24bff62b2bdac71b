//! # Rangefix Monitor
//!
//! Reads console lines from two (or more) radio endpoints, runs them through
//! the estimation core, logs link quality as it goes, and writes the session
//! as a JSON array when done.
//!
//! ## Usage
//!
//! ```bash
//! # Two endpoints on serial adapters (already configured with stty)
//! rangefix-monitor --channel coordinator=/dev/ttyUSB0 \
//!     --channel enddevice=/dev/ttyUSB1 --duration 60
//!
//! # Replay a captured log from stdin
//! rangefix-monitor --channel coordinator=- < capture.log
//!
//! # Everything from a config file
//! rangefix-monitor --config monitor.toml
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rangefix_core::SmoothingMode;
use rangefix_monitor::config::{parse_channel_arg, ChannelConfigInput, MonitorConfigInput};
use rangefix_monitor::session;
use tracing_subscriber::EnvFilter;

/// Rangefix endpoint monitor.
#[derive(Parser, Debug)]
#[command(name = "rangefix-monitor", about = "Stabilised RSSI / distance monitor")]
struct Cli {
    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Channel source as ID=PATH ("-" reads stdin). Repeatable; replaces the
    /// channels of the config file.
    #[arg(long = "channel", value_name = "ID=PATH", value_parser = parse_channel_arg)]
    channels: Vec<ChannelConfigInput>,

    /// JSON file the readings are written to.
    #[arg(long)]
    output: Option<String>,

    /// Stop after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    duration: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    // ── Config ──────────────────────────────────────────────────
    let cli = Cli::parse();
    let mut input = match &cli.config {
        Some(path) => MonitorConfigInput::load(path)?,
        None => MonitorConfigInput::default(),
    };
    if !cli.channels.is_empty() {
        input.channels = cli.channels;
    }
    if cli.output.is_some() {
        input.output = cli.output;
    }
    if cli.duration.is_some() {
        input.duration_s = cli.duration;
    }
    let config = input.resolve()?;
    if config.smoothing == SmoothingMode::Passthrough {
        tracing::warn!(
            "smoothing = \"passthrough\" is deprecated; readings are reported unsmoothed"
        );
    }
    if config.channels.is_empty() {
        anyhow::bail!("no channels configured: pass --channel ID=PATH or --config FILE");
    }

    tracing::info!(
        channels = ?config.channels.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        output = %config.output.display(),
        "rangefix-monitor starting"
    );

    // ── Shutdown handling ───────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("installing Ctrl+C handler")?;
    }

    // ── Session ─────────────────────────────────────────────────
    let report = session::run(&config, &stop)?;
    report.log_summary();
    session::write_readings(&config.output, &report.readings)?;

    Ok(())
}
