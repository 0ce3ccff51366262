//! rmac: record keyboard and mouse input to a trace file, and play it back
//! with the original timing.
//!
//! # Usage
//!
//! ```text
//! rmac [--config <FILE>] [--log-level <FILTER>] record <PATH> [--stop-key <KEY>]
//! rmac [--config <FILE>] [--log-level <FILTER>] play <PATH> [--countdown <SECS>]
//! rmac [--config <FILE>] init-config [--force]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable      | Flag           | Description                          |
//! |---------------|----------------|--------------------------------------|
//! | `RMAC_CONFIG` | `--config`     | Config file instead of the default   |
//! | `RMAC_LOG`    | `--log-level`  | Log filter (below `RUST_LOG`)        |
//!
//! # Exit status
//!
//! 0 when a session ends normally, including when the user stops it with
//! the stop key or Ctrl+C.  Non-zero for an invalid or unreadable trace,
//! I/O failures, and input capture or injection that cannot be set up.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use rmac::application::{self, InitOutcome, PlayCommand, RecordCommand};
use rmac::infrastructure::{load_config, logging, TracingStatusSink};
use rmac_core::keymap::vk_from_name;
use rmac_core::CancelToken;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Record and replay keyboard and mouse input.
#[derive(Debug, Parser)]
#[command(name = "rmac", version)]
struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "RMAC_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `rmac_player=trace`.  `RUST_LOG` wins.
    #[arg(long, global = true, env = "RMAC_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record input into a new trace file until the stop key is pressed.
    Record {
        path: PathBuf,
        /// Stop key by name (`esc`, `f12`, `scrolllock`) or code (`27`, `0x1b`).
        #[arg(long, value_parser = parse_key)]
        stop_key: Option<u8>,
    },
    /// Play a trace file back.
    Play {
        path: PathBuf,
        /// Seconds to wait before the first event.
        #[arg(long)]
        countdown: Option<u64>,
    },
    /// Write a config file with every default, at `--config` or the
    /// platform location.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn parse_key(value: &str) -> Result<u8, String> {
    vk_from_name(value).ok_or_else(|| format!("unknown key '{value}'"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::InitConfig { force } = cli.command {
        logging::init(cli.log_level.as_deref(), "info");
        match application::init_config(cli.config.as_deref(), force)
            .context("failed to write configuration")?
        {
            InitOutcome::Written(path) => info!(path = %path.display(), "wrote default config"),
            InitOutcome::AlreadyExists(path) => {
                info!(path = %path.display(), "config already exists; pass --force to overwrite")
            }
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    logging::init(cli.log_level.as_deref(), &config.log_level);

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, stopping");
                ctrl_c.cancel();
            }
            Err(e) => error!("failed to listen for Ctrl+C: {e}"),
        }
    });

    let status = Arc::new(TracingStatusSink);

    match cli.command {
        Command::Record { path, stop_key } => {
            let command = RecordCommand { path, stop_key };
            let options = application::record_options(&config.record, &command);
            let source = rmac_recorder::platform_source()
                .context("raw input capture is unavailable")?;
            let summary = application::record(source.as_ref(), options, cancel, status)
                .await
                .with_context(|| format!("recording to {} failed", command.path.display()))?;
            info!(
                path = %summary.path.display(),
                events = summary.stats.events_written,
                reason = ?summary.reason,
                "saved trace"
            );
        }
        Command::Play { path, countdown } => {
            let command = PlayCommand {
                path,
                countdown_secs: countdown,
            };
            let injector =
                rmac_player::platform_injector().context("input injection is unavailable")?;
            let options = application::play_options(
                &config.playback,
                &command,
                rmac_player::primary_screen_geometry(),
            );
            let stop_source = rmac_recorder::platform_source().ok();
            let summary = application::play(
                injector,
                stop_source.as_deref(),
                options,
                cancel,
                status,
            )
            .await
            .with_context(|| format!("playing {} failed", command.path.display()))?;
            info!(
                state = ?summary.state,
                dispatched = summary.report.dispatched,
                "playback done"
            );
        }
        Command::InitConfig { .. } => {}
    }

    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
