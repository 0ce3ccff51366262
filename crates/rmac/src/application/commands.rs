//! The `record`, `play` and `init-config` commands.
//!
//! `record` and `play` merge the config file with its CLI overrides into session
//! options, builds a fresh session, and runs it against whatever input
//! source or injector `main` hands in.  Taking those as trait objects keeps
//! the commands runnable in tests with the mock adapters.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rmac_core::automation::ScannerSet;
use rmac_core::{CancelToken, SessionState, StatusSink};
use rmac_player::{
    HeldInputs, InputInjector, PlayError, PlayOptions, PlaySession, PlaySummary, ScreenGeometry,
};
use rmac_recorder::{
    CaptureSettings, InputSource, RecordError, RecordOptions, RecordSession, RecordSummary,
};

use crate::domain::{AppConfig, PlaybackConfig, RecordConfig};
use crate::infrastructure::storage::{config_file_path, save_config, ConfigError};

/// Arguments of `rmac record`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCommand {
    pub path: PathBuf,
    pub stop_key: Option<u8>,
}

/// Arguments of `rmac play`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayCommand {
    pub path: PathBuf,
    pub countdown_secs: Option<u64>,
}

pub fn record_options(config: &RecordConfig, command: &RecordCommand) -> RecordOptions {
    RecordOptions {
        path: command.path.clone(),
        settings: CaptureSettings {
            stop_key: command.stop_key.unwrap_or(config.stop_key),
            absolute_mode_key: config.absolute_mode_key,
        },
        channel_capacity: config.channel_capacity,
        writer_buffer_bytes: config.writer_buffer_bytes,
    }
}

/// Screen size: the config file's if set, else `detected`, else 1920×1080.
pub fn play_options(
    config: &PlaybackConfig,
    command: &PlayCommand,
    detected: Option<ScreenGeometry>,
) -> PlayOptions {
    PlayOptions {
        path: command.path.clone(),
        countdown: Duration::from_secs(command.countdown_secs.unwrap_or(config.countdown_secs)),
        stop_key: config.stop_key,
        spin_threshold_us: config.spin_threshold_us,
        raise_timer_resolution: config.raise_timer_resolution,
        geometry: config.screen_geometry().or(detected).unwrap_or_default(),
    }
}

/// Result of `rmac init-config`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Written(PathBuf),
    /// The file was left untouched; pass `--force` to overwrite it.
    AlreadyExists(PathBuf),
}

/// Writes a config file holding every default, at `target` or the platform
/// default location.
pub fn init_config(target: Option<&Path>, force: bool) -> Result<InitOutcome, ConfigError> {
    let path = match target {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    if path.exists() && !force {
        return Ok(InitOutcome::AlreadyExists(path));
    }
    save_config(&AppConfig::default(), &path)?;
    Ok(InitOutcome::Written(path))
}

/// Records until the stop key, Ctrl+C, or the source closing.
///
/// The session runs without screen scanners; library callers that want mode
/// detection add them to a [`ScannerSet`] and drive [`RecordSession`]
/// directly.
pub async fn record(
    source: &dyn InputSource,
    options: RecordOptions,
    cancel: CancelToken,
    status: Arc<dyn StatusSink>,
) -> Result<RecordSummary, RecordError> {
    let (state, controller) = SessionState::new();
    let session = RecordSession::new(controller, ScannerSet::new(state), status);
    session.run(source, options, cancel).await
}

/// Plays a trace through `injector`, watching `stop_source` for the stop key.
///
/// Like [`record`], no scanners are attached here; steering is wired up by
/// library callers through [`PlaySession`].
pub async fn play(
    injector: Arc<dyn InputInjector>,
    stop_source: Option<&dyn InputSource>,
    options: PlayOptions,
    cancel: CancelToken,
    status: Arc<dyn StatusSink>,
) -> Result<PlaySummary, PlayError> {
    let (state, controller) = SessionState::new();
    let held = Arc::new(HeldInputs::new(injector));
    let session = PlaySession::new(controller, ScannerSet::new(state), held, status);
    session.run(stop_source, options, cancel).await
}
