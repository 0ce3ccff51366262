//! Configuration schema.
//!
//! Every field has a serde default, so an empty file, a file from an older
//! version, or no file at all yields a working configuration.
//!
//! ```toml
//! log_level = "info"
//!
//! [record]
//! stop_key = 27              # VK_ESCAPE
//! absolute_mode_key = 18     # VK_MENU (Alt)
//! channel_capacity = 4096
//! writer_buffer_bytes = 65536
//!
//! [playback]
//! stop_key = 27
//! countdown_secs = 3
//! spin_threshold_us = 200
//! raise_timer_resolution = true
//! screen_width = 1920        # omit both to use the primary display size
//! screen_height = 1080
//! ```

use rmac_core::keymap::vk;
use rmac_player::ScreenGeometry;
use serde::{Deserialize, Serialize};

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// `tracing` filter directive: `"error"`, `"warn"`, `"info"`, `"debug"`,
    /// `"trace"`, or a full `EnvFilter` string.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub record: RecordConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordConfig {
    /// Virtual key that ends a recording.  Never written to the trace.
    #[serde(default = "default_stop_key")]
    pub stop_key: u8,
    /// While held, pointer motion is recorded as absolute positions.
    #[serde(default = "default_absolute_mode_key")]
    pub absolute_mode_key: u8,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_writer_buffer_bytes")]
    pub writer_buffer_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackConfig {
    #[serde(default = "default_stop_key")]
    pub stop_key: u8,
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
    /// Busy-wait tail of each sleep; 0 disables spinning.
    #[serde(default = "default_spin_threshold_us")]
    pub spin_threshold_us: u64,
    #[serde(default = "default_true")]
    pub raise_timer_resolution: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_height: Option<u32>,
}

impl PlaybackConfig {
    /// Configured screen size, if both dimensions are set.
    pub fn screen_geometry(&self) -> Option<ScreenGeometry> {
        match (self.screen_width, self.screen_height) {
            (Some(width), Some(height)) => Some(ScreenGeometry::new(width, height)),
            _ => None,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_stop_key() -> u8 {
    vk::ESCAPE
}
fn default_absolute_mode_key() -> u8 {
    vk::MENU
}
fn default_channel_capacity() -> usize {
    rmac_recorder::application::record_session::DEFAULT_CHANNEL_CAPACITY
}
fn default_writer_buffer_bytes() -> usize {
    rmac_core::trace::writer::DEFAULT_BUFFER_BYTES
}
fn default_countdown_secs() -> u64 {
    3
}
fn default_spin_threshold_us() -> u64 {
    rmac_player::infrastructure::timing::DEFAULT_SPIN_THRESHOLD_US
}
fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            record: RecordConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            stop_key: default_stop_key(),
            absolute_mode_key: default_absolute_mode_key(),
            channel_capacity: default_channel_capacity(),
            writer_buffer_bytes: default_writer_buffer_bytes(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            stop_key: default_stop_key(),
            countdown_secs: default_countdown_secs(),
            spin_threshold_us: default_spin_threshold_us(),
            raise_timer_resolution: default_true(),
            screen_width: None,
            screen_height: None,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
