//! Domain layer: plain configuration types, no I/O.

pub mod config;

pub use config::{AppConfig, PlaybackConfig, RecordConfig};
