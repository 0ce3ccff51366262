//! Infrastructure layer: config file, logging setup and the status sink.

pub mod logging;
pub mod status_sink;
pub mod storage;

pub use status_sink::TracingStatusSink;
pub use storage::{load_config, save_config, ConfigError};
