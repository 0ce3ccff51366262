//! Application layer: the commands the binary exposes.

pub mod commands;

pub use commands::{
    init_config, play, play_options, record, record_options, InitOutcome, PlayCommand,
    RecordCommand,
};
