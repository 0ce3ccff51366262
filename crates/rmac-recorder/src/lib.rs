//! rmac-recorder library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the `rmac` binary share the same module tree.

pub mod application;
pub mod infrastructure;

pub use application::{
    CapturePipeline, CaptureSettings, CaptureStats, RecordError, RecordOptions, RecordSession,
    RecordSummary, StopReason,
};
pub use infrastructure::input_capture::{
    platform_source, ButtonTransitions, CaptureError, InputSource, RawInputEvent,
};
