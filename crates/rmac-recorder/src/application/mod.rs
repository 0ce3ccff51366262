//! Application layer use cases for the recorder.
//!
//! # What is the "application" layer? (for beginners)
//!
//! The application layer sits between the shared core (trace format, session
//! flags) and the infrastructure (OS input APIs).  Code here:
//!
//! - **Orchestrates** core types to fulfil a user goal ("record my input to
//!   this file until I press Escape").
//! - **Depends on abstractions** (the `InputSource` trait) rather than on the
//!   Windows adapter, so every rule is unit-testable with the mock source.
//!
//! # Sub-modules
//!
//! - **`capture_events`** – The hot path: raw notifications in, trace events
//!   out.  Stop key, sentinel filtering, pointer modes, writer failures.
//!
//! - **`record_session`** – Session lifecycle: opens the trace, starts the
//!   source, runs the pipeline on a blocking thread, then tears everything
//!   down in a fixed order.

pub mod capture_events;
pub mod record_session;

pub use capture_events::{CapturePipeline, CaptureSettings, CaptureStats, CaptureStep, StopReason};
pub use record_session::{RecordError, RecordOptions, RecordSession, RecordSummary};
