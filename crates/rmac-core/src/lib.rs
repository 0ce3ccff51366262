//! # rmac-core
//!
//! Shared library for the rmac input recorder and player: the binary trace
//! format, the microsecond timebase, process-wide session flags, and the
//! background scanner framework.
//!
//! It has no dependencies on OS input APIs; the platform adapters live in
//! `rmac-recorder` (capture) and `rmac-player` (injection).
//!
//! # Architecture overview (for beginners)
//!
//! rmac records keyboard and mouse input into a flat file and plays it back
//! later with the original timing.  A recording session looks like this:
//!
//! ```text
//! OS input ──▶ capture pipeline ──▶ TraceWriter ──▶ trace file
//!                  ▲
//!                  └── Timebase (offsets)   SessionState (mode, flags)
//! ```
//!
//! and playback reverses it:
//!
//! ```text
//! trace file ──▶ read_trace ──▶ playback scheduler ──▶ OS input injection
//! ```
//!
//! This crate provides the pieces both directions share:
//!
//! - **`trace`** – The event model, the fixed-width binary codec, and the
//!   file writer/reader.
//! - **`timebase`** – Non-decreasing microsecond offsets from session start.
//! - **`session`** – Atomic flags read by every task, each with exactly one
//!   writer.
//! - **`automation`** – Periodic screen scanners that feed detection results
//!   to pluggable policies.
//! - **`status`** – Snapshots published to a status display.
//! - **`keymap`** – Virtual-key constants and name lookup.

pub mod automation;
pub mod keymap;
pub mod session;
pub mod status;
pub mod timebase;
pub mod trace;

pub use session::{CancelToken, ModeWriter, PointerMode, SessionController, SessionState};
pub use status::{NullStatusSink, PlaybackState, StatusSink, StatusSnapshot};
pub use timebase::{Clock, MonotonicClock, Timebase};
pub use trace::{
    read_trace, Event, EventKind, FormatError, InputAction, PointerButton, Trace, TraceError,
    TraceHeader, TraceWriter,
};
