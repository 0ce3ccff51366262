//! Trace persistence: the event model, the binary codec, and the file-level
//! writer and reader built on top of it.

pub mod event;
pub mod format;
pub mod reader;
pub mod writer;

use std::path::PathBuf;

use thiserror::Error;

pub use event::{Event, EventKind, InputAction, PointerButton};
pub use format::{
    decode_event, decode_event_slice, decode_header, encode_event, encode_header, FormatError,
    TraceHeader, EVENT_SIZE, HEADER_SIZE, TRACE_MAGIC, TRACE_VERSION,
};
pub use reader::{read_trace, read_trace_from, Trace};
pub use writer::TraceWriter;

/// Errors raised when opening, reading, or creating a trace file.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The file content is not a valid trace.
    #[error("invalid trace: {0}")]
    Format(#[from] FormatError),

    /// The file could not be opened, read, or written.
    #[error("I/O error on trace {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
