//! Loads a complete trace into memory ahead of playback.
//!
//! The header is validated before any event bytes are read.  Records are
//! then decoded until the input runs out; a partial trailing record is
//! treated as truncation: reading stops at the last complete record and the
//! leftover byte count is reported rather than decoded.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::event::Event;
use super::format::{decode_event, decode_header, TraceHeader, EVENT_SIZE, HEADER_SIZE};
use super::TraceError;

/// A fully loaded trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub header: TraceHeader,
    /// Events in file order.
    pub events: Vec<Event>,
    /// Bytes after the last complete record.  Non-zero means the file was
    /// truncated mid-record.
    pub trailing_bytes: usize,
}

impl Trace {
    /// Offset of the last event, or 0 for an empty trace.
    pub fn duration_micros(&self) -> u64 {
        self.events.last().map(|e| e.offset_micros).unwrap_or(0)
    }

    /// `true` when offsets never decrease across the sequence.
    pub fn is_monotonic(&self) -> bool {
        self.events
            .windows(2)
            .all(|w| w[0].offset_micros <= w[1].offset_micros)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Opens and decodes the trace at `path`.
///
/// # Errors
///
/// - [`TraceError::Io`] if the file cannot be opened or read.
/// - [`TraceError::Format`] if the header is missing, has the wrong magic,
///   or declares an unsupported version.
pub fn read_trace(path: impl AsRef<Path>) -> Result<Trace, TraceError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| io_error(path, source))?;
    let trace = read_trace_from(BufReader::new(file)).map_err(|e| match e {
        TraceError::Io { source, .. } => io_error(path, source),
        other => other,
    })?;
    debug!(
        path = %path.display(),
        events = trace.events.len(),
        duration_us = trace.duration_micros(),
        "trace loaded"
    );
    Ok(trace)
}

/// Decodes a trace from any byte source.
///
/// # Errors
///
/// Same as [`read_trace`]; I/O errors carry an empty path.
pub fn read_trace_from(mut input: impl Read) -> Result<Trace, TraceError> {
    let mut header_bytes = [0u8; HEADER_SIZE];
    let got = read_full(&mut input, &mut header_bytes).map_err(|s| io_error("", s))?;
    let header = decode_header(&header_bytes[..got])?;

    let mut events = Vec::new();
    let mut record = [0u8; EVENT_SIZE];
    let trailing_bytes = loop {
        let got = read_full(&mut input, &mut record).map_err(|s| io_error("", s))?;
        if got < EVENT_SIZE {
            break got;
        }
        events.push(decode_event(&record));
    };

    if trailing_bytes > 0 {
        warn!(
            trailing_bytes,
            events = events.len(),
            "trace ends with a partial record; ignoring the tail"
        );
    }

    Ok(Trace {
        header,
        events,
        trailing_bytes,
    })
}

/// Reads until `buf` is full or the input is exhausted; returns bytes read.
fn read_full(input: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn io_error(path: impl Into<PathBuf>, source: io::Error) -> TraceError {
    TraceError::Io {
        path: path.into(),
        source,
    }
}
