//! Append-only trace sink.
//!
//! A [`TraceWriter`] owns the output file for one recording session.  The
//! header is written once at creation; events are appended in call order
//! through a large buffer and only flushed when the writer is closed.
//! Durability is guaranteed at clean shutdown, not per event.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::event::Event;
use super::format::{encode_event, encode_header, TraceHeader};
use super::TraceError;

/// Default write buffer size.
pub const DEFAULT_BUFFER_BYTES: usize = 64 * 1024;

/// Buffered, append-only writer for one trace file.
pub struct TraceWriter<W: Write = File> {
    /// `None` once the writer has been closed.
    sink: Option<BufWriter<W>>,
    path: PathBuf,
    events_written: u64,
}

impl TraceWriter<File> {
    /// Creates (or truncates) the file at `path` and writes `header`.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the file cannot be created or the header
    /// cannot be written.
    pub fn create(path: impl AsRef<Path>, header: &TraceHeader) -> Result<Self, TraceError> {
        Self::create_with_capacity(path, header, DEFAULT_BUFFER_BYTES)
    }

    /// Like [`TraceWriter::create`] with an explicit buffer size.
    pub fn create_with_capacity(
        path: impl AsRef<Path>,
        header: &TraceHeader,
        capacity: usize,
    ) -> Result<Self, TraceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| TraceError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_writer(file, path, header, capacity)
    }
}

impl<W: Write> TraceWriter<W> {
    /// Wraps an arbitrary byte sink.  `path` is only used in diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the header cannot be written.
    pub fn from_writer(
        inner: W,
        path: impl Into<PathBuf>,
        header: &TraceHeader,
        capacity: usize,
    ) -> Result<Self, TraceError> {
        let path = path.into();
        let mut sink = BufWriter::with_capacity(capacity.max(crate::trace::EVENT_SIZE), inner);
        sink.write_all(&encode_header(header))
            .map_err(|source| TraceError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "trace opened");
        Ok(Self {
            sink: Some(sink),
            path,
            events_written: 0,
        })
    }

    /// Appends one event.  A no-op once the writer is closed.
    ///
    /// # Errors
    ///
    /// Propagates the underlying write error.  The caller decides whether to
    /// keep going.
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        sink.write_all(&encode_event(event))?;
        self.events_written += 1;
        Ok(())
    }

    /// Flushes buffered events and releases the file.  Safe to call again.
    ///
    /// # Errors
    ///
    /// Returns the flush error from the first close; later calls return `Ok`.
    pub fn close(&mut self) -> io::Result<()> {
        match self.sink.take() {
            Some(mut sink) => {
                sink.flush()?;
                debug!(
                    path = %self.path.display(),
                    events = self.events_written,
                    "trace closed"
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.sink.is_some()
    }

    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the writer and hands back the inner sink (tests inspect bytes).
    ///
    /// # Errors
    ///
    /// Returns the flush error, if any.  `Ok(None)` when already closed.
    pub fn into_inner(mut self) -> io::Result<Option<W>> {
        match self.sink.take() {
            Some(sink) => sink.into_inner().map(Some).map_err(|e| e.into_error()),
            None => Ok(None),
        }
    }
}

impl<W: Write> Drop for TraceWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), "failed to flush trace on drop: {e}");
        }
    }
}
