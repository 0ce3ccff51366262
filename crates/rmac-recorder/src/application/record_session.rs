//! RecordSession: one complete recording, from opening the trace to the
//! final summary.
//!
//! Order of operations:
//!
//! 1. Create the trace file and write its header.
//! 2. Start the input source, stamping notifications on a fresh timebase.
//! 3. Raise the `recording` flag and run the capture pipeline on a blocking
//!    thread until the stop key, cancellation, or the source closing.
//! 4. Stop the source, lower the flag, and join every scanner task.
//! 5. Only then close the writer, so no task can observe a half-closed
//!    session.

use std::path::PathBuf;
use std::sync::Arc;

use rmac_core::automation::ScannerSet;
use rmac_core::trace::{TraceError, TraceHeader, TraceWriter};
use rmac_core::{
    CancelToken, PlaybackState, SessionController, StatusSink, StatusSnapshot, Timebase,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::capture_events::{CapturePipeline, CaptureSettings, CaptureStats, StopReason};
use crate::infrastructure::input_capture::{CaptureError, InputSource};

/// Default bound of the OS → pipeline channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4096;

/// Errors that end a recording session.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("input capture setup failed: {0}")]
    Capture(#[from] CaptureError),

    /// The blocking capture task panicked or was aborted.
    #[error("capture task failed: {0}")]
    Join(String),
}

/// Parameters for one recording.
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub path: PathBuf,
    pub settings: CaptureSettings,
    pub channel_capacity: usize,
    pub writer_buffer_bytes: usize,
}

impl RecordOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            settings: CaptureSettings::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            writer_buffer_bytes: rmac_core::trace::writer::DEFAULT_BUFFER_BYTES,
        }
    }
}

/// Outcome of a finished recording.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSummary {
    pub session_id: Uuid,
    pub path: PathBuf,
    pub reason: StopReason,
    pub stats: CaptureStats,
    /// Session length as measured by the capture timebase.
    pub duration_micros: u64,
}

/// Owns the session controller and scanners for one recording.
pub struct RecordSession {
    controller: SessionController,
    scanners: ScannerSet,
    status: Arc<dyn StatusSink>,
}

impl RecordSession {
    pub fn new(controller: SessionController, scanners: ScannerSet, status: Arc<dyn StatusSink>) -> Self {
        Self {
            controller,
            scanners,
            status,
        }
    }

    /// Records from `source` into `options.path` until stopped.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Trace`] if the trace cannot be created or flushed.
    /// - [`RecordError::Capture`] if the input source cannot start.
    /// - [`RecordError::Join`] if the capture task panics.
    pub async fn run<S: InputSource + ?Sized>(
        self,
        source: &S,
        options: RecordOptions,
        cancel: CancelToken,
    ) -> Result<RecordSummary, RecordError> {
        let span = info_span!("record", session = %self.controller.state().id());
        self.run_inner(source, options, cancel).instrument(span).await
    }

    async fn run_inner<S: InputSource + ?Sized>(
        self,
        source: &S,
        options: RecordOptions,
        cancel: CancelToken,
    ) -> Result<RecordSummary, RecordError> {
        let Self {
            controller,
            scanners,
            status,
        } = self;
        let state = Arc::clone(controller.state());

        let writer = match TraceWriter::create_with_capacity(
            &options.path,
            &TraceHeader::default(),
            options.writer_buffer_bytes,
        ) {
            Ok(writer) => writer,
            Err(e) => {
                scanners.shutdown().await;
                return Err(e.into());
            }
        };

        let timebase = Arc::new(Timebase::start());
        let rx = match source.start(Arc::clone(&timebase), options.channel_capacity) {
            Ok(rx) => rx,
            Err(e) => {
                scanners.shutdown().await;
                return Err(e.into());
            }
        };

        controller.set_recording(true);
        status.publish(&StatusSnapshot::capture(&state, PlaybackState::Idle));
        info!(
            path = %options.path.display(),
            stop_key = options.settings.stop_key,
            "recording started"
        );

        let mut pipeline = CapturePipeline::new(writer, Arc::clone(&state), options.settings);
        let task_cancel = cancel.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let reason = pipeline.run(&rx, &task_cancel);
            (pipeline, reason)
        })
        .await;

        source.stop();
        controller.set_recording(false);
        cancel.cancel();
        scanners.shutdown().await;

        let (pipeline, reason) = joined.map_err(|e| RecordError::Join(e.to_string()))?;
        let mut stats = pipeline.finish()?;
        stats.notifications_dropped = source.dropped_notifications();
        let duration_micros = timebase.elapsed_micros();

        status.publish(
            &StatusSnapshot::capture(&state, PlaybackState::Idle).with_events(stats.events_written),
        );
        if stats.notifications_dropped > 0 {
            warn!(
                dropped = stats.notifications_dropped,
                "input notifications were dropped because the capture channel was full"
            );
        }
        info!(
            ?reason,
            events = stats.events_written,
            filtered = stats.filtered_keys,
            duration_ms = duration_micros / 1_000,
            "recording finished"
        );

        Ok(RecordSummary {
            session_id: state.id(),
            path: options.path,
            reason,
            stats,
            duration_micros,
        })
    }
}
