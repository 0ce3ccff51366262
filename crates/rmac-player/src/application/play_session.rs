//! PlaySession: one complete playback, from reading the trace to the final
//! summary.
//!
//! State machine, published on a `watch` channel:
//!
//! ```text
//! Idle ──► Armed (countdown) ──► Running ──► Completed
//!              │                    │
//!              └────────────────────┴──────► Cancelled
//! ```
//!
//! Order of operations:
//!
//! 1. Read and validate the whole trace.  A bad file never arms anything.
//! 2. Start the stop-key watcher, if an input source was supplied.
//! 3. Count down (Armed), cancellable.
//! 4. Raise the `playing` flag and run the scheduler on a blocking thread.
//! 5. Lower the flag, join every scanner, then release whatever is still
//!    held and stop the watcher.

use std::path::PathBuf;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use rmac_core::automation::ScannerSet;
use rmac_core::keymap::vk;
use rmac_core::trace::{read_trace, TraceError};
use rmac_core::{
    CancelToken, MonotonicClock, PlaybackState, SessionController, StatusSink, StatusSnapshot,
    Timebase,
};
use rmac_recorder::{InputSource, RawInputEvent};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::held_inputs::HeldInputs;
use super::replay_trace::{
    PlaybackOutcome, PlaybackReport, PlaybackScheduler, ScreenGeometry,
};
use crate::infrastructure::timing::{PreciseSleeper, TimerResolutionGuard, DEFAULT_SPIN_THRESHOLD_US};

/// How often the stop-key watcher and the countdown re-check cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Bound of the stop-key watcher's input channel.
const WATCHER_CHANNEL_CAPACITY: usize = 256;

/// Errors that end a playback session.
#[derive(Debug, Error)]
pub enum PlayError {
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// The blocking playback task panicked or was aborted.
    #[error("playback task failed: {0}")]
    Join(String),
}

/// Parameters for one playback.
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub path: PathBuf,
    pub countdown: Duration,
    pub stop_key: u8,
    pub spin_threshold_us: u64,
    pub raise_timer_resolution: bool,
    pub geometry: ScreenGeometry,
}

impl PlayOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            countdown: Duration::from_secs(3),
            stop_key: vk::ESCAPE,
            spin_threshold_us: DEFAULT_SPIN_THRESHOLD_US,
            raise_timer_resolution: true,
            geometry: ScreenGeometry::default(),
        }
    }
}

/// Outcome of a finished playback.
#[derive(Debug, Clone, Serialize)]
pub struct PlaySummary {
    pub session_id: Uuid,
    pub path: PathBuf,
    pub state: PlaybackState,
    pub report: PlaybackReport,
    pub trace_events: usize,
    /// Bytes after the last whole record, ignored.
    pub trailing_bytes: usize,
    pub elapsed_micros: u64,
}

/// Owns the session controller, scanners and held-input tracker for one
/// playback.
pub struct PlaySession {
    controller: SessionController,
    scanners: ScannerSet,
    held: Arc<HeldInputs>,
    status: Arc<dyn StatusSink>,
    state_tx: watch::Sender<PlaybackState>,
}

impl PlaySession {
    pub fn new(
        controller: SessionController,
        scanners: ScannerSet,
        held: Arc<HeldInputs>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::Idle);
        Self {
            controller,
            scanners,
            held,
            status,
            state_tx,
        }
    }

    /// Receiver of every playback state transition.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state_tx.subscribe()
    }

    /// Plays the trace at `options.path`.
    ///
    /// `stop_source`, when given, is watched for the stop key; pressing it
    /// cancels playback.  Cancellation is not an error: the summary's state
    /// is [`PlaybackState::Cancelled`].
    ///
    /// # Errors
    ///
    /// - [`PlayError::Trace`] if the file is missing, unreadable or invalid.
    ///   Nothing is injected in that case.
    /// - [`PlayError::Join`] if the playback task panics.
    pub async fn run(
        self,
        stop_source: Option<&dyn InputSource>,
        options: PlayOptions,
        cancel: CancelToken,
    ) -> Result<PlaySummary, PlayError> {
        let span = info_span!("play", session = %self.controller.state().id());
        self.run_inner(stop_source, options, cancel).instrument(span).await
    }

    async fn run_inner(
        self,
        stop_source: Option<&dyn InputSource>,
        options: PlayOptions,
        cancel: CancelToken,
    ) -> Result<PlaySummary, PlayError> {
        let Self {
            controller,
            scanners,
            held,
            status,
            state_tx,
        } = self;
        let state = Arc::clone(controller.state());
        let transition = |next: PlaybackState, events: u64| {
            state_tx.send_replace(next);
            status.publish(&StatusSnapshot::capture(&state, next).with_events(events));
            debug!(state = ?next, "playback state");
        };

        let trace = match read_trace(&options.path) {
            Ok(trace) => trace,
            Err(e) => {
                scanners.shutdown().await;
                return Err(e.into());
            }
        };
        let trace_events = trace.events.len();
        let trailing_bytes = trace.trailing_bytes;
        info!(
            path = %options.path.display(),
            events = trace_events,
            duration_ms = trace.duration_micros() / 1_000,
            "trace loaded"
        );

        let timebase = Arc::new(Timebase::start());
        let watcher = stop_source.and_then(|source| {
            start_stop_key_watcher(source, Arc::clone(&timebase), options.stop_key, &cancel)
        });

        transition(PlaybackState::Armed, 0);
        let armed = countdown(options.countdown, &cancel).await;

        let report = if armed {
            controller.set_playing(true);
            transition(PlaybackState::Running, trace_events as u64);

            let mut scheduler = PlaybackScheduler::new(
                Arc::clone(held.injector()),
                Arc::clone(&held),
                PreciseSleeper::new(options.spin_threshold_us).with_cancel(cancel.clone()),
                MonotonicClock,
                options.geometry,
            );
            let events = trace.events;
            let task_cancel = cancel.clone();
            let raise = options.raise_timer_resolution;
            let joined = tokio::task::spawn_blocking(move || {
                let _resolution = TimerResolutionGuard::acquire(raise);
                scheduler.run(&events, &task_cancel)
            })
            .await;
            controller.set_playing(false);
            joined.map_err(|e| PlayError::Join(e.to_string()))
        } else {
            info!("playback cancelled during countdown");
            Ok(PlaybackReport {
                outcome: PlaybackOutcome::Cancelled,
                dispatched: 0,
                skipped: 0,
                released: 0,
            })
        };

        cancel.cancel();
        scanners.shutdown().await;
        let late_releases = held.release_all();
        if let Some(handle) = watcher {
            if let Some(source) = stop_source {
                source.stop();
            }
            if let Err(e) = handle.await {
                warn!(error = %e, "stop-key watcher failed");
            }
        }

        let mut report = report?;
        report.released += late_releases;
        let final_state = match report.outcome {
            PlaybackOutcome::Completed => PlaybackState::Completed,
            PlaybackOutcome::Cancelled => PlaybackState::Cancelled,
        };
        transition(final_state, report.dispatched);
        let elapsed_micros = timebase.elapsed_micros();
        info!(
            state = ?final_state,
            dispatched = report.dispatched,
            skipped = report.skipped,
            released = report.released,
            elapsed_ms = elapsed_micros / 1_000,
            "playback finished"
        );

        Ok(PlaySummary {
            session_id: state.id(),
            path: options.path,
            state: final_state,
            report,
            trace_events,
            trailing_bytes,
            elapsed_micros,
        })
    }
}

/// Waits out the countdown; returns `false` if cancelled first.
async fn countdown(duration: Duration, cancel: &CancelToken) -> bool {
    if !duration.is_zero() {
        info!(secs = duration.as_secs_f32(), "playback starts after countdown");
    }
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = tokio::time::Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep((deadline - now).min(POLL_INTERVAL)).await;
    }
}

fn start_stop_key_watcher(
    source: &dyn InputSource,
    timebase: Arc<Timebase>,
    stop_key: u8,
    cancel: &CancelToken,
) -> Option<JoinHandle<()>> {
    match source.start(timebase, WATCHER_CHANNEL_CAPACITY) {
        Ok(rx) => {
            let cancel = cancel.clone();
            Some(tokio::task::spawn_blocking(move || {
                watch_stop_key(&rx, stop_key, &cancel)
            }))
        }
        Err(e) => {
            warn!(error = %e, "stop key unavailable; use Ctrl-C to stop playback");
            None
        }
    }
}

/// Cancels `cancel` when `stop_key` goes down on a real device; injected
/// presses, such as the ones playback itself sends, are ignored.  Returns
/// when cancelled or when the source closes its channel.
fn watch_stop_key(rx: &Receiver<RawInputEvent>, stop_key: u8, cancel: &CancelToken) {
    while !cancel.is_cancelled() {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(RawInputEvent::Key {
                vk,
                down: true,
                injected: false,
                ..
            }) if vk == stop_key => {
                info!(stop_key, "stop key pressed");
                cancel.cancel();
                return;
            }
            Ok(_) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::injection::mock::{InjectedInput, RecordingInjector};
    use rmac_core::trace::{Event, TraceHeader, TraceWriter};
    use rmac_core::{NullStatusSink, SessionState};
    use rmac_recorder::infrastructure::input_capture::mock::MockInputSource;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("rmac_play_{}.rmac", Uuid::new_v4()))
    }

    fn write_trace(events: &[Event]) -> PathBuf {
        let path = temp_path();
        let mut writer = TraceWriter::create(&path, &TraceHeader::default()).unwrap();
        for event in events {
            writer.append(event).unwrap();
        }
        writer.close().unwrap();
        path
    }

    fn session() -> (Arc<SessionState>, Arc<RecordingInjector>, PlaySession) {
        let (state, ctl) = SessionState::new();
        let injector = Arc::new(RecordingInjector::new());
        let held = Arc::new(HeldInputs::new(injector.clone()));
        let session = PlaySession::new(
            ctl,
            ScannerSet::new(Arc::clone(&state)),
            held,
            Arc::new(NullStatusSink),
        );
        (state, injector, session)
    }

    fn quick(path: &PathBuf) -> PlayOptions {
        PlayOptions {
            countdown: Duration::ZERO,
            raise_timer_resolution: false,
            ..PlayOptions::new(path)
        }
    }

    #[tokio::test]
    async fn test_trace_is_replayed_and_completes() {
        // Arrange
        let path = write_trace(&[
            Event::pointer_delta(0, 5, -3),
            Event::key(1_000, 0x41, true),
            Event::key(1_000, 0x41, false),
        ]);
        let (state, injector, session) = session();
        let mut states = session.subscribe();

        // Act
        let summary = session.run(None, quick(&path), CancelToken::new()).await.unwrap();

        // Assert
        assert_eq!(summary.state, PlaybackState::Completed);
        assert_eq!(summary.report.dispatched, 3);
        assert_eq!(
            injector.recorded(),
            vec![
                InjectedInput::PointerDelta { dx: 5, dy: -3 },
                InjectedInput::Key { code: 0x41, down: true },
                InjectedInput::Key { code: 0x41, down: false },
            ]
        );
        assert!(!state.is_playing());
        assert_eq!(*states.borrow_and_update(), PlaybackState::Completed);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_missing_trace_is_an_error_and_injects_nothing() {
        let path = temp_path();
        let (_state, injector, session) = session();

        let result = session.run(None, quick(&path), CancelToken::new()).await;

        assert!(matches!(result, Err(PlayError::Trace(TraceError::Io { .. }))));
        assert!(injector.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_countdown_injects_nothing() {
        // Arrange
        let path = write_trace(&[Event::key(0, 0x41, true)]);
        let (_state, injector, session) = session();
        let cancel = CancelToken::new();
        cancel.cancel();
        let options = PlayOptions {
            countdown: Duration::from_secs(30),
            ..quick(&path)
        };

        // Act
        let summary = session.run(None, options, cancel).await.unwrap();

        // Assert
        assert_eq!(summary.state, PlaybackState::Cancelled);
        assert!(injector.recorded().is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_stop_key_cancels_and_releases_held_keys() {
        // Arrange – a key goes down, then a long gap
        let path = write_trace(&[
            Event::key(0, 0x57, true),
            Event::key(10_000_000, 0x57, false),
        ]);
        let (_state, injector, session) = session();
        let source = MockInputSource::new();
        let presser = source.clone();
        let feeder = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            while !presser.inject_event(RawInputEvent::Key {
                vk: vk::ESCAPE,
                down: true,
                injected: false,
                at_micros: 0,
            }) {
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        // Act
        let summary = session
            .run(Some(&source), quick(&path), CancelToken::new())
            .await
            .unwrap();
        feeder.join().unwrap();

        // Assert
        assert_eq!(summary.state, PlaybackState::Cancelled);
        assert_eq!(injector.keys(), vec![(0x57, true), (0x57, false)]);
        assert_eq!(summary.report.released, 1);
        assert_eq!(source.stop_calls(), 1);
        let _ = std::fs::remove_file(&path);
    }

    fn stop_key_press(injected: bool) -> RawInputEvent {
        RawInputEvent::Key {
            vk: vk::ESCAPE,
            down: true,
            injected,
            at_micros: 0,
        }
    }

    #[test]
    fn test_injected_stop_key_does_not_cancel() {
        // Arrange – playback typing the stop key itself
        let (tx, rx) = std::sync::mpsc::sync_channel(4);
        let cancel = CancelToken::new();
        tx.send(stop_key_press(true)).unwrap();
        drop(tx);

        // Act
        watch_stop_key(&rx, vk::ESCAPE, &cancel);

        // Assert
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_device_stop_key_cancels_after_injected_one_is_ignored() {
        let (tx, rx) = std::sync::mpsc::sync_channel(4);
        let cancel = CancelToken::new();
        tx.send(stop_key_press(true)).unwrap();
        tx.send(stop_key_press(false)).unwrap();

        watch_stop_key(&rx, vk::ESCAPE, &cancel);

        assert!(cancel.is_cancelled());
        assert!(rx.try_recv().is_err());
    }
}
