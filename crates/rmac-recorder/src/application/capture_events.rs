//! CapturePipeline: turns raw input notifications into trace events.
//!
//! This is the recording hot path.  It runs on a blocking thread, owns the
//! [`TraceWriter`] outright, and processes one [`RawInputEvent`] at a time:
//!
//! 1. Keys: the stop key ends the session and is never recorded; the
//!    sentinel code `0xFF` is filtered; the absolute-mode modifier is
//!    tracked (and recorded like any other key).
//! 2. Mouse: relative deltas, or absolute cursor samples while the modifier
//!    is held or the vision hint is set; then button and wheel transitions.
//! 3. The events built for the notification are appended in order, but only
//!    while the session's `recording` flag is set.
//!
//! A failed append is logged once, closes the writer, and capture carries
//! on dropping events; losing the tail of a recording is better than
//! stalling the input stream.

use std::fs::File;
use std::io::Write;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use rmac_core::keymap::vk;
use rmac_core::trace::{Event, TraceError, TraceWriter};
use rmac_core::{CancelToken, PointerMode, SessionState};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::infrastructure::input_capture::RawInputEvent;

/// How long the capture loop waits for a notification before re-checking
/// cancellation.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Key bindings that steer capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    pub stop_key: u8,
    pub absolute_mode_key: u8,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            stop_key: vk::ESCAPE,
            absolute_mode_key: vk::MENU,
        }
    }
}

/// Counters for one recording session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    /// Notifications processed by the pipeline.
    pub notifications: u64,
    pub events_written: u64,
    /// Events built but not written (not recording, or writer unavailable).
    pub events_dropped: u64,
    /// Stop-key and sentinel transitions that never became events.
    pub filtered_keys: u64,
    /// Notifications the OS adapter discarded because the channel was full.
    pub notifications_dropped: u64,
}

/// What the caller should do after a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    Continue,
    Stop,
}

/// Why the capture loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    StopKey,
    Cancelled,
    SourceClosed,
}

/// Stateful raw-input → trace-event translator.
pub struct CapturePipeline<W: Write = File> {
    writer: TraceWriter<W>,
    state: Arc<SessionState>,
    settings: CaptureSettings,
    modifier_held: bool,
    /// Mode seen at the previous notification.
    mode: PointerMode,
    /// Vision hint release count seen at the previous notification.
    seen_hint_releases: u64,
    last_absolute: Option<(i32, i32)>,
    /// Reused for every notification.
    scratch: Vec<Event>,
    stats: CaptureStats,
}

impl<W: Write> CapturePipeline<W> {
    pub fn new(writer: TraceWriter<W>, state: Arc<SessionState>, settings: CaptureSettings) -> Self {
        let seen_hint_releases = state.vision_hint_releases();
        Self {
            writer,
            state,
            settings,
            modifier_held: false,
            mode: PointerMode::Relative,
            seen_hint_releases,
            last_absolute: None,
            scratch: Vec::with_capacity(8),
            stats: CaptureStats::default(),
        }
    }

    /// Current pointer mode: absolute while the modifier is held or the
    /// vision hint is set.
    pub fn pointer_mode(&self) -> PointerMode {
        if self.modifier_held || self.state.vision_absolute_hint() {
            PointerMode::Absolute
        } else {
            PointerMode::Relative
        }
    }

    /// Re-reads the pointer mode and forgets the last absolute sample when
    /// absolute mode has ended since the previous check, including a vision
    /// hint that went off and back on in between.
    fn observe_mode(&mut self) -> PointerMode {
        let current = self.pointer_mode();
        let releases = self.state.vision_hint_releases();
        let left_absolute = self.mode == PointerMode::Absolute && current == PointerMode::Relative;
        if left_absolute || releases != self.seen_hint_releases {
            self.last_absolute = None;
        }
        self.mode = current;
        self.seen_hint_releases = releases;
        current
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    /// Processes one notification.
    pub fn handle(&mut self, raw: &RawInputEvent) -> CaptureStep {
        self.stats.notifications += 1;
        self.scratch.clear();
        let mode = self.observe_mode();

        match *raw {
            RawInputEvent::Key { vk, down, at_micros, .. } => {
                if vk == self.settings.stop_key {
                    self.stats.filtered_keys += 1;
                    if down {
                        info!("stop key pressed");
                        return CaptureStep::Stop;
                    }
                    return CaptureStep::Continue;
                }
                if vk == vk::EXTENDED_SENTINEL {
                    self.stats.filtered_keys += 1;
                    return CaptureStep::Continue;
                }
                if vk == self.settings.absolute_mode_key && self.modifier_held != down {
                    self.modifier_held = down;
                    debug!(absolute = down, "absolute-mode modifier changed");
                    self.observe_mode();
                }
                self.scratch.push(Event::key(at_micros, vk, down));
            }
            RawInputEvent::Mouse {
                dx,
                dy,
                cursor,
                buttons,
                wheel,
                hwheel,
                at_micros,
            } => {
                match mode {
                    PointerMode::Absolute => {
                        if self.last_absolute != Some(cursor) {
                            self.scratch
                                .push(Event::pointer_absolute(at_micros, cursor.0, cursor.1));
                            self.last_absolute = Some(cursor);
                        }
                    }
                    PointerMode::Relative => {
                        if dx != 0 || dy != 0 {
                            self.scratch.push(Event::pointer_delta(at_micros, dx, dy));
                        }
                    }
                }
                for (button, down) in buttons.iter() {
                    self.scratch.push(Event::button(at_micros, button, down));
                }
                if let Some(delta) = wheel {
                    self.scratch.push(Event::scroll(at_micros, delta.into(), false));
                }
                if let Some(delta) = hwheel {
                    self.scratch.push(Event::scroll(at_micros, delta.into(), true));
                }
            }
        }

        self.flush_scratch();
        CaptureStep::Continue
    }

    fn flush_scratch(&mut self) {
        if self.scratch.is_empty() {
            return;
        }
        if !self.state.is_recording() || !self.writer.is_open() {
            self.stats.events_dropped += self.scratch.len() as u64;
            return;
        }
        for event in &self.scratch {
            if !self.writer.is_open() {
                self.stats.events_dropped += 1;
                continue;
            }
            match self.writer.append(event) {
                Ok(()) => self.stats.events_written += 1,
                Err(e) => {
                    error!(
                        path = %self.writer.path().display(),
                        "trace append failed; recording continues without a writer: {e}"
                    );
                    self.stats.events_dropped += 1;
                    if let Err(e) = self.writer.close() {
                        warn!("closing trace after append failure also failed: {e}");
                    }
                }
            }
        }
    }

    /// Pulls notifications until the stop key, cancellation, or the source
    /// closing.  A stop key also cancels `cancel`, so every other session
    /// task winds down with the pipeline.
    pub fn run(&mut self, rx: &Receiver<RawInputEvent>, cancel: &CancelToken) -> StopReason {
        loop {
            if cancel.is_cancelled() {
                return StopReason::Cancelled;
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(raw) => {
                    if self.handle(&raw) == CaptureStep::Stop {
                        cancel.cancel();
                        return StopReason::StopKey;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return StopReason::SourceClosed,
            }
        }
    }

    /// Flushes and closes the trace, returning the final counters.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the final flush fails.
    pub fn finish(mut self) -> Result<CaptureStats, TraceError> {
        let path = self.writer.path().to_path_buf();
        self.writer
            .close()
            .map_err(|source| TraceError::Io { path, source })?;
        Ok(self.stats)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_capture::ButtonTransitions;
    use rmac_core::session::SessionController;
    use rmac_core::trace::{read_trace_from, PointerButton, TraceHeader};
    use std::io;
    use std::sync::mpsc;

    /// Shared in-memory sink so tests can inspect bytes after the pipeline
    /// consumed the writer.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts the header, then fails every write.
    struct FailAfterHeader {
        written: usize,
    }

    impl Write for FailAfterHeader {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written >= 16 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.written += buf.len();
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            if self.written > 16 {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            Ok(())
        }
    }

    fn recording_pipeline() -> (CapturePipeline<SharedBuf>, SharedBuf, Arc<SessionState>, SessionController) {
        let buf = SharedBuf::default();
        // Capacity of one record: every append reaches the sink immediately.
        let writer = TraceWriter::from_writer(buf.clone(), "memory", &TraceHeader::default(), 1).unwrap();
        let (state, ctl) = SessionState::new();
        ctl.set_recording(true);
        let pipeline = CapturePipeline::new(writer, Arc::clone(&state), CaptureSettings::default());
        (pipeline, buf, state, ctl)
    }

    fn recorded(pipeline: CapturePipeline<SharedBuf>, buf: &SharedBuf) -> Vec<Event> {
        pipeline.finish().unwrap();
        let bytes = buf.0.lock().unwrap().clone();
        read_trace_from(bytes.as_slice()).unwrap().events
    }

    fn key(vk: u8, down: bool, at: u64) -> RawInputEvent {
        RawInputEvent::Key { vk, down, injected: false, at_micros: at }
    }

    fn mouse(dx: i32, dy: i32, cursor: (i32, i32), at: u64) -> RawInputEvent {
        RawInputEvent::Mouse {
            dx,
            dy,
            cursor,
            buttons: ButtonTransitions::default(),
            wheel: None,
            hwheel: None,
            at_micros: at,
        }
    }

    #[test]
    fn test_relative_motion_records_deltas_and_skips_zero() {
        // Arrange
        let (mut p, buf, _state, _ctl) = recording_pipeline();

        // Act
        p.handle(&mouse(5, -3, (100, 100), 0));
        p.handle(&mouse(0, 0, (100, 100), 10));

        // Assert
        assert_eq!(recorded(p, &buf), vec![Event::pointer_delta(0, 5, -3)]);
    }

    #[test]
    fn test_key_transitions_are_recorded_in_order() {
        let (mut p, buf, _state, _ctl) = recording_pipeline();

        p.handle(&key(0x41, true, 1_000));
        p.handle(&key(0x41, false, 1_000));

        assert_eq!(
            recorded(p, &buf),
            vec![Event::key(1_000, 0x41, true), Event::key(1_000, 0x41, false)]
        );
    }

    #[test]
    fn test_stop_key_is_never_recorded() {
        // Arrange
        let (mut p, buf, _state, _ctl) = recording_pipeline();

        // Act
        let up = p.handle(&key(vk::ESCAPE, false, 0));
        let down = p.handle(&key(vk::ESCAPE, true, 5));

        // Assert
        assert_eq!(up, CaptureStep::Continue);
        assert_eq!(down, CaptureStep::Stop);
        assert_eq!(p.stats().filtered_keys, 2);
        assert!(recorded(p, &buf).is_empty());
    }

    #[test]
    fn test_sentinel_key_is_filtered() {
        let (mut p, buf, _state, _ctl) = recording_pipeline();

        p.handle(&key(vk::EXTENDED_SENTINEL, true, 0));

        assert_eq!(p.stats().filtered_keys, 1);
        assert!(recorded(p, &buf).is_empty());
    }

    #[test]
    fn test_modifier_switches_to_absolute_and_dedups_samples() {
        // Arrange
        let (mut p, buf, _state, _ctl) = recording_pipeline();

        // Act
        p.handle(&key(vk::MENU, true, 0));
        p.handle(&mouse(3, 3, (500, 400), 10));
        p.handle(&mouse(0, 0, (500, 400), 20)); // identical sample
        p.handle(&mouse(1, 0, (501, 400), 30));
        p.handle(&key(vk::MENU, false, 40));
        p.handle(&mouse(2, 2, (503, 402), 50));

        // Assert
        assert_eq!(
            recorded(p, &buf),
            vec![
                Event::key(0, vk::MENU, true),
                Event::pointer_absolute(10, 500, 400),
                Event::pointer_absolute(30, 501, 400),
                Event::key(40, vk::MENU, false),
                Event::pointer_delta(50, 2, 2),
            ]
        );
    }

    #[test]
    fn test_leaving_absolute_mode_resets_dedup() {
        let (mut p, buf, _state, _ctl) = recording_pipeline();

        p.handle(&key(vk::MENU, true, 0));
        p.handle(&mouse(0, 0, (10, 10), 1));
        p.handle(&key(vk::MENU, false, 2));
        p.handle(&key(vk::MENU, true, 3));
        p.handle(&mouse(0, 0, (10, 10), 4));

        assert_eq!(
            recorded(p, &buf),
            vec![
                Event::key(0, vk::MENU, true),
                Event::pointer_absolute(1, 10, 10),
                Event::key(2, vk::MENU, false),
                Event::key(3, vk::MENU, true),
                Event::pointer_absolute(4, 10, 10),
            ]
        );
    }

    #[test]
    fn test_vision_hint_toggle_between_samples_resets_dedup() {
        // Arrange
        let (mut p, buf, state, _ctl) = recording_pipeline();
        let writer = state.claim_mode_writer().unwrap();
        writer.set_absolute_hint(true);
        p.handle(&mouse(0, 0, (10, 10), 1));

        // Act – off and on again with no notification in between
        writer.set_absolute_hint(false);
        writer.set_absolute_hint(true);
        p.handle(&mouse(0, 0, (10, 10), 2));

        // Assert
        assert_eq!(
            recorded(p, &buf),
            vec![
                Event::pointer_absolute(1, 10, 10),
                Event::pointer_absolute(2, 10, 10),
            ]
        );
    }

    #[test]
    fn test_vision_hint_cleared_at_a_key_event_resets_dedup() {
        // Arrange
        let (mut p, buf, state, _ctl) = recording_pipeline();
        let writer = state.claim_mode_writer().unwrap();
        writer.set_absolute_hint(true);
        p.handle(&mouse(0, 0, (10, 10), 1));

        // Act
        writer.set_absolute_hint(false);
        p.handle(&key(0x41, true, 2));
        writer.set_absolute_hint(true);
        p.handle(&mouse(0, 0, (10, 10), 3));

        // Assert
        assert_eq!(
            recorded(p, &buf),
            vec![
                Event::pointer_absolute(1, 10, 10),
                Event::key(2, 0x41, true),
                Event::pointer_absolute(3, 10, 10),
            ]
        );
    }

    #[test]
    fn test_vision_hint_enables_absolute_mode() {
        // Arrange
        let (mut p, buf, state, _ctl) = recording_pipeline();
        let writer = state.claim_mode_writer().unwrap();

        // Act
        writer.set_absolute_hint(true);
        assert_eq!(p.pointer_mode(), PointerMode::Absolute);
        p.handle(&mouse(4, 4, (20, 30), 7));

        // Assert
        assert_eq!(recorded(p, &buf), vec![Event::pointer_absolute(7, 20, 30)]);
    }

    #[test]
    fn test_buttons_and_wheels_recorded_in_any_mode() {
        // Arrange
        let (mut p, buf, _state, _ctl) = recording_pipeline();
        let report = RawInputEvent::Mouse {
            dx: 1,
            dy: 0,
            cursor: (0, 0),
            buttons: ButtonTransitions::default().press(PointerButton::Right),
            wheel: Some(-120),
            hwheel: Some(120),
            at_micros: 9,
        };

        // Act
        p.handle(&report);

        // Assert
        assert_eq!(
            recorded(p, &buf),
            vec![
                Event::pointer_delta(9, 1, 0),
                Event::button(9, PointerButton::Right, true),
                Event::scroll(9, -120, false),
                Event::scroll(9, 120, true),
            ]
        );
    }

    #[test]
    fn test_nothing_is_written_while_not_recording() {
        // Arrange
        let (mut p, buf, _state, ctl) = recording_pipeline();
        ctl.set_recording(false);

        // Act
        p.handle(&key(0x41, true, 0));

        // Assert
        assert_eq!(p.stats().events_dropped, 1);
        assert_eq!(p.stats().events_written, 0);
        assert!(recorded(p, &buf).is_empty());
    }

    #[test]
    fn test_append_failure_closes_writer_and_capture_continues() {
        // Arrange
        let writer =
            TraceWriter::from_writer(FailAfterHeader { written: 0 }, "failing", &TraceHeader::default(), 1)
                .unwrap();
        let (state, ctl) = SessionState::new();
        ctl.set_recording(true);
        let mut p = CapturePipeline::new(writer, state, CaptureSettings::default());

        // Act
        let first = p.handle(&key(0x41, true, 0));
        let second = p.handle(&key(0x41, false, 1));

        // Assert
        assert_eq!(first, CaptureStep::Continue);
        assert_eq!(second, CaptureStep::Continue);
        assert_eq!(p.stats().events_written, 0);
        assert_eq!(p.stats().events_dropped, 2);
        assert_eq!(p.stats().notifications, 2);
    }

    #[test]
    fn test_run_returns_on_stop_key_and_cancels_token() {
        // Arrange
        let (mut p, buf, _state, _ctl) = recording_pipeline();
        let (tx, rx) = mpsc::sync_channel(8);
        let cancel = CancelToken::new();
        tx.send(key(0x57, true, 0)).unwrap();
        tx.send(key(vk::ESCAPE, true, 5)).unwrap();
        tx.send(key(0x57, false, 6)).unwrap();

        // Act
        let reason = p.run(&rx, &cancel);

        // Assert
        assert_eq!(reason, StopReason::StopKey);
        assert!(cancel.is_cancelled());
        assert_eq!(recorded(p, &buf), vec![Event::key(0, 0x57, true)]);
    }

    #[test]
    fn test_run_observes_external_cancellation() {
        let (mut p, _buf, _state, _ctl) = recording_pipeline();
        let (_tx, rx) = mpsc::sync_channel::<RawInputEvent>(8);
        let cancel = CancelToken::new();
        cancel.cancel();

        assert_eq!(p.run(&rx, &cancel), StopReason::Cancelled);
    }

    #[test]
    fn test_run_ends_when_source_closes() {
        let (mut p, _buf, _state, _ctl) = recording_pipeline();
        let (tx, rx) = mpsc::sync_channel::<RawInputEvent>(8);
        drop(tx);

        assert_eq!(p.run(&rx, &CancelToken::new()), StopReason::SourceClosed);
    }
}
