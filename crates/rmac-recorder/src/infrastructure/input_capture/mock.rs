//! Mock input source for unit testing.
//!
//! Allows tests to inject synthetic [`RawInputEvent`]s without a raw-input
//! sink window.  Injection uses the same bounded `try_send` path as the real
//! adapter, so channel-full drops can be tested too.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};

use rmac_core::Timebase;

use super::{CaptureError, InputSource, RawInputEvent};

/// A mock implementation of [`InputSource`] that allows tests to inject events.
#[derive(Clone, Default)]
pub struct MockInputSource {
    sender: Arc<Mutex<Option<SyncSender<RawInputEvent>>>>,
    dropped: Arc<AtomicU64>,
    stop_calls: Arc<AtomicU64>,
}

impl MockInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects a synthetic event, as if reported by the OS.
    ///
    /// Returns `false` if the event was dropped: not started, stopped, or
    /// the channel was full.
    pub fn inject_event(&self, event: RawInputEvent) -> bool {
        let guard = self.sender.lock().expect("lock poisoned");
        let Some(sender) = guard.as_ref() else {
            return false;
        };
        match sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn stop_calls(&self) -> u64 {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl InputSource for MockInputSource {
    fn start(
        &self,
        _timebase: Arc<Timebase>,
        capacity: usize,
    ) -> Result<Receiver<RawInputEvent>, CaptureError> {
        let mut guard = self.sender.lock().expect("lock poisoned");
        if guard.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        *guard = Some(tx);
        Ok(rx)
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        // Dropping the sender closes the channel.
        *self.sender.lock().expect("lock poisoned") = None;
    }

    fn dropped_notifications(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_capture::ButtonTransitions;

    fn key(vk: u8, down: bool) -> RawInputEvent {
        RawInputEvent::Key { vk, down, injected: false, at_micros: 0 }
    }

    #[test]
    fn test_mock_input_source_starts_and_receives_events() {
        // Arrange
        let source = MockInputSource::new();
        let rx = source.start(Arc::new(Timebase::start()), 8).expect("start should succeed");

        // Act
        assert!(source.inject_event(key(0x41, true)));

        // Assert
        let event = rx.recv().expect("should receive event");
        assert!(matches!(event, RawInputEvent::Key { vk: 0x41, down: true, .. }));
    }

    #[test]
    fn test_mock_input_source_stop_closes_channel() {
        // Arrange
        let source = MockInputSource::new();
        let rx = source.start(Arc::new(Timebase::start()), 8).unwrap();

        // Act
        source.stop();

        // Assert – channel should be disconnected
        assert!(rx.recv().is_err(), "channel should be closed after stop()");
        assert_eq!(source.stop_calls(), 1);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let source = MockInputSource::new();
        let _rx = source.start(Arc::new(Timebase::start()), 8).unwrap();
        let again = source.start(Arc::new(Timebase::start()), 8);
        assert!(matches!(again, Err(CaptureError::AlreadyStarted)));
    }

    #[test]
    fn test_full_channel_drops_and_counts() {
        // Arrange
        let source = MockInputSource::new();
        let _rx = source.start(Arc::new(Timebase::start()), 2).unwrap();

        // Act
        let accepted: Vec<bool> = (0..4).map(|_| source.inject_event(key(0x41, true))).collect();

        // Assert
        assert_eq!(accepted, vec![true, true, false, false]);
        assert_eq!(source.dropped_notifications(), 2);
    }

    #[test]
    fn test_inject_before_start_is_dropped() {
        let source = MockInputSource::new();
        let mouse = RawInputEvent::Mouse {
            dx: 1,
            dy: 1,
            cursor: (0, 0),
            buttons: ButtonTransitions::default(),
            wheel: None,
            hwheel: None,
            at_micros: 0,
        };
        assert!(!source.inject_event(mouse));
    }
}
