//! Point-in-time session status for whoever displays it.
//!
//! Snapshots flow one way: the session controllers publish them at each
//! transition and nothing ever reads them back.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::automation::Detection;
use crate::session::{PointerMode, SessionState};

/// Lifecycle of one playback run.
///
/// ```text
/// Idle ──▶ Armed (countdown) ──▶ Running ──▶ Completed
///              │                    │
///              └────────────────────┴──────▶ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Armed,
    Running,
    Completed,
    Cancelled,
}

impl PlaybackState {
    /// `true` for `Completed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, PlaybackState::Completed | PlaybackState::Cancelled)
    }
}

/// Everything a status display needs at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub session_id: Uuid,
    pub recording: bool,
    pub playing: bool,
    pub pointer_mode: PointerMode,
    pub playback_state: PlaybackState,
    /// Events written (recording) or dispatched (playback) so far.
    pub events: u64,
    pub detections: Vec<Detection>,
}

impl StatusSnapshot {
    /// Captures the session flags; counters and detections start empty.
    pub fn capture(state: &SessionState, playback_state: PlaybackState) -> Self {
        let pointer_mode = if state.vision_absolute_hint() {
            PointerMode::Absolute
        } else {
            PointerMode::Relative
        };
        Self {
            session_id: state.id(),
            recording: state.is_recording(),
            playing: state.is_playing(),
            pointer_mode,
            playback_state,
            events: 0,
            detections: Vec::new(),
        }
    }

    pub fn with_events(mut self, events: u64) -> Self {
        self.events = events;
        self
    }

    pub fn with_detections(mut self, detections: Vec<Detection>) -> Self {
        self.detections = detections;
        self
    }
}

/// Receives status snapshots.  Implementations must not block.
pub trait StatusSink: Send + Sync {
    fn publish(&self, snapshot: &StatusSnapshot);
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn publish(&self, _snapshot: &StatusSnapshot) {}
}
