//! Process-wide session flags shared by capture, playback, and scanners.
//!
//! # Single writer per flag
//!
//! Many tasks read these flags; each flag has exactly one writer:
//!
//! | Flag                   | Writer                                   |
//! |------------------------|------------------------------------------|
//! | `recording`, `playing` | the [`SessionController`] (one per state) |
//! | `vision_absolute_hint` | the [`ModeWriter`] (claimed once)        |
//!
//! The rule is enforced with handle types rather than convention: the
//! controller is created together with the state and is not `Clone`, and
//! [`SessionState::claim_mode_writer`] hands out the mode writer at most
//! once.  Readers use relaxed loads and tolerate slightly stale values; the
//! flags only steer heuristic automation, never correctness decisions.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether pointer motion is recorded as deltas or as screen positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PointerMode {
    #[default]
    Relative,
    Absolute,
}

/// Shared flags for one recording or playback session.
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    recording: AtomicBool,
    playing: AtomicBool,
    vision_absolute_hint: AtomicBool,
    /// Bumped every time the hint goes from set to cleared.
    hint_releases: AtomicU64,
    mode_writer_claimed: AtomicBool,
}

impl SessionState {
    /// Creates a state with every flag cleared, plus the controller that owns
    /// the `recording` and `playing` flags.
    pub fn new() -> (Arc<Self>, SessionController) {
        let state = Arc::new(Self {
            id: Uuid::new_v4(),
            recording: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            vision_absolute_hint: AtomicBool::new(false),
            hint_releases: AtomicU64::new(0),
            mode_writer_claimed: AtomicBool::new(false),
        });
        let controller = SessionController {
            state: Arc::clone(&state),
        };
        (state, controller)
    }

    /// Identifier used to correlate log lines for this session.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Latest pointer-mode hint published by the vision detector.
    pub fn vision_absolute_hint(&self) -> bool {
        self.vision_absolute_hint.load(Ordering::Relaxed)
    }

    /// How many times the vision hint has been cleared after being set.
    ///
    /// Lets a reader notice an off-and-on toggle it never sampled.
    pub fn vision_hint_releases(&self) -> u64 {
        self.hint_releases.load(Ordering::Acquire)
    }

    fn store_hint(&self, on: bool) {
        let was = self.vision_absolute_hint.swap(on, Ordering::AcqRel);
        if was && !on {
            self.hint_releases.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Hands out the only writer for the vision mode hint.
    ///
    /// Returns `None` if a writer has already been claimed.
    pub fn claim_mode_writer(self: &Arc<Self>) -> Option<ModeWriter> {
        self.mode_writer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ModeWriter {
                state: Arc::clone(self),
            })
    }
}

/// Sole writer of the `recording` and `playing` flags.
#[derive(Debug)]
pub struct SessionController {
    state: Arc<SessionState>,
}

impl SessionController {
    pub fn set_recording(&self, on: bool) {
        self.state.recording.store(on, Ordering::Relaxed);
    }

    pub fn set_playing(&self, on: bool) {
        self.state.playing.store(on, Ordering::Relaxed);
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.state
    }
}

/// Sole writer of the vision pointer-mode hint.
#[derive(Debug)]
pub struct ModeWriter {
    state: Arc<SessionState>,
}

impl ModeWriter {
    pub fn set_absolute_hint(&self, on: bool) {
        self.state.store_hint(on);
    }
}

impl Drop for ModeWriter {
    fn drop(&mut self) {
        // A departed detector must not leave the capture stuck in absolute mode.
        self.state.store_hint(false);
    }
}

/// Cooperative cancellation flag shared by a session and whoever stops it
/// (stop key, Ctrl-C).
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
