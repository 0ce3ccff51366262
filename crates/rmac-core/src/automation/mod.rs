//! Background screen scanners.
//!
//! A scanner is a tokio task that, on its own cadence, grabs a frame, asks a
//! template matcher where (if anywhere) a template appears, publishes the
//! result on its own `watch` channel, and hands it to a [`ScanPolicy`] that
//! decides what to do about it (flip the pointer-mode hint, steer, ...).
//!
//! # Collaborators (for beginners)
//!
//! Screen capture and template matching are not implemented here; they are
//! reached through two traits so the scanning loop can be tested with fakes:
//!
//! - [`FrameSource`] produces the current screen image (or `None` when
//!   capture is momentarily unavailable).
//! - [`TemplateMatcher`] is a pure function from `(frame, template,
//!   threshold)` to a [`MatchResult`].
//!
//! Scanners only *read* [`SessionState`](crate::session::SessionState).  The
//! one exception is the mode detector, which owns the unique
//! [`ModeWriter`](crate::session::ModeWriter).

pub mod mode_detector;
pub mod scanner;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::SessionState;

pub use mode_detector::ModeDetector;
pub use scanner::{ScannerHandle, ScannerSet};

/// An 8-bit grayscale image, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A named image to look for inside a [`Frame`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Best match of a template in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MatchResult {
    pub found: bool,
    /// Screen coordinates of the match centre.  Meaningless when `found` is
    /// `false`.
    pub center: (i32, i32),
    pub confidence: f32,
}

impl MatchResult {
    pub fn not_found() -> Self {
        Self::default()
    }
}

/// One scan outcome, as published on a scanner's channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub scanner: String,
    /// Monotonic per-scanner counter, starting at 1.
    pub scan: u64,
    pub result: MatchResult,
    /// Size of the frame the match was found in, so policies can reason
    /// about "left of centre" without knowing the screen geometry.
    pub frame_size: (u32, u32),
}

/// Source of screen images.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Option<Frame>;
}

/// Locates a template in a frame.  Must be side-effect free.
pub trait TemplateMatcher: Send + Sync {
    fn detect_best_match(&self, frame: &Frame, template: &Template, threshold: f32) -> MatchResult;
}

/// Reaction to scan results.  Owned by exactly one scanner task.
pub trait ScanPolicy: Send + 'static {
    fn on_detection(&mut self, state: &SessionState, detection: &Detection);

    /// Called when a scan is skipped because the scanner's activation
    /// predicate no longer holds.  Policies holding inputs release them here.
    fn on_inactive(&mut self, _state: &SessionState) {}

    /// Called once when the scanner task stops.
    fn on_stop(&mut self, _state: &SessionState) {}
}

/// When a scanner is allowed to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    Always,
    WhileRecording,
    WhilePlaying,
}

impl Activation {
    pub fn holds(self, state: &SessionState) -> bool {
        match self {
            Activation::Always => true,
            Activation::WhileRecording => state.is_recording(),
            Activation::WhilePlaying => state.is_playing(),
        }
    }
}

/// Everything one scanner needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub name: String,
    pub interval: Duration,
    /// Minimum confidence for a match to count as found.
    pub threshold: f32,
    pub template: Arc<Template>,
    pub active_when: Activation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_follows_session_flags() {
        // Arrange
        let (state, ctl) = SessionState::new();

        // Act / Assert
        assert!(Activation::Always.holds(&state));
        assert!(!Activation::WhileRecording.holds(&state));
        assert!(!Activation::WhilePlaying.holds(&state));

        ctl.set_playing(true);
        assert!(Activation::WhilePlaying.holds(&state));
        assert!(!Activation::WhileRecording.holds(&state));
    }

    #[test]
    fn test_not_found_result_has_zero_confidence() {
        let r = MatchResult::not_found();
        assert!(!r.found);
        assert_eq!(r.confidence, 0.0);
    }
}
