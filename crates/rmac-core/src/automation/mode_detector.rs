//! Scan policy that drives the pointer-mode hint.
//!
//! Some applications switch between a free cursor (menus, maps) and a
//! captured, relative pointer (camera control).  A template that is only
//! visible in cursor mode tells the capture pipeline which form of pointer
//! motion to record.

use tracing::info;

use super::{Detection, ScanPolicy};
use crate::session::{ModeWriter, SessionState};

/// Sets the vision absolute-mode hint whenever its template is on screen.
pub struct ModeDetector {
    writer: ModeWriter,
    last: Option<bool>,
}

impl ModeDetector {
    /// Takes ownership of the session's unique mode writer.
    pub fn new(writer: ModeWriter) -> Self {
        Self { writer, last: None }
    }
}

impl ScanPolicy for ModeDetector {
    fn on_detection(&mut self, _state: &SessionState, detection: &Detection) {
        let absolute = detection.result.found;
        if self.last != Some(absolute) {
            info!(scanner = %detection.scanner, absolute, "pointer mode hint changed");
            self.last = Some(absolute);
        }
        self.writer.set_absolute_hint(absolute);
    }

    fn on_inactive(&mut self, _state: &SessionState) {
        self.writer.set_absolute_hint(false);
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::MatchResult;

    fn detection(found: bool) -> Detection {
        Detection {
            scanner: "mode".to_string(),
            scan: 1,
            result: MatchResult {
                found,
                center: (0, 0),
                confidence: if found { 0.95 } else { 0.1 },
            },
            frame_size: (1920, 1080),
        }
    }

    #[test]
    fn test_match_turns_hint_on_and_miss_turns_it_off() {
        // Arrange
        let (state, _ctl) = SessionState::new();
        let mut detector = ModeDetector::new(state.claim_mode_writer().unwrap());

        // Act / Assert
        detector.on_detection(&state, &detection(true));
        assert!(state.vision_absolute_hint());
        detector.on_detection(&state, &detection(false));
        assert!(!state.vision_absolute_hint());
    }

    #[test]
    fn test_going_inactive_clears_hint() {
        let (state, _ctl) = SessionState::new();
        let mut detector = ModeDetector::new(state.claim_mode_writer().unwrap());
        detector.on_detection(&state, &detection(true));

        detector.on_inactive(&state);

        assert!(!state.vision_absolute_hint());
    }

    #[test]
    fn test_dropping_detector_clears_hint() {
        let (state, _ctl) = SessionState::new();
        let mut detector = ModeDetector::new(state.claim_mode_writer().unwrap());
        detector.on_detection(&state, &detection(true));

        drop(detector);

        assert!(!state.vision_absolute_hint());
    }
}
