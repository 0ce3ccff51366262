//! Scan policy that steers toward an on-screen target during playback.
//!
//! Used to follow a quest marker or hunt a target while a trace plays: the
//! scanner locates the template, and this policy holds the key that turns
//! toward it.  A target left of centre holds `left`, right of centre holds
//! `right`, and a target within the dead zone holds `forward`.  Losing the
//! target releases every steering key.
//!
//! Presses go through the shared [`HeldInputs`], so anything still held when
//! playback ends is released together with the trace's own keys.

use std::sync::Arc;

use rmac_core::automation::{Detection, ScanPolicy};
use rmac_core::keymap::vk;
use rmac_core::SessionState;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::held_inputs::HeldInputs;

/// Virtual-key codes used for steering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteeringKeys {
    pub left: u8,
    pub right: u8,
    pub forward: u8,
}

impl Default for SteeringKeys {
    fn default() -> Self {
        Self {
            left: vk::A,
            right: vk::D,
            forward: vk::W,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Heading {
    Idle,
    Left,
    Right,
    Forward,
}

pub struct SteeringPolicy {
    held: Arc<HeldInputs>,
    keys: SteeringKeys,
    /// Half-width, in pixels, of the band around the centre that counts as
    /// straight ahead.
    dead_zone: u32,
    heading: Heading,
}

impl SteeringPolicy {
    pub fn new(held: Arc<HeldInputs>, keys: SteeringKeys, dead_zone: u32) -> Self {
        Self {
            held,
            keys,
            dead_zone,
            heading: Heading::Idle,
        }
    }

    fn key_for(&self, heading: Heading) -> Option<u8> {
        match heading {
            Heading::Idle => None,
            Heading::Left => Some(self.keys.left),
            Heading::Right => Some(self.keys.right),
            Heading::Forward => Some(self.keys.forward),
        }
    }

    fn steer(&mut self, heading: Heading) {
        if heading == self.heading {
            return;
        }
        if let Some(code) = self.key_for(self.heading) {
            self.held.release_key(code);
        }
        if let Some(code) = self.key_for(heading) {
            self.held.press_key(code);
        }
        debug!(from = ?self.heading, to = ?heading, "steering");
        self.heading = heading;
    }

    fn heading_for(&self, detection: &Detection) -> Heading {
        if !detection.result.found {
            return Heading::Idle;
        }
        let centre = i64::from(detection.frame_size.0) / 2;
        let offset = i64::from(detection.result.center.0) - centre;
        let dead_zone = i64::from(self.dead_zone);
        if offset < -dead_zone {
            Heading::Left
        } else if offset > dead_zone {
            Heading::Right
        } else {
            Heading::Forward
        }
    }
}

impl ScanPolicy for SteeringPolicy {
    fn on_detection(&mut self, state: &SessionState, detection: &Detection) {
        let heading = if state.is_playing() {
            self.heading_for(detection)
        } else {
            Heading::Idle
        };
        self.steer(heading);
    }

    fn on_inactive(&mut self, _state: &SessionState) {
        self.steer(Heading::Idle);
    }

    fn on_stop(&mut self, _state: &SessionState) {
        self.steer(Heading::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::injection::mock::{InjectedInput, RecordingInjector};
    use rmac_core::automation::MatchResult;

    fn detection(found: bool, x: i32) -> Detection {
        Detection {
            scanner: "marker".to_string(),
            scan: 1,
            result: MatchResult {
                found,
                center: (x, 300),
                confidence: if found { 0.9 } else { 0.0 },
            },
            frame_size: (1000, 600),
        }
    }

    fn setup() -> (Arc<RecordingInjector>, Arc<HeldInputs>, SteeringPolicy) {
        let injector = Arc::new(RecordingInjector::new());
        let held = Arc::new(HeldInputs::new(injector.clone()));
        let policy = SteeringPolicy::new(Arc::clone(&held), SteeringKeys::default(), 50);
        (injector, held, policy)
    }

    fn key(code: u8, down: bool) -> InjectedInput {
        InjectedInput::Key { code, down }
    }

    #[test]
    fn test_target_left_of_centre_holds_left() {
        // Arrange
        let (injector, held, mut policy) = setup();
        let (state, ctl) = SessionState::new();
        ctl.set_playing(true);

        // Act
        policy.on_detection(&state, &detection(true, 200));

        // Assert
        assert!(held.is_key_held(vk::A));
        assert_eq!(injector.recorded(), vec![key(vk::A, true)]);
    }

    #[test]
    fn test_switching_sides_releases_the_previous_key_first() {
        let (injector, held, mut policy) = setup();
        let (state, ctl) = SessionState::new();
        ctl.set_playing(true);

        policy.on_detection(&state, &detection(true, 200));
        policy.on_detection(&state, &detection(true, 800));

        assert!(!held.is_key_held(vk::A));
        assert!(held.is_key_held(vk::D));
        assert_eq!(
            injector.recorded(),
            vec![key(vk::A, true), key(vk::A, false), key(vk::D, true)]
        );
    }

    #[test]
    fn test_target_inside_dead_zone_holds_forward() {
        let (_injector, held, mut policy) = setup();
        let (state, ctl) = SessionState::new();
        ctl.set_playing(true);

        policy.on_detection(&state, &detection(true, 540));

        assert!(held.is_key_held(vk::W));
        assert_eq!(held.held_count(), 1);
    }

    #[test]
    fn test_repeated_heading_does_not_repress() {
        let (injector, _held, mut policy) = setup();
        let (state, ctl) = SessionState::new();
        ctl.set_playing(true);

        policy.on_detection(&state, &detection(true, 500));
        policy.on_detection(&state, &detection(true, 510));

        assert_eq!(injector.recorded(), vec![key(vk::W, true)]);
    }

    #[test]
    fn test_lost_target_releases_steering() {
        // Arrange
        let (_injector, held, mut policy) = setup();
        let (state, ctl) = SessionState::new();
        ctl.set_playing(true);
        policy.on_detection(&state, &detection(true, 900));

        // Act
        policy.on_detection(&state, &detection(false, 0));

        // Assert
        assert_eq!(held.held_count(), 0);
    }

    #[test]
    fn test_nothing_is_pressed_unless_playing() {
        let (injector, _held, mut policy) = setup();
        let (state, _ctl) = SessionState::new();

        policy.on_detection(&state, &detection(true, 100));

        assert!(injector.recorded().is_empty());
    }

    #[test]
    fn test_stop_releases_held_key() {
        let (_injector, held, mut policy) = setup();
        let (state, ctl) = SessionState::new();
        ctl.set_playing(true);
        policy.on_detection(&state, &detection(true, 100));

        policy.on_stop(&state);

        assert!(!held.is_key_held(vk::A));
    }
}
