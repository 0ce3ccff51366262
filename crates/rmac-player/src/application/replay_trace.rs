//! PlaybackScheduler: re-emits a trace with its original timing.
//!
//! # Timing model
//!
//! Each event carries an absolute offset from the start of its recording.
//! Before dispatching event *i* the scheduler waits
//!
//! ```text
//! wait = offset(i) - max(offset(i-1), now)      (saturating at zero)
//! ```
//!
//! where `now` is elapsed time on the scheduler's own timebase, started when
//! playback starts.  If a sleep overshoots, `now` runs ahead of the previous
//! offset and the next wait shrinks by the same amount, so lateness never
//! accumulates across a long trace.  Events with equal offsets are
//! dispatched back to back, in file order.
//!
//! The sleeper is called exactly once per event, with zero when no wait is
//! needed, so the timing decisions are observable in tests.
//!
//! # Cleanup
//!
//! Key and button transitions go through [`HeldInputs`].  Whether playback
//! completes or is cancelled, everything still held is released before
//! [`PlaybackScheduler::run`] returns.

use std::sync::Arc;

use rmac_core::trace::{Event, InputAction};
use rmac_core::{CancelToken, Clock, MonotonicClock, Timebase};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::held_inputs::HeldInputs;
use super::inject_input::InputInjector;

/// Upper end of the normalized absolute coordinate range.
pub const NORMALIZED_MAX: u16 = 65_535;

/// Blocking wait used between events.
pub trait Sleeper: Send {
    fn sleep_micros(&mut self, micros: u64);
}

/// Screen size used to normalize absolute pointer positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
}

impl ScreenGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Maps a pixel position to `0..=65535` per axis, clamping positions
    /// outside the screen to its edges.
    pub fn normalize(&self, x: i32, y: i32) -> (u16, u16) {
        (normalize_axis(x, self.width), normalize_axis(y, self.height))
    }
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

fn normalize_axis(value: i32, extent: u32) -> u16 {
    if extent == 0 {
        return 0;
    }
    let clamped = i64::from(value).clamp(0, i64::from(extent));
    (clamped * i64::from(NORMALIZED_MAX) / i64::from(extent)) as u16
}

/// How a playback run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
}

/// Counters for one playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaybackReport {
    pub outcome: PlaybackOutcome,
    pub dispatched: u64,
    /// Events of unknown kind or with out-of-range payloads.
    pub skipped: u64,
    /// Inputs still held at the end and released by cleanup.
    pub released: usize,
}

/// Replays events through an [`InputInjector`] with the original spacing.
pub struct PlaybackScheduler<S: Sleeper, C: Clock + Clone = MonotonicClock> {
    injector: Arc<dyn InputInjector>,
    held: Arc<HeldInputs>,
    sleeper: S,
    clock: C,
    geometry: ScreenGeometry,
}

impl<S: Sleeper, C: Clock + Clone> PlaybackScheduler<S, C> {
    pub fn new(
        injector: Arc<dyn InputInjector>,
        held: Arc<HeldInputs>,
        sleeper: S,
        clock: C,
        geometry: ScreenGeometry,
    ) -> Self {
        Self {
            injector,
            held,
            sleeper,
            clock,
            geometry,
        }
    }

    /// Plays `events` in order until the end or until `cancel` is set.
    ///
    /// Cancellation is checked before each event and again after its wait,
    /// so a cancelled run never dispatches another event.
    pub fn run(&mut self, events: &[Event], cancel: &CancelToken) -> PlaybackReport {
        let timebase = Timebase::with_clock(self.clock.clone());
        let mut previous = 0u64;
        let mut dispatched = 0u64;
        let mut skipped = 0u64;
        let mut outcome = PlaybackOutcome::Completed;

        for event in events {
            if cancel.is_cancelled() {
                outcome = PlaybackOutcome::Cancelled;
                break;
            }

            let now = timebase.elapsed_micros();
            let wait = event.offset_micros.saturating_sub(previous.max(now));
            self.sleeper.sleep_micros(wait);
            previous = event.offset_micros;

            if cancel.is_cancelled() {
                outcome = PlaybackOutcome::Cancelled;
                break;
            }

            if self.dispatch(event) {
                dispatched += 1;
            } else {
                skipped += 1;
                debug!(kind = ?event.kind, offset_us = event.offset_micros, "skipping event");
            }
        }

        let released = self.held.release_all();
        let lateness_us = timebase.elapsed_micros().saturating_sub(previous);
        info!(
            ?outcome,
            dispatched,
            skipped,
            released,
            lateness_us,
            "playback finished"
        );

        PlaybackReport {
            outcome,
            dispatched,
            skipped,
            released,
        }
    }

    /// Returns `false` if the event has no playable action.
    fn dispatch(&self, event: &Event) -> bool {
        let Some(action) = event.action() else {
            return false;
        };
        match action {
            InputAction::PointerDelta { dx, dy } => self.injector.inject_pointer_delta(dx, dy),
            InputAction::PointerAbsolute { x, y } => {
                let (nx, ny) = self.geometry.normalize(x, y);
                self.injector.inject_pointer_absolute(nx, ny);
            }
            InputAction::Scroll { delta, horizontal } => {
                self.injector.inject_scroll(delta, horizontal)
            }
            InputAction::Button { button, down: true } => self.held.press_button(button),
            InputAction::Button { button, down: false } => self.held.release_button(button),
            InputAction::Key { code, down: true } => self.held.press_key(code),
            InputAction::Key { code, down: false } => self.held.release_key(code),
        }
        true
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
