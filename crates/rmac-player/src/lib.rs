//! rmac-player library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the `rmac` binary share the same module tree.
//!
//! # What does the player do? (for beginners)
//!
//! A trace file is a list of input events, each stamped with microseconds
//! since recording began.  The player:
//!
//! 1. Reads and validates the whole trace before touching any input.
//! 2. Counts down so the user can focus the target window.
//! 3. Re-emits every event through `SendInput`, sleeping between events so
//!    the original spacing is reproduced, and compensating when a sleep
//!    runs long.
//! 4. Stops at the stop key or Ctrl-C, and always releases every key and
//!    button it is still holding before returning.

pub mod application;
pub mod infrastructure;

pub use application::{
    HeldInputs, InputInjector, PlayError, PlayOptions, PlaySession, PlaySummary, PlaybackOutcome,
    PlaybackReport, PlaybackScheduler, ScreenGeometry, Sleeper, SteeringKeys, SteeringPolicy,
};
pub use infrastructure::injection::{platform_injector, primary_screen_geometry, InjectionError};
pub use infrastructure::timing::{PreciseSleeper, TimerResolutionGuard};
