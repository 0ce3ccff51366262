//! Application layer use cases for the player.
//!
//! # Sub-modules
//!
//! - **`inject_input`** – The `InputInjector` trait: the only way playback
//!   touches the OS.  Implementations live in `infrastructure::injection`.
//!
//! - **`held_inputs`** – Tracks every key and button held by synthetic input
//!   so a session can release them all when it ends.
//!
//! - **`replay_trace`** – The scheduler: waits out each gap with drift
//!   compensation and dispatches events by kind.
//!
//! - **`steering`** – Scan policy that holds steering keys toward an
//!   on-screen target while a trace plays.
//!
//! - **`play_session`** – Session lifecycle: trace loading, countdown,
//!   stop-key watcher, blocking playback, and ordered teardown.

pub mod held_inputs;
pub mod inject_input;
pub mod play_session;
pub mod replay_trace;
pub mod steering;

pub use held_inputs::HeldInputs;
pub use inject_input::InputInjector;
pub use play_session::{PlayError, PlayOptions, PlaySession, PlaySummary};
pub use replay_trace::{
    PlaybackOutcome, PlaybackReport, PlaybackScheduler, ScreenGeometry, Sleeper,
};
pub use steering::{SteeringKeys, SteeringPolicy};
