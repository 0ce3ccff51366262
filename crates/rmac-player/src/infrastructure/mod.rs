//! Infrastructure layer for the player.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `rmac_core`, but MUST NOT be imported by `application` except for the
//! timing primitives the session controller runs on.
//!
//! # Sub-modules
//!
//! - **`injection`** – `SendInput`-backed `InputInjector` on Windows and a
//!   recording mock for tests.
//!
//! - **`timing`** – `PreciseSleeper` (sleep, then spin the last slice) and
//!   `TimerResolutionGuard` (`timeBeginPeriod` for the session).

pub mod injection;
pub mod timing;
