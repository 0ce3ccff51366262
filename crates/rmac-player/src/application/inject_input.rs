//! The output seam of playback: synthetic OS input.
//!
//! # Fire-and-forget
//!
//! Every method returns `()`.  The OS gives no useful feedback about whether
//! an injected event reached its target, and playback would not stop for it
//! anyway, so implementations log failures themselves instead of returning
//! them.
//!
//! # Coordinate space for absolute moves
//!
//! `inject_pointer_absolute` takes coordinates already normalized to
//! `0..=65535` on each axis, the range Windows `SendInput` expects with
//! `MOUSEEVENTF_ABSOLUTE`.  The scheduler does the pixel → normalized
//! conversion with [`ScreenGeometry`](super::replay_trace::ScreenGeometry).

use rmac_core::trace::PointerButton;

/// Emits synthetic input events to the OS.
///
/// Infrastructure implementations call `SendInput`; tests use
/// `RecordingInjector` or the `mockall`-generated `MockInputInjector`.
#[cfg_attr(test, mockall::automock)]
pub trait InputInjector: Send + Sync {
    /// Relative pointer motion in mickeys.
    fn inject_pointer_delta(&self, dx: i32, dy: i32);

    /// Absolute pointer position, normalized to `0..=65535` per axis.
    fn inject_pointer_absolute(&self, x: u16, y: u16);

    /// Wheel rotation; 120 is one detent.
    fn inject_scroll(&self, delta: i32, horizontal: bool);

    fn inject_button(&self, button: PointerButton, down: bool);

    /// Key transition by Windows virtual-key code.
    fn inject_key(&self, code: u8, down: bool);
}
