//! Input capture infrastructure for the recorder.
//!
//! On Windows, this registers for raw keyboard and mouse input on a hidden
//! sink window that runs its own Win32 message loop thread.  Each
//! notification is stamped with the session [`Timebase`] and pushed into a
//! bounded channel consumed by the capture pipeline.
//!
//! # Never blocking the OS
//!
//! The window procedure must return quickly, so the adapter uses `try_send`:
//! when the channel is full the notification is dropped and counted instead
//! of stalling the message loop.
//!
//! # Testability
//!
//! The [`InputSource`] trait allows unit tests to inject synthetic events
//! without a window or raw-input registration.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use rmac_core::trace::PointerButton;
use rmac_core::Timebase;

pub mod mock;
pub mod raw;

#[cfg(target_os = "windows")]
pub mod windows;

/// One raw input notification, already timestamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInputEvent {
    /// A mouse report: relative motion, the cursor position at the time of
    /// the report, and any button or wheel transitions it carried.
    Mouse {
        dx: i32,
        dy: i32,
        cursor: (i32, i32),
        buttons: ButtonTransitions,
        wheel: Option<i16>,
        hwheel: Option<i16>,
        at_micros: u64,
    },
    /// A key transition, identified by Windows virtual-key code.
    /// `injected` is set for input synthesized by software (including our
    /// own playback) rather than typed on a device.
    Key {
        vk: u8,
        down: bool,
        injected: bool,
        at_micros: u64,
    },
}

impl RawInputEvent {
    pub fn at_micros(&self) -> u64 {
        match self {
            RawInputEvent::Mouse { at_micros, .. } | RawInputEvent::Key { at_micros, .. } => {
                *at_micros
            }
        }
    }
}

/// Button presses and releases carried by one mouse report.
///
/// Stored as two bitmasks indexed by button id so a report costs no
/// allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonTransitions {
    pressed: u8,
    released: u8,
}

impl ButtonTransitions {
    pub fn press(mut self, button: PointerButton) -> Self {
        self.pressed |= 1 << button.id();
        self
    }

    pub fn release(mut self, button: PointerButton) -> Self {
        self.released |= 1 << button.id();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.pressed == 0 && self.released == 0
    }

    /// Transitions in button-id order; a press precedes a release of the
    /// same button.
    pub fn iter(&self) -> impl Iterator<Item = (PointerButton, bool)> + '_ {
        PointerButton::ALL.into_iter().flat_map(move |b| {
            let bit = 1 << b.id();
            let down = (self.pressed & bit != 0).then_some((b, true));
            let up = (self.released & bit != 0).then_some((b, false));
            down.into_iter().chain(up)
        })
    }
}

/// Error type for input capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to register for raw input: {0}")]
    RawInputRegistrationFailed(String),
    #[error("failed to create the raw input sink window: {0}")]
    WindowCreationFailed(String),
    #[error("capture source has already been started")]
    AlreadyStarted,
    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

/// Trait abstracting input event production.
///
/// The production implementation uses Windows raw input; tests use
/// [`mock::MockInputSource`].
pub trait InputSource: Send {
    /// Starts the source.  Notifications are stamped with `timebase` and
    /// delivered through a channel bounded to `capacity` entries.
    fn start(
        &self,
        timebase: Arc<Timebase>,
        capacity: usize,
    ) -> Result<Receiver<RawInputEvent>, CaptureError>;

    /// Stops the source and releases all OS resources.  Closes the channel.
    fn stop(&self);

    /// Notifications discarded because the channel was full.
    fn dropped_notifications(&self) -> u64;
}

/// Returns the platform's raw input source.
///
/// # Errors
///
/// [`CaptureError::UnsupportedPlatform`] on hosts without an adapter.
#[cfg(target_os = "windows")]
pub fn platform_source() -> Result<Box<dyn InputSource>, CaptureError> {
    Ok(Box::new(windows::WindowsRawInputSource::new()))
}

/// Returns the platform's raw input source.
///
/// # Errors
///
/// [`CaptureError::UnsupportedPlatform`] on hosts without an adapter.
#[cfg(not(target_os = "windows"))]
pub fn platform_source() -> Result<Box<dyn InputSource>, CaptureError> {
    Err(CaptureError::UnsupportedPlatform(
        std::env::consts::OS.to_string(),
    ))
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn start(
        &self,
        timebase: Arc<Timebase>,
        capacity: usize,
    ) -> Result<Receiver<RawInputEvent>, CaptureError> {
        (**self).start(timebase, capacity)
    }

    fn stop(&self) {
        (**self).stop()
    }

    fn dropped_notifications(&self) -> u64 {
        (**self).dropped_notifications()
    }
}
