//! Blocking timing primitives for the playback thread.
//!
//! # Why not `tokio::time::sleep`? (for beginners)
//!
//! Tokio timers have millisecond granularity and the default Windows
//! scheduler tick is about 15.6 ms, both far coarser than the
//! sub-millisecond spacing of recorded mouse motion.  The scheduler
//! therefore runs on a blocking thread with [`PreciseSleeper`]:
//!
//! 1. Park the thread with `std::thread::sleep` for all but the last
//!    `spin_threshold` microseconds.
//! 2. Busy-wait the remainder against the monotonic clock.
//!
//! [`TimerResolutionGuard`] asks Windows for a 1 ms scheduler tick for as
//! long as it is alive, which makes step 1 land close to its target.

use std::time::{Duration, Instant};

use rmac_core::CancelToken;

use crate::application::replay_trace::Sleeper;

/// Default busy-wait tail, in microseconds.
pub const DEFAULT_SPIN_THRESHOLD_US: u64 = 200;

/// Longest single park; long waits are sliced so cancellation is noticed.
const MAX_PARK: Duration = Duration::from_millis(50);

/// Sleep-then-spin [`Sleeper`].
#[derive(Debug, Clone)]
pub struct PreciseSleeper {
    spin_threshold: Duration,
    cancel: Option<CancelToken>,
}

impl PreciseSleeper {
    /// `spin_threshold_us = 0` disables spinning entirely.
    pub fn new(spin_threshold_us: u64) -> Self {
        Self {
            spin_threshold: Duration::from_micros(spin_threshold_us),
            cancel: None,
        }
    }

    /// Returns early from long waits once `cancel` is set.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Waits until `deadline`.
    pub fn sleep_until(&self, deadline: Instant) {
        loop {
            if self.cancelled() {
                return;
            }
            let now = Instant::now();
            let Some(remaining) = deadline.checked_duration_since(now) else {
                return;
            };
            if remaining <= self.spin_threshold {
                break;
            }
            std::thread::sleep((remaining - self.spin_threshold).min(MAX_PARK));
        }
        while Instant::now() < deadline {
            std::hint::spin_loop();
        }
    }
}

impl Default for PreciseSleeper {
    fn default() -> Self {
        Self::new(DEFAULT_SPIN_THRESHOLD_US)
    }
}

impl Sleeper for PreciseSleeper {
    fn sleep_micros(&mut self, micros: u64) {
        if micros == 0 {
            return;
        }
        self.sleep_until(Instant::now() + Duration::from_micros(micros));
    }
}

/// Raises the system timer resolution to 1 ms while alive.
///
/// A no-op on non-Windows hosts and when constructed disabled.
#[derive(Debug)]
pub struct TimerResolutionGuard {
    active: bool,
}

impl TimerResolutionGuard {
    pub const PERIOD_MS: u32 = 1;

    pub fn acquire(enabled: bool) -> Self {
        let active = enabled && platform::begin_period(Self::PERIOD_MS);
        if active {
            tracing::debug!(period_ms = Self::PERIOD_MS, "raised timer resolution");
        }
        Self { active }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for TimerResolutionGuard {
    fn drop(&mut self) {
        if self.active {
            platform::end_period(Self::PERIOD_MS);
        }
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use windows::Win32::Media::{timeBeginPeriod, timeEndPeriod, TIMERR_NOERROR};

    pub fn begin_period(ms: u32) -> bool {
        // SAFETY: timeBeginPeriod has no pointer arguments; every successful
        // call is paired with timeEndPeriod in the guard's Drop.
        unsafe { timeBeginPeriod(ms) == TIMERR_NOERROR }
    }

    pub fn end_period(ms: u32) {
        // SAFETY: matches a successful timeBeginPeriod with the same period.
        unsafe {
            timeEndPeriod(ms);
        }
    }
}

#[cfg(not(target_os = "windows"))]
mod platform {
    pub fn begin_period(_ms: u32) -> bool {
        false
    }

    pub fn end_period(_ms: u32) {}
}
