//! Monotonic microsecond timebase anchored at session start.
//!
//! Event offsets are derived from raw clock ticks and the clock's tick
//! frequency.  The conversion multiplies before dividing in a `u128`, so no
//! precision is lost to integer truncation until the final microsecond
//! value is produced.
//!
//! # Never going backwards
//!
//! The trace format requires offsets to be non-decreasing.  Every value
//! handed out by [`Timebase::elapsed_micros`] is folded into an `AtomicU64`
//! high-water mark with `fetch_max`; if the platform clock ever regresses,
//! callers see the previous value again instead of an earlier one.  This
//! holds across threads: the capture adapter thread and the capture loop can
//! share one `Arc<Timebase>`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A raw tick source.
pub trait Clock: Send + Sync {
    /// Current tick count.
    fn ticks(&self) -> u64;
    /// Ticks per second.  Must be non-zero.
    fn frequency(&self) -> u64;
}

/// Production clock: the OS monotonic clock behind [`Instant`], in
/// nanosecond ticks.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

fn process_anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

impl Clock for MonotonicClock {
    fn ticks(&self) -> u64 {
        process_anchor().elapsed().as_nanos() as u64
    }

    fn frequency(&self) -> u64 {
        1_000_000_000
    }
}

/// Elapsed-time source for one session.
pub struct Timebase<C: Clock = MonotonicClock> {
    clock: C,
    start_ticks: u64,
    frequency: u64,
    /// Highest value returned so far.
    high_water: AtomicU64,
}

impl Timebase<MonotonicClock> {
    /// Anchors a new timebase at the current instant.
    pub fn start() -> Self {
        Self::with_clock(MonotonicClock)
    }
}

impl<C: Clock> Timebase<C> {
    /// Anchors a new timebase on a caller-supplied clock.
    pub fn with_clock(clock: C) -> Self {
        let start_ticks = clock.ticks();
        let frequency = clock.frequency().max(1);
        Self {
            clock,
            start_ticks,
            frequency,
            high_water: AtomicU64::new(0),
        }
    }

    /// Microseconds since [`Timebase::start`], never smaller than any value
    /// previously returned.
    pub fn elapsed_micros(&self) -> u64 {
        let ticks = self.clock.ticks().saturating_sub(self.start_ticks);
        let micros = (ticks as u128 * 1_000_000 / self.frequency as u128) as u64;
        let previous = self.high_water.fetch_max(micros, Ordering::AcqRel);
        previous.max(micros)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    /// A hand-driven clock.
    struct ScriptedClock {
        ticks: AtomicU64,
        frequency: u64,
    }

    impl ScriptedClock {
        fn new(frequency: u64) -> Self {
            Self {
                ticks: AtomicU64::new(0),
                frequency,
            }
        }

        fn set(&self, ticks: u64) {
            self.ticks.store(ticks, Ordering::SeqCst);
        }
    }

    impl Clock for &ScriptedClock {
        fn ticks(&self) -> u64 {
            self.ticks.load(Ordering::SeqCst)
        }

        fn frequency(&self) -> u64 {
            self.frequency
        }
    }

    #[test]
    fn test_elapsed_starts_at_zero() {
        let clock = ScriptedClock::new(1_000);
        let tb = Timebase::with_clock(&clock);
        assert_eq!(tb.elapsed_micros(), 0);
    }

    #[test]
    fn test_odd_frequency_converts_without_truncation_bias() {
        // Arrange – a 3 MHz-ish counter: 10_000_001 ticks ≈ 3_333_333.67 us
        let clock = ScriptedClock::new(3_000_000);
        let tb = Timebase::with_clock(&clock);

        // Act
        clock.set(10_000_001);

        // Assert – multiply-then-divide keeps the integer part exact
        assert_eq!(tb.elapsed_micros(), 3_333_333);
    }

    #[test]
    fn test_large_tick_counts_do_not_overflow() {
        // A nanosecond clock running for ~500 years.
        let clock = ScriptedClock::new(1_000_000_000);
        let tb = Timebase::with_clock(&clock);
        clock.set(u64::MAX);
        assert_eq!(tb.elapsed_micros(), u64::MAX / 1_000);
    }

    #[test]
    fn test_regressing_clock_is_clamped() {
        // Arrange
        let clock = ScriptedClock::new(1_000_000);
        clock.set(100);
        let tb = Timebase::with_clock(&clock);
        clock.set(5_100);
        assert_eq!(tb.elapsed_micros(), 5_000);

        // Act – the platform clock jumps backwards
        clock.set(2_100);

        // Assert
        assert_eq!(tb.elapsed_micros(), 5_000, "elapsed time must never regress");
        clock.set(6_100);
        assert_eq!(tb.elapsed_micros(), 6_000);
    }

    #[test]
    fn test_clock_below_start_reads_as_zero() {
        let clock = ScriptedClock::new(1_000_000);
        clock.set(1_000);
        let tb = Timebase::with_clock(&clock);
        clock.set(10);
        assert_eq!(tb.elapsed_micros(), 0);
    }

    #[test]
    fn test_monotonic_clock_is_non_decreasing_across_threads() {
        // Arrange
        let tb = Arc::new(Timebase::start());

        // Act
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tb = Arc::clone(&tb);
                thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..10_000 {
                        let now = tb.elapsed_micros();
                        assert!(now >= last);
                        last = now;
                    }
                })
            })
            .collect();

        // Assert
        for h in handles {
            h.join().expect("thread panicked");
        }
    }
}
