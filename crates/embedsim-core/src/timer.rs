//! Cycle-counting rollover timers.
//!
//! A [`Timer`] converts a millisecond duration into a number of clock edges
//! and counts edges as its owning [`TickSource`](crate::clock::TickSource)
//! polls it. Reaching the target is a *rollover*.
//!
//! ```text
//! target = floor(duration_ms * 1_000_000 / period_ns)
//!
//! poll:   1   2   3   4   5   6   7   8   9  10
//! cycle:  1   2   3   4   0   1   2   3   4   0     (continuous, target = 5)
//! rolls:  0   0   0   0   1   1   1   1   1   2
//! ```
//!
//! A one-shot timer rolls over once and then latches at cycle 0.

use embedsim_common::error::{SimError, SimResult};

/// Nanoseconds per millisecond.
pub const NS_PER_MS: u64 = 1_000_000;

/// Cycle-counting countdown timer driven by clock edges.
///
/// # Example
///
/// ```
/// use embedsim_core::timer::Timer;
///
/// // 10 ms clock, 50 ms timer: five edges per rollover.
/// let mut timer = Timer::new(50, 10_000_000, true).unwrap();
/// assert_eq!(timer.target_cycles(), 5);
///
/// timer.start();
/// for _ in 0..5 {
///     timer.poll();
/// }
/// assert_eq!(timer.rollover_count(), 1);
/// assert_eq!(timer.current_cycle(), 0);
///
/// timer.poll();
/// timer.poll();
/// assert_eq!(timer.current_cycle(), 2);
/// ```
///
/// [`Timer::new`] is the only constructor; snapshots for telemetry go through
/// [`TimerStatus`](crate::status::TimerStatus).
///
/// ```compile_fail
/// let timer: embedsim_core::timer::Timer = serde_json::from_str("{}").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    /// Clock period the target was computed against.
    period_ns: u64,
    /// Edges per rollover.
    target_cycles: u64,
    /// Edges counted since the last rollover.
    current_cycle: u64,
    /// Completed rollovers.
    rollover_count: u64,
    /// Set on rollover; cleared on the next poll for continuous timers.
    has_rolled_over: bool,
    /// Re-arm after rollover instead of latching.
    continuous: bool,
    /// Only running timers count.
    running: bool,
}

impl Timer {
    /// Create a stopped timer for `duration_ms` counted against a clock of
    /// period `period_ns`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if either value is zero or the duration
    /// overflows when converted to nanoseconds.
    pub fn new(duration_ms: u64, period_ns: u64, continuous: bool) -> SimResult<Self> {
        if duration_ms == 0 {
            return Err(SimError::Config("timer duration must be non-zero".into()));
        }
        if period_ns == 0 {
            return Err(SimError::Config("clock period must be non-zero".into()));
        }
        let duration_ns = duration_ms.checked_mul(NS_PER_MS).ok_or_else(|| {
            SimError::Config(format!("timer duration {duration_ms}ms is too large"))
        })?;

        Ok(Self {
            period_ns,
            target_cycles: duration_ns / period_ns,
            current_cycle: 0,
            rollover_count: 0,
            has_rolled_over: false,
            continuous,
            running: false,
        })
    }

    /// Start counting. No effect if already running.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Advance by one clock edge.
    ///
    /// A target of zero (duration shorter than one period) rolls over on
    /// every poll.
    pub fn poll(&mut self) {
        if !self.running {
            return;
        }

        if self.has_rolled_over {
            if self.continuous {
                self.has_rolled_over = false;
            } else {
                // Latched one-shot
                return;
            }
        }

        self.current_cycle += 1;
        if self.current_cycle >= self.target_cycles {
            self.has_rolled_over = true;
            self.rollover_count += 1;
            self.current_cycle = 0;
        }
    }

    /// Edges counted since the last rollover.
    #[must_use]
    pub fn current_cycle(&self) -> u64 {
        self.current_cycle
    }

    /// Completed rollovers.
    #[must_use]
    pub fn rollover_count(&self) -> u64 {
        self.rollover_count
    }

    /// Whether the timer is counting.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Edges per rollover.
    #[must_use]
    pub fn target_cycles(&self) -> u64 {
        self.target_cycles
    }

    /// Clock period this timer was built against.
    #[must_use]
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Whether the timer re-arms after a rollover.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Whether the rollover latch is set.
    #[must_use]
    pub fn has_rolled_over(&self) -> bool {
        self.has_rolled_over
    }
}
