//! Periodic tick source driving the simulated hardware.
//!
//! A background thread waits one period, flips the logical output level,
//! counts the edge, and polls every attached [`Timer`] in index order.
//! One loop iteration is one edge, so a full square-wave period takes two
//! iterations and `edge_count` counts transitions rather than periods.
//!
//! Level, edge count, and the run flag are independent atomics readable from
//! any thread without a lock. The timer collection sits behind its own mutex,
//! taken by the tick thread once per edge.

use crate::status::TimerStatus;
use crate::timer::Timer;
use crossbeam_utils::CachePadded;
use embedsim_common::error::{SimError, SimResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Index of a timer attached to a [`TickSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(pub usize);

/// State shared between the tick thread and its readers.
#[derive(Debug)]
struct TickShared {
    /// Logical output level.
    level: CachePadded<AtomicBool>,
    /// Edges since construction.
    edge_count: CachePadded<AtomicU64>,
    /// Cleared to ask the tick thread to exit.
    running: AtomicBool,
    /// Timers polled on every edge.
    timers: Mutex<Vec<Timer>>,
}

impl TickShared {
    fn timers(&self) -> MutexGuard<'_, Vec<Timer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Flip the level, count the edge, poll timers. Returns the new level.
    fn edge(&self) -> bool {
        let level = !self.level.fetch_xor(true, Ordering::AcqRel);
        let edges = self.edge_count.fetch_add(1, Ordering::AcqRel) + 1;

        for timer in self.timers().iter_mut() {
            timer.poll();
        }

        trace!(edges, level, "Clock edge");
        level
    }
}

/// Periodic clock with attached cycle timers.
///
/// # Example
///
/// ```
/// use embedsim_core::clock::TickSource;
///
/// let clock = TickSource::new(10_000_000, false).unwrap();
/// let handle = clock.create_timer(50, true).unwrap();
/// clock.start_timer(handle).unwrap();
///
/// // Single-step five edges without the background thread.
/// for _ in 0..5 {
///     clock.step().unwrap();
/// }
/// assert_eq!(clock.edge_count(), 5);
/// assert_eq!(clock.timer(handle).unwrap().rollover_count, 1);
/// ```
#[derive(Debug)]
pub struct TickSource {
    period_ns: u64,
    initial_level: bool,
    shared: Arc<TickShared>,
    /// Tick thread handle; the lock serializes start and stop.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TickSource {
    /// Create a stopped clock with the given edge period.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if `period_ns` is zero.
    pub fn new(period_ns: u64, initial_level: bool) -> SimResult<Self> {
        if period_ns == 0 {
            return Err(SimError::Config("clock period must be non-zero".into()));
        }

        Ok(Self {
            period_ns,
            initial_level,
            shared: Arc::new(TickShared {
                level: CachePadded::new(AtomicBool::new(initial_level)),
                edge_count: CachePadded::new(AtomicU64::new(0)),
                running: AtomicBool::new(false),
                timers: Mutex::new(Vec::new()),
            }),
            worker: Mutex::new(None),
        })
    }

    fn worker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a timer; it will be polled on every subsequent edge.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the timer was built against a
    /// different clock period.
    pub fn add_timer(&self, timer: Timer) -> SimResult<TimerHandle> {
        if timer.period_ns() != self.period_ns {
            return Err(SimError::Config(format!(
                "timer period {}ns does not match clock period {}ns",
                timer.period_ns(),
                self.period_ns
            )));
        }

        let mut timers = self.shared.timers();
        timers.push(timer);
        Ok(TimerHandle(timers.len() - 1))
    }

    /// Build and attach a stopped timer for `duration_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the duration is zero or too large.
    pub fn create_timer(&self, duration_ms: u64, continuous: bool) -> SimResult<TimerHandle> {
        let timer = Timer::new(duration_ms, self.period_ns, continuous)?;
        let target_cycles = timer.target_cycles();
        let handle = self.add_timer(timer)?;
        info!(
            index = handle.0,
            duration_ms, target_cycles, continuous, "Configured timer"
        );
        Ok(handle)
    }

    /// Start counting on an attached timer.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTimer`] if the handle is not attached.
    pub fn start_timer(&self, handle: TimerHandle) -> SimResult<()> {
        let mut timers = self.shared.timers();
        let timer = timers
            .get_mut(handle.0)
            .ok_or(SimError::UnknownTimer(handle.0))?;
        timer.start();
        debug!(index = handle.0, "Timer started");
        Ok(())
    }

    /// Spawn the tick thread and return immediately.
    ///
    /// The output level is reset to its initial value on every start.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AlreadyRunning`] if the thread is active, or
    /// [`SimError::Fault`] if it cannot be spawned.
    pub fn start(&self) -> SimResult<()> {
        let mut worker = self.worker();

        if self.shared.running.load(Ordering::Acquire) {
            warn!("Clock is already running; stop it before restarting");
            return Err(SimError::AlreadyRunning);
        }

        self.shared
            .level
            .store(self.initial_level, Ordering::Release);

        // Set running BEFORE spawn so is_running() returns true immediately
        self.shared.running.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let period = Duration::from_nanos(self.period_ns);
        let handle = match thread::Builder::new()
            .name("sim-tick".into())
            .spawn(move || tick_loop(&shared, period))
        {
            Ok(h) => h,
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                return Err(SimError::Fault(format!("failed to spawn tick thread: {e}")));
            }
        };

        info!(period_ns = self.period_ns, "Clock started");
        *worker = Some(handle);
        Ok(())
    }

    /// Stop the tick thread and wait for it to exit.
    ///
    /// No edge is produced after this returns. Must not be called from the
    /// tick thread itself.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NotRunning`] if the clock was already stopped, or
    /// [`SimError::Fault`] if called from the tick thread.
    pub fn stop(&self) -> SimResult<()> {
        let mut worker = self.worker();

        if let Some(handle) = worker.as_ref() {
            if handle.thread().id() == thread::current().id() {
                return Err(SimError::Fault(
                    "clock cannot be stopped from its own tick thread".into(),
                ));
            }
        }

        let was_running = self.shared.running.swap(false, Ordering::AcqRel);

        if let Some(handle) = worker.take() {
            handle.thread().unpark();
            if let Err(e) = handle.join() {
                warn!("Tick thread panicked: {:?}", e);
            }
        }

        if was_running {
            info!(edges = self.edge_count(), "Clock stopped");
            Ok(())
        } else {
            Err(SimError::NotRunning)
        }
    }

    /// Produce one edge synchronously on the calling thread.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AlreadyRunning`] while the tick thread is active.
    pub fn step(&self) -> SimResult<bool> {
        let _worker = self.worker();
        if self.shared.running.load(Ordering::Acquire) {
            return Err(SimError::AlreadyRunning);
        }
        Ok(self.shared.edge())
    }

    /// Current logical output level.
    #[must_use]
    pub fn current_level(&self) -> bool {
        self.shared.level.load(Ordering::Acquire)
    }

    /// Edges produced since construction.
    #[must_use]
    pub fn edge_count(&self) -> u64 {
        self.shared.edge_count.load(Ordering::Acquire)
    }

    /// Whether the tick thread is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Configured edge period in nanoseconds.
    #[must_use]
    pub fn period_ns(&self) -> u64 {
        self.period_ns
    }

    /// Snapshot of one attached timer.
    #[must_use]
    pub fn timer(&self, handle: TimerHandle) -> Option<TimerStatus> {
        self.shared
            .timers()
            .get(handle.0)
            .map(|timer| TimerStatus::capture(handle.0, timer))
    }

    /// Snapshot of every attached timer in index order.
    #[must_use]
    pub fn timers(&self) -> Vec<TimerStatus> {
        self.shared
            .timers()
            .iter()
            .enumerate()
            .map(|(index, timer)| TimerStatus::capture(index, timer))
            .collect()
    }

    /// Number of attached timers.
    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.shared.timers().len()
    }
}

impl Drop for TickSource {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

fn tick_loop(shared: &TickShared, period: Duration) {
    debug!(period_ns = period.as_nanos(), "Tick thread started");

    while shared.running.load(Ordering::Acquire) {
        if !sleep_while_running(shared, period) {
            break;
        }
        shared.edge();
    }

    debug!("Tick thread exiting");
}

/// Park for `period`, waking early if the run flag is cleared.
///
/// Returns false if the clock was stopped during the wait.
fn sleep_while_running(shared: &TickShared, period: Duration) -> bool {
    let deadline = Instant::now() + period;
    loop {
        if !shared.running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::park_timeout(deadline - now);
    }
}
