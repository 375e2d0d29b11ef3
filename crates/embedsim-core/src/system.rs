//! System orchestrator: clock, inputs, interrupts, and command dispatch.
//!
//! Three kinds of actors touch a [`System`] concurrently:
//!
//! 1. The clock's tick thread (edge counter, level, timer counters).
//! 2. Command issuers calling [`System::dispatch`] from any thread.
//! 3. The control-loop driver calling [`System::control_step`], either from
//!    [`System::run_until`] on a dedicated thread or from an external
//!    periodic callback.
//!
//! Clock scalars are atomics and read without a lock. Inputs, the interrupt
//! registry, the lifecycle state machine, and timer attachment are
//! serialized behind one mutex held for a whole dispatch or control-loop
//! iteration.

use crate::clock::{TickSource, TimerHandle};
use crate::command::{Command, CommandOutcome};
use crate::input::InputBank;
use crate::interrupt::{
    InterruptRegistry, PAUSE_CLOCK, RESUME_CLOCK, START_CLOCK, STOP_CLOCK, TOGGLE_FLAG, USER_STOP,
};
use crate::status::{InputStatus, SystemStatus, TimerStatus};
use embedsim_common::config::{ControlConfig, SimConfig};
use embedsim_common::error::{SimError, SimResult};
use embedsim_common::state::{StateMachine, SystemState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, error, info, warn};

/// Outcome of one control-loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStep {
    /// Inputs were polled; `transitions` lines changed state.
    Sampled {
        /// Number of lines that changed state.
        transitions: usize,
    },
    /// Skipped: the clock is not running.
    ClockStopped,
    /// Skipped: sampling is paused.
    Paused,
    /// Skipped: the clock output is low.
    LowLevel,
}

/// Flags shared with interrupt actions.
#[derive(Debug, Default)]
struct Flags {
    should_stop: AtomicBool,
    clock_paused: AtomicBool,
    global_flag: AtomicBool,
}

/// State reachable from interrupt actions without the core lock.
#[derive(Debug)]
struct Shared {
    clock: TickSource,
    flags: Flags,
}

/// State serialized behind the core lock.
#[derive(Debug)]
struct Core {
    inputs: InputBank,
    interrupts: InterruptRegistry,
    lifecycle: StateMachine,
}

/// The simulated device.
///
/// # Example
///
/// ```
/// use embedsim_common::config::SimConfig;
/// use embedsim_core::system::System;
///
/// let system = System::new(&SimConfig::default()).unwrap();
/// system.start().unwrap();
///
/// let outcome = system.dispatch("press", &["aButton"]);
/// assert!(outcome.is_ok());
///
/// let status = system.status();
/// assert!(status.clock_running);
/// assert!(status.inputs[0].raw_level);
///
/// system.shutdown();
/// ```
#[derive(Debug)]
pub struct System {
    shared: Arc<Shared>,
    core: Mutex<Core>,
    control: ControlConfig,
    /// Timers started by [`System::start`].
    autostart: Vec<TimerHandle>,
}

impl System {
    /// Build a system from configuration: clock, timers, input lines, and
    /// the built-in interrupts. Nothing runs until [`System::start`].
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration is invalid.
    pub fn new(config: &SimConfig) -> SimResult<Self> {
        config.validate()?;

        let clock = TickSource::new(config.clock.period_ns(), config.clock.initial_level)?;

        let mut autostart = Vec::new();
        for timer in &config.timers {
            let handle = clock.create_timer(timer.duration_ms(), timer.continuous)?;
            if timer.autostart {
                autostart.push(handle);
            }
        }

        let mut inputs = InputBank::new();
        for input in config.effective_inputs() {
            inputs.add(&input.name)?;
            inputs.set_enabled(&input.name, input.enabled)?;
        }

        let shared = Arc::new(Shared {
            clock,
            flags: Flags::default(),
        });

        let system = Self {
            core: Mutex::new(Core {
                inputs,
                interrupts: builtin_interrupts(&shared),
                lifecycle: StateMachine::new(),
            }),
            shared,
            control: config.control.clone(),
            autostart,
        };

        info!(
            period_ns = system.shared.clock.period_ns(),
            timers = system.shared.clock.timer_count(),
            inputs = config.effective_inputs().len(),
            "System configured"
        );
        Ok(system)
    }

    /// Build the stock device.
    ///
    /// # Errors
    ///
    /// Never fails for the built-in configuration; the `Result` mirrors
    /// [`System::new`].
    pub fn with_defaults() -> SimResult<Self> {
        Self::new(&SimConfig::default())
    }

    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start configured timers and the clock.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::AlreadyRunning`] if the clock is ticking, or a
    /// fault if the tick thread cannot be spawned.
    pub fn start(&self) -> SimResult<()> {
        let mut core = self.core();

        for handle in &self.autostart {
            self.shared.clock.start_timer(*handle)?;
        }
        self.shared.clock.start()?;
        self.sync_lifecycle(&mut core);

        info!(state = %core.lifecycle.state(), "System started");
        Ok(())
    }

    /// Request the control loop to exit and stop the clock.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        let mut core = self.core();
        self.shared.flags.should_stop.store(true, Ordering::Release);

        if self.shared.clock.is_running() {
            if let Err(e) = self.shared.clock.stop() {
                warn!("Clock stop during shutdown failed: {e}");
            }
        }
        self.sync_lifecycle(&mut core);
    }

    /// Parse and execute a command. Never fails; errors are reported in the
    /// returned outcome.
    pub fn dispatch(&self, name: &str, args: &[&str]) -> CommandOutcome {
        match Command::parse(name, args) {
            Ok(command) => self.execute(command),
            Err(e) => {
                warn!(command = name, "Rejected command: {e}");
                CommandOutcome::from_error(e)
            }
        }
    }

    /// Parse and execute a whitespace-separated command line.
    pub fn dispatch_line(&self, line: &str) -> CommandOutcome {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        self.dispatch(name, &args)
    }

    /// Execute a parsed command under the core lock.
    pub fn execute(&self, command: Command) -> CommandOutcome {
        let mut core = self.core();
        let clock = &self.shared.clock;

        let outcome = match command {
            Command::Stop => {
                if clock.is_running() {
                    core.interrupts.trigger(STOP_CLOCK);
                    CommandOutcome::Done(format!(
                        "Clock stopped after {} edges",
                        clock.edge_count()
                    ))
                } else {
                    CommandOutcome::Warning(SimError::NotRunning)
                }
            }
            Command::Start => {
                if clock.is_running() {
                    CommandOutcome::Warning(SimError::AlreadyRunning)
                } else {
                    core.interrupts.trigger(START_CLOCK);
                    if clock.is_running() {
                        CommandOutcome::Done("Clock started".into())
                    } else {
                        CommandOutcome::Rejected(SimError::Fault("clock failed to start".into()))
                    }
                }
            }
            Command::Pause => {
                core.interrupts.trigger(PAUSE_CLOCK);
                CommandOutcome::Done("Clock paused".into())
            }
            Command::Resume => {
                core.interrupts.trigger(RESUME_CLOCK);
                CommandOutcome::Done("Clock resumed".into())
            }
            Command::Flag => {
                core.interrupts.trigger(TOGGLE_FLAG);
                let on = self.global_flag();
                CommandOutcome::Done(format!("Global flag {}", if on { "ON" } else { "OFF" }))
            }
            Command::Press(name) => match core.inputs.set_raw_level(&name, true) {
                Ok(()) => CommandOutcome::Done(format!("Simulated press for {name}")),
                Err(e) => CommandOutcome::from_error(e),
            },
            Command::Release(name) => match core.inputs.set_raw_level(&name, false) {
                Ok(()) => CommandOutcome::Done(format!("Simulated release for {name}")),
                Err(e) => CommandOutcome::from_error(e),
            },
            Command::Reset(name) => match core.inputs.reset(&name) {
                Ok(()) => CommandOutcome::Done(format!("Reset input {name}")),
                Err(e) => CommandOutcome::from_error(e),
            },
            Command::Status => {
                self.sync_lifecycle(&mut core);
                CommandOutcome::Status(Box::new(self.capture_status(&core)))
            }
            Command::Help => CommandOutcome::Help,
            Command::Exit => {
                info!("Exit requested");
                core.interrupts.trigger(USER_STOP);
                CommandOutcome::Exit
            }
        };

        self.sync_lifecycle(&mut core);

        match &outcome {
            CommandOutcome::Warning(e) => warn!("{e}"),
            CommandOutcome::Rejected(e) => warn!("Command rejected: {e}"),
            _ => {}
        }
        outcome
    }

    /// Set the raw level of a named input, as a GUI button would.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn set_raw_input_level(&self, name: &str, level: bool) -> SimResult<()> {
        self.core().inputs.set_raw_level(name, level)
    }

    /// Enable or disable a named input.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn set_input_enabled(&self, name: &str, enabled: bool) -> SimResult<()> {
        self.core().inputs.set_enabled(name, enabled)
    }

    /// Fire a named interrupt. Unknown names are ignored.
    ///
    /// Returns true if an action ran.
    pub fn trigger_interrupt(&self, name: &str) -> bool {
        let mut core = self.core();
        let fired = core.interrupts.trigger(name);
        self.sync_lifecycle(&mut core);
        fired
    }

    /// Bind an additional interrupt, replacing any existing binding.
    ///
    /// The action runs with the system lock held and must not call back
    /// into this `System`.
    pub fn register_interrupt<F>(&self, name: &str, action: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.core().interrupts.register(name, action)
    }

    /// Attach a stopped timer to the clock.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] for a zero or oversized duration.
    pub fn add_timer(&self, duration_ms: u64, continuous: bool) -> SimResult<TimerHandle> {
        let _core = self.core();
        self.shared.clock.create_timer(duration_ms, continuous)
    }

    /// Start an attached timer.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTimer`] for an unknown handle.
    pub fn start_timer(&self, handle: TimerHandle) -> SimResult<()> {
        let _core = self.core();
        self.shared.clock.start_timer(handle)
    }

    /// One control-loop iteration: poll every input if the clock is running,
    /// not paused, and at a high level.
    pub fn control_step(&self) -> ControlStep {
        let mut core = self.core();
        let clock = &self.shared.clock;

        if !clock.is_running() {
            return ControlStep::ClockStopped;
        }
        if self.is_paused() {
            return ControlStep::Paused;
        }
        if !clock.current_level() {
            return ControlStep::LowLevel;
        }

        let transitions = core.inputs.poll_all();
        if self.global_flag() {
            debug!(edges = clock.edge_count(), "Global flag is ON");
        }
        ControlStep::Sampled { transitions }
    }

    /// Drive the control loop on the calling thread until a stop is
    /// requested.
    pub fn run(&self) {
        self.run_until(|| false);
    }

    /// Drive the control loop until a stop is requested or `external_stop`
    /// returns true, in which case `user_stop` is triggered.
    ///
    /// The loop keeps running while the clock is stopped so that a later
    /// `start` command resumes sampling.
    pub fn run_until<F>(&self, external_stop: F)
    where
        F: Fn() -> bool,
    {
        info!(
            poll_interval_us = self.control.poll_interval.as_micros(),
            "Control loop started"
        );

        let mut samples = 0u64;
        while !self.should_stop() {
            if external_stop() {
                info!("External stop requested");
                self.trigger_interrupt(USER_STOP);
                break;
            }

            match self.control_step() {
                ControlStep::Sampled { .. } => {
                    samples += 1;
                    thread::sleep(self.control.poll_interval);
                }
                ControlStep::Paused => thread::sleep(self.control.paused_backoff),
                ControlStep::ClockStopped | ControlStep::LowLevel => {
                    thread::sleep(self.control.poll_interval);
                }
            }
        }

        info!(samples, "Control loop exited");
    }

    /// Full telemetry snapshot.
    #[must_use]
    pub fn status(&self) -> SystemStatus {
        let mut core = self.core();
        self.sync_lifecycle(&mut core);
        self.capture_status(&core)
    }

    fn capture_status(&self, core: &Core) -> SystemStatus {
        let clock = &self.shared.clock;
        SystemStatus {
            state: core.lifecycle.state(),
            clock_running: clock.is_running(),
            clock_paused: self.is_paused(),
            global_flag: self.global_flag(),
            stop_requested: self.should_stop(),
            level: clock.current_level(),
            edge_count: clock.edge_count(),
            timers: clock.timers(),
            inputs: core.inputs.iter().map(InputStatus::capture).collect(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SystemState {
        let mut core = self.core();
        self.sync_lifecycle(&mut core);
        core.lifecycle.state()
    }

    /// Snapshot of one input line.
    #[must_use]
    pub fn input(&self, name: &str) -> Option<InputStatus> {
        self.core().inputs.get(name).map(InputStatus::capture)
    }

    /// Whether a named input is PRESSED.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn is_pressed(&self, name: &str) -> SimResult<bool> {
        self.core().inputs.is_pressed(name)
    }

    /// Snapshots of every timer.
    #[must_use]
    pub fn timers(&self) -> Vec<TimerStatus> {
        self.shared.clock.timers()
    }

    /// Clock edges since construction.
    #[must_use]
    pub fn edge_count(&self) -> u64 {
        self.shared.clock.edge_count()
    }

    /// Current clock output level.
    #[must_use]
    pub fn clock_level(&self) -> bool {
        self.shared.clock.current_level()
    }

    /// Whether the tick thread is active.
    #[must_use]
    pub fn is_clock_running(&self) -> bool {
        self.shared.clock.is_running()
    }

    /// Whether a stop has been requested.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.shared.flags.should_stop.load(Ordering::Acquire)
    }

    /// Whether input sampling is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.flags.clock_paused.load(Ordering::Acquire)
    }

    /// Diagnostic global flag.
    #[must_use]
    pub fn global_flag(&self) -> bool {
        self.shared.flags.global_flag.load(Ordering::Acquire)
    }

    /// Move the lifecycle machine to the state implied by the clock and
    /// pause flag.
    fn sync_lifecycle(&self, core: &mut Core) {
        let current = core.lifecycle.state();
        let observed = if self.shared.clock.is_running() {
            if self.is_paused() {
                SystemState::Paused
            } else {
                SystemState::Running
            }
        } else if current == SystemState::Configured {
            SystemState::Configured
        } else {
            SystemState::Stopped
        };

        match core.lifecycle.follow(observed) {
            Ok(true) => info!(from = %current, to = %observed, "Lifecycle transition"),
            Ok(false) => {}
            Err(e) => error!("Lifecycle out of sync: {e}"),
        }
    }
}

impl Drop for System {
    fn drop(&mut self) {
        // Stop ticking before the inputs and registry go away.
        if self.shared.clock.is_running() {
            let _ = self.shared.clock.stop();
        }
    }
}

fn builtin_interrupts(shared: &Arc<Shared>) -> InterruptRegistry {
    let mut registry = InterruptRegistry::new();

    let s = Arc::clone(shared);
    registry.register(STOP_CLOCK, move || {
        info!("Interrupt: stopping clock");
        if let Err(e) = s.clock.stop() {
            warn!("Interrupt stop_clock: {e}");
        }
    });

    let s = Arc::clone(shared);
    registry.register(START_CLOCK, move || {
        info!("Interrupt: starting clock");
        if let Err(e) = s.clock.start() {
            warn!("Interrupt start_clock: {e}");
        }
    });

    let s = Arc::clone(shared);
    registry.register(PAUSE_CLOCK, move || {
        info!("Interrupt: pausing clock");
        s.flags.clock_paused.store(true, Ordering::Release);
    });

    let s = Arc::clone(shared);
    registry.register(RESUME_CLOCK, move || {
        info!("Interrupt: resuming clock");
        s.flags.clock_paused.store(false, Ordering::Release);
    });

    let s = Arc::clone(shared);
    registry.register(USER_STOP, move || {
        info!("Interrupt: user requested stop");
        s.flags.should_stop.store(true, Ordering::Release);
    });

    let s = Arc::clone(shared);
    registry.register(TOGGLE_FLAG, move || {
        let was = s.flags.global_flag.fetch_xor(true, Ordering::AcqRel);
        info!(global_flag = !was, "Interrupt: toggling global flag");
    });

    registry
}
