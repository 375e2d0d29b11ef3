//! Common utilities for the acceptance tests.
//!
//! Provides helpers for:
//! - Building fast-ticking device configurations
//! - Polling for a condition with a deadline
//! - Running the control loop on a background thread

use embedsim_common::config::{SimConfig, TimerConfig};
use embedsim_core::System;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Upper bound for any wait on the tick thread. Generous so loaded CI hosts
/// do not produce spurious failures.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A device with a 1 ms clock and a single timer of `timer_ms`.
pub fn fast_config(timer_ms: u64, continuous: bool) -> SimConfig {
    let mut config = SimConfig::default();
    config.clock.period = Duration::from_millis(1);
    config.control.poll_interval = Duration::from_micros(200);
    config.control.paused_backoff = Duration::from_millis(1);
    config.timers = vec![TimerConfig {
        duration: Duration::from_millis(timer_ms),
        continuous,
        autostart: true,
    }];
    config
}

/// Build and start a device from `config`.
pub fn started(config: &SimConfig) -> Arc<System> {
    let system = Arc::new(System::new(config).expect("valid config"));
    system.start().expect("system starts");
    system
}

/// Poll `condition` every millisecond until it holds or [`WAIT_TIMEOUT`]
/// expires. Returns whether it held.
pub fn wait_until<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Run the control loop on its own thread until the system is asked to stop.
pub fn spawn_control_loop(system: &Arc<System>) -> JoinHandle<()> {
    let system = Arc::clone(system);
    thread::Builder::new()
        .name("test-control".into())
        .spawn(move || system.run())
        .expect("spawn control loop")
}
