//! Concurrent access from several command issuers.
//!
//! # Acceptance Criteria
//!
//! - Dispatch from many threads never panics or deadlocks
//! - Every toggle of the global flag is applied exactly once
//! - Start/stop races leave the clock and lifecycle in agreement
//! - Timers can be attached while the clock is ticking

use super::common::{fast_config, spawn_control_loop, started, wait_until};
use embedsim_common::state::SystemState;
use embedsim_core::{CommandOutcome, TimerHandle};
use std::collections::HashSet;
use std::thread;

const THREADS: usize = 8;
const ITERATIONS: usize = 100;

#[test]
fn test_concurrent_dispatch_applies_every_toggle() {
    let system = started(&fast_config(5, true));
    let control = spawn_control_loop(&system);

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|| {
                for _ in 0..ITERATIONS {
                    assert!(system.dispatch("flag", &[]).is_ok());
                    assert!(system.dispatch("press", &["aButton"]).is_ok());
                    assert!(matches!(
                        system.dispatch("status", &[]),
                        CommandOutcome::Status(_)
                    ));
                    assert!(system.dispatch("release", &["aButton"]).is_ok());
                }
            });
        }
    });

    // An even number of toggles leaves the flag where it started.
    assert!(!system.global_flag());
    assert!(system.is_clock_running());

    system.dispatch("exit", &[]);
    control.join().expect("control loop exits");
    system.shutdown();
}

#[test]
fn test_start_stop_races_stay_consistent() {
    let system = started(&fast_config(1000, true));

    thread::scope(|s| {
        for worker in 0..THREADS {
            let system = &system;
            s.spawn(move || {
                let command = if worker % 2 == 0 { "stop" } else { "start" };
                for _ in 0..ITERATIONS / 4 {
                    let outcome = system.dispatch(command, &[]);
                    assert!(
                        !matches!(outcome, CommandOutcome::Rejected(_)),
                        "{command}: {outcome}"
                    );
                }
            });
        }
    });

    let expected = if system.is_clock_running() {
        SystemState::Running
    } else {
        SystemState::Stopped
    };
    assert_eq!(system.state(), expected);

    system.shutdown();
    assert!(!system.is_clock_running());
}

#[test]
fn test_attach_timers_while_ticking() {
    let system = started(&fast_config(1000, true));

    let handles: Vec<TimerHandle> = thread::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    let handle = system.add_timer(2, true).expect("timer attaches");
                    system.start_timer(handle).expect("timer starts");
                    handle
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().expect("worker finishes"))
            .collect()
    });

    let unique: HashSet<usize> = handles.iter().map(|h| h.0).collect();
    assert_eq!(unique.len(), THREADS);
    assert!(!unique.contains(&0));
    assert_eq!(system.timers().len(), THREADS + 1);

    assert!(wait_until(|| {
        system.timers()[1..].iter().all(|t| t.rollover_count >= 2)
    }));

    system.shutdown();
}
