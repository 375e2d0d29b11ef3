//! Clock and timer behavior with the real tick thread.
//!
//! # Acceptance Criteria
//!
//! - Edges accumulate while the clock runs
//! - No edge is produced after `stop` returns
//! - Continuous timers keep rolling over; one-shot timers latch
//! - A stopped clock can be restarted

use super::common::{fast_config, started, wait_until};
use embedsim_common::state::SystemState;
use embedsim_core::CommandOutcome;
use std::thread;
use std::time::Duration;

#[test]
fn test_edges_accumulate_while_running() {
    let system = started(&fast_config(1000, true));

    assert!(
        wait_until(|| system.edge_count() >= 10),
        "clock produced only {} edges",
        system.edge_count()
    );
    assert_eq!(system.state(), SystemState::Running);

    system.shutdown();
}

#[test]
fn test_no_edges_after_stop() {
    let system = started(&fast_config(1000, true));
    assert!(wait_until(|| system.edge_count() >= 4));

    let outcome = system.dispatch("stop", &[]);
    assert!(outcome.is_ok(), "{outcome}");
    assert!(!system.is_clock_running());

    let frozen = system.edge_count();
    thread::sleep(Duration::from_millis(30));
    assert_eq!(system.edge_count(), frozen);
    assert_eq!(system.state(), SystemState::Stopped);
}

#[test]
fn test_continuous_timer_rolls_over_repeatedly() {
    let system = started(&fast_config(5, true));

    assert!(
        wait_until(|| system.timers()[0].rollover_count >= 3),
        "timer status: {:?}",
        system.timers()[0]
    );

    let timer = &system.timers()[0];
    assert_eq!(timer.target_cycles, 5);
    assert!(timer.current_cycle < timer.target_cycles);
    system.shutdown();
}

#[test]
fn test_one_shot_timer_latches() {
    let system = started(&fast_config(3, false));

    assert!(wait_until(|| system.timers()[0].rollover_count == 1));
    let edges = system.edge_count();
    assert!(wait_until(|| system.edge_count() >= edges + 10));

    let timer = &system.timers()[0];
    assert_eq!(timer.rollover_count, 1);
    assert_eq!(timer.current_cycle, 0);
    system.shutdown();
}

#[test]
fn test_restart_after_stop() {
    let system = started(&fast_config(1000, true));
    assert!(system.dispatch("stop", &[]).is_ok());
    let edges = system.edge_count();

    assert_eq!(
        system.dispatch("start", &[]),
        CommandOutcome::Done("Clock started".into())
    );
    assert_eq!(system.state(), SystemState::Running);
    assert!(wait_until(|| system.edge_count() > edges));

    system.shutdown();
    assert_eq!(system.state(), SystemState::Stopped);
}

#[test]
fn test_slow_clock_stops_promptly() {
    let mut config = fast_config(60_000, true);
    config.clock.period = Duration::from_secs(30);
    let system = started(&config);

    let begin = std::time::Instant::now();
    system.shutdown();
    assert!(begin.elapsed() < Duration::from_secs(5));
    assert_eq!(system.edge_count(), 0);
}
