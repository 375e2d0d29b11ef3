//! Command dispatch against a live device with the control loop running.
//!
//! # Acceptance Criteria
//!
//! - A held press debounces to PRESSED; releasing reports RELEASED
//! - Pausing suspends sampling without stopping the clock
//! - `exit` ends the control loop
//! - A device described by a TOML file exposes its configured lines

use super::common::{fast_config, spawn_control_loop, started, wait_until};
use embedsim_common::config::SimConfig;
use embedsim_common::error::SimError;
use embedsim_common::state::SystemState;
use embedsim_core::{CommandOutcome, InputState, System};
use std::thread;
use std::time::Duration;

fn input_state(system: &System, name: &str) -> InputState {
    system.input(name).expect("input exists").state
}

#[test]
fn test_press_and_release_through_control_loop() {
    let system = started(&fast_config(1000, true));
    let control = spawn_control_loop(&system);

    assert!(system.dispatch("press", &["aButton"]).is_ok());
    assert!(
        wait_until(|| input_state(&system, "aButton") == InputState::Pressed),
        "input stuck in {}",
        input_state(&system, "aButton")
    );

    assert!(system.dispatch("release", &["aButton"]).is_ok());
    assert!(wait_until(|| {
        input_state(&system, "aButton") == InputState::Released
    }));

    assert!(system.dispatch("exit", &[]).is_exit());
    control.join().expect("control loop exits");

    system.shutdown();
    assert_eq!(system.state(), SystemState::Stopped);
}

#[test]
fn test_pause_suspends_sampling() {
    let system = started(&fast_config(1000, true));
    let control = spawn_control_loop(&system);

    assert!(system.dispatch("pause", &[]).is_ok());
    assert_eq!(system.state(), SystemState::Paused);
    assert!(system.dispatch("press", &["aButton"]).is_ok());

    let edges = system.edge_count();
    thread::sleep(Duration::from_millis(50));
    assert!(system.edge_count() > edges, "clock stopped while paused");
    assert_eq!(input_state(&system, "aButton"), InputState::Idle);

    assert!(system.dispatch("resume", &[]).is_ok());
    assert!(wait_until(|| system.is_pressed("aButton").unwrap_or(false)));

    system.dispatch("exit", &[]);
    control.join().expect("control loop exits");
    system.shutdown();
}

#[test]
fn test_stopped_clock_keeps_control_loop_alive() {
    let system = started(&fast_config(1000, true));
    let control = spawn_control_loop(&system);

    assert!(system.dispatch("stop", &[]).is_ok());
    assert!(system.dispatch("press", &["aButton"]).is_ok());
    thread::sleep(Duration::from_millis(20));
    assert_eq!(input_state(&system, "aButton"), InputState::Idle);
    assert!(!control.is_finished());

    assert!(system.dispatch("start", &[]).is_ok());
    assert!(wait_until(|| system.is_pressed("aButton").unwrap_or(false)));

    system.dispatch("exit", &[]);
    control.join().expect("control loop exits");
    system.shutdown();
}

#[test]
fn test_redundant_and_invalid_commands() {
    let system = started(&fast_config(1000, true));

    assert_eq!(
        system.dispatch("start", &[]),
        CommandOutcome::Warning(SimError::AlreadyRunning)
    );
    assert_eq!(
        system.dispatch_line("press missing").to_string(),
        "Error: unknown target: no input named 'missing'"
    );
    assert_eq!(
        system.dispatch_line("launch").to_string(),
        "Error: invalid command: launch. Type 'help' for available commands."
    );
    assert!(system.is_clock_running());

    system.shutdown();
}

#[test]
fn test_device_from_config_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("embedsim.toml");
    std::fs::write(
        &path,
        r#"
[clock]
period = "1ms"

[[timers]]
duration = "10ms"

[[timers]]
duration = "20ms"
continuous = false
autostart = false

[[inputs]]
name = "start"

[[inputs]]
name = "estop"
enabled = false
"#,
    )
    .expect("write config");

    let config = SimConfig::from_file(&path).expect("config parses");
    let system = started(&config);

    let status = system.status();
    let names: Vec<&str> = status.inputs.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, ["start", "estop"]);
    assert!(!status.inputs[1].enabled);
    assert_eq!(status.timers.len(), 2);
    assert!(status.timers[0].running);
    assert!(!status.timers[1].running);
    assert_eq!(status.timers[1].target_cycles, 20);

    let text = status.to_string();
    assert!(text.contains("Clock running: YES"), "{text}");
    assert!(text.contains("Input start: Input=LOW, State=IDLE"), "{text}");

    system.shutdown();
}
