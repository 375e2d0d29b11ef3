//! Read-only telemetry snapshots.
//!
//! Snapshots are plain values captured under the relevant lock and safe to
//! hand to any status display. `Display` renders the textual report returned
//! by the `status` command.

use crate::input::{DebouncedInput, InputState};
use crate::timer::Timer;
use embedsim_common::state::SystemState;
use serde::Serialize;
use std::fmt;

/// Snapshot of one timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerStatus {
    /// Index on the owning clock.
    pub index: usize,
    /// Edges counted since the last rollover.
    pub current_cycle: u64,
    /// Edges per rollover.
    pub target_cycles: u64,
    /// Completed rollovers.
    pub rollover_count: u64,
    /// Whether the timer is counting.
    pub running: bool,
    /// Whether the timer re-arms after rollover.
    pub continuous: bool,
}

impl TimerStatus {
    pub(crate) fn capture(index: usize, timer: &Timer) -> Self {
        Self {
            index,
            current_cycle: timer.current_cycle(),
            target_cycles: timer.target_cycles(),
            rollover_count: timer.rollover_count(),
            running: timer.is_running(),
            continuous: timer.is_continuous(),
        }
    }
}

/// Snapshot of one input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputStatus {
    /// Line name.
    pub name: String,
    /// Filter state.
    pub state: InputState,
    /// Last externally supplied level.
    pub raw_level: bool,
    /// Whether the line is polled.
    pub enabled: bool,
    /// Polls spent in PRESSED.
    pub pressed_samples: u64,
}

impl InputStatus {
    pub(crate) fn capture(line: &DebouncedInput) -> Self {
        Self {
            name: line.name().to_string(),
            state: line.state(),
            raw_level: line.raw_level(),
            enabled: line.is_enabled(),
            pressed_samples: line.pressed_samples(),
        }
    }
}

/// Snapshot of the whole system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStatus {
    /// Lifecycle state.
    pub state: SystemState,
    /// Whether the tick thread is active.
    pub clock_running: bool,
    /// Whether input sampling is suspended.
    pub clock_paused: bool,
    /// Diagnostic flag toggled by the `flag` command.
    pub global_flag: bool,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Current clock output level.
    pub level: bool,
    /// Clock edges since construction.
    pub edge_count: u64,
    /// Timers in index order.
    pub timers: Vec<TimerStatus>,
    /// Input lines in registration order.
    pub inputs: Vec<InputStatus>,
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "System state: {}", self.state)?;
        writeln!(f, "Clock running: {}", yes_no(self.clock_running))?;
        writeln!(f, "Clock paused: {}", yes_no(self.clock_paused))?;
        writeln!(
            f,
            "Global flag: {}",
            if self.global_flag { "ON" } else { "OFF" }
        )?;
        writeln!(f, "Stop requested: {}", yes_no(self.stop_requested))?;
        write!(f, "Clock edges: {}", self.edge_count)?;

        for timer in &self.timers {
            write!(
                f,
                "\nTimer {}: cycle {}/{}, rollovers {}, {}",
                timer.index,
                timer.current_cycle,
                timer.target_cycles,
                timer.rollover_count,
                if timer.running { "running" } else { "stopped" }
            )?;
        }

        for input in &self.inputs {
            write!(
                f,
                "\nInput {}: Input={}, State={}",
                input.name,
                if input.raw_level { "HIGH" } else { "LOW" },
                input.state
            )?;
            if !input.enabled {
                write!(f, " (disabled)")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SystemStatus {
        SystemStatus {
            state: SystemState::Running,
            clock_running: true,
            clock_paused: false,
            global_flag: true,
            stop_requested: false,
            level: true,
            edge_count: 42,
            timers: vec![TimerStatus {
                index: 0,
                current_cycle: 2,
                target_cycles: 5,
                rollover_count: 8,
                running: true,
                continuous: true,
            }],
            inputs: vec![InputStatus {
                name: "aButton".into(),
                state: InputState::Debouncing,
                raw_level: true,
                enabled: true,
                pressed_samples: 0,
            }],
        }
    }

    #[test]
    fn test_text_report() {
        let text = sample().to_string();
        assert!(text.contains("Clock running: YES"));
        assert!(text.contains("Global flag: ON"));
        assert!(text.contains("Clock edges: 42"));
        assert!(text.contains("Timer 0: cycle 2/5, rollovers 8, running"));
        assert!(text.contains("Input aButton: Input=HIGH, State=DEBOUNCE"));
        assert!(!text.contains("disabled"));
    }

    #[test]
    fn test_serializes_for_status_consumers() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["state"], "RUNNING");
        assert_eq!(json["edge_count"], 42);
        assert_eq!(json["inputs"][0]["state"], "DEBOUNCING");
    }
}
