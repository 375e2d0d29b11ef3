//! Lifecycle state machine for the simulated system.
//!
//! State transitions:
//! CONFIGURED → RUNNING ⇄ PAUSED → STOPPED
//!
//! A stopped system may be restarted. Starting (or restarting) while the
//! pause flag is latched enters PAUSED directly.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle states of the simulated system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    /// Built but the clock has never been started.
    #[default]
    Configured,
    /// Clock ticking and inputs being sampled.
    Running,
    /// Clock ticking but input sampling suspended.
    Paused,
    /// Clock stopped after having run.
    Stopped,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configured => write!(f, "CONFIGURED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Paused => write!(f, "PAUSED"),
            Self::Stopped => write!(f, "STOPPED"),
        }
    }
}

impl SystemState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: SystemState) -> bool {
        use SystemState::{Configured, Paused, Running, Stopped};

        matches!(
            (self, target),
            (Configured, Running)
                // Started while the pause flag was already latched
                | (Configured, Paused)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Stopped)
                | (Paused, Stopped)
                // Restart
                | (Stopped, Running)
                | (Stopped, Paused)
        )
    }

    /// Returns true while the clock is ticking.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: SystemState,
    previous: Option<SystemState>,
    transition_count: u64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine starting in CONFIGURED.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: SystemState::Configured,
            previous: None,
            transition_count: 0,
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> SystemState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<SystemState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidStateTransition`] if the table forbids it.
    pub fn transition(&mut self, target: SystemState) -> SimResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(SimError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Move to `observed` if it differs from the current state.
    ///
    /// Returns `Ok(true)` when a transition happened.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidStateTransition`] if the observed state is
    /// not reachable from the current one; the state is left unchanged.
    pub fn follow(&mut self, observed: SystemState) -> SimResult<bool> {
        if observed == self.current {
            return Ok(false);
        }
        self.transition(observed).map(|()| true)
    }
}
