//! Debounced digital input lines.
//!
//! Each line runs a four-state filter over externally supplied raw levels:
//!
//! ```text
//!            high              high x THRESHOLD             low
//!   IDLE ----------> DEBOUNCING ----------------> PRESSED -------> RELEASED
//!     ^                  |                                             |
//!     +------ low -------+                                             |
//!     +----------------------------- reset() --------------------------+
//! ```
//!
//! Setting a raw level has no immediate effect; the level is consumed by the
//! next poll.

use embedsim_common::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// Consecutive high samples required to accept a press.
pub const DEBOUNCE_THRESHOLD: u32 = 5;

/// Filter state of an input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputState {
    /// Waiting for a high level.
    #[default]
    Idle,
    /// Counting consecutive high samples.
    Debouncing,
    /// Press accepted; waiting for a low level.
    Pressed,
    /// Press ended; waiting for an explicit reset.
    Released,
}

impl fmt::Display for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Debouncing => write!(f, "DEBOUNCE"),
            Self::Pressed => write!(f, "PRESSED"),
            Self::Released => write!(f, "RELEASED"),
        }
    }
}

/// A single debounced input line.
///
/// # Example
///
/// ```
/// use embedsim_core::input::{DebouncedInput, InputState, DEBOUNCE_THRESHOLD};
///
/// let mut button = DebouncedInput::new("aButton");
/// button.set_raw_level(true);
/// for _ in 0..DEBOUNCE_THRESHOLD {
///     button.poll();
/// }
/// assert_eq!(button.state(), InputState::Pressed);
///
/// button.set_raw_level(false);
/// button.poll();
/// assert_eq!(button.state(), InputState::Released);
///
/// button.reset();
/// assert_eq!(button.state(), InputState::Idle);
/// ```
///
/// Lines are only built through [`DebouncedInput::new`]:
///
/// ```compile_fail
/// let line: embedsim_core::input::DebouncedInput = serde_json::from_str("{}").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebouncedInput {
    name: String,
    enabled: bool,
    raw_level: bool,
    state: InputState,
    /// Only meaningful while debouncing.
    debounce_count: u32,
    /// Polls spent in PRESSED.
    pressed_samples: u64,
}

impl DebouncedInput {
    /// Create an enabled line in IDLE with a low raw level.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            raw_level: false,
            state: InputState::Idle,
            debounce_count: 0,
            pressed_samples: 0,
        }
    }

    /// Record the externally observed level for the next poll.
    pub fn set_raw_level(&mut self, level: bool) {
        self.raw_level = level;
    }

    /// Advance the filter using the stored raw level.
    ///
    /// Returns the new state if the poll caused a transition. Disabled lines
    /// never transition.
    pub fn poll(&mut self) -> Option<InputState> {
        if !self.enabled {
            return None;
        }

        let level = self.raw_level;
        let next = match self.state {
            InputState::Idle if level => {
                self.debounce_count = 1;
                InputState::Debouncing
            }
            InputState::Idle => InputState::Idle,
            InputState::Debouncing if level => {
                self.debounce_count += 1;
                if self.debounce_count >= DEBOUNCE_THRESHOLD {
                    self.debounce_count = 0;
                    InputState::Pressed
                } else {
                    InputState::Debouncing
                }
            }
            InputState::Debouncing => {
                self.debounce_count = 0;
                InputState::Idle
            }
            InputState::Pressed => {
                self.pressed_samples += 1;
                if level {
                    InputState::Pressed
                } else {
                    InputState::Released
                }
            }
            InputState::Released => InputState::Released,
        };

        if next == self.state {
            None
        } else {
            self.state = next;
            Some(next)
        }
    }

    /// Force IDLE and clear the raw level and debounce counter.
    pub fn reset(&mut self) {
        self.state = InputState::Idle;
        self.raw_level = false;
        self.debounce_count = 0;
    }

    /// Line name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current filter state.
    #[must_use]
    pub fn state(&self) -> InputState {
        self.state
    }

    /// True iff the press has been accepted and not yet released.
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.state == InputState::Pressed
    }

    /// Last externally supplied level.
    #[must_use]
    pub fn raw_level(&self) -> bool {
        self.raw_level
    }

    /// Consecutive high samples seen while debouncing.
    #[must_use]
    pub fn debounce_count(&self) -> u32 {
        self.debounce_count
    }

    /// Polls spent in PRESSED since creation.
    #[must_use]
    pub fn pressed_samples(&self) -> u64 {
        self.pressed_samples
    }

    /// Whether the line takes part in polling.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable polling of this line.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Named collection of input lines, kept in registration order.
#[derive(Debug, Clone, Default)]
pub struct InputBank {
    lines: Vec<DebouncedInput>,
}

impl InputBank {
    /// Create an empty bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new enabled line in IDLE.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::DuplicateInput`] if the name is taken.
    pub fn add(&mut self, name: &str) -> SimResult<()> {
        if self.get(name).is_some() {
            return Err(SimError::DuplicateInput(name.to_string()));
        }
        self.lines.push(DebouncedInput::new(name));
        Ok(())
    }

    /// Look up a line by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DebouncedInput> {
        self.lines.iter().find(|line| line.name == name)
    }

    fn get_mut(&mut self, name: &str) -> SimResult<&mut DebouncedInput> {
        self.lines
            .iter_mut()
            .find(|line| line.name == name)
            .ok_or_else(|| SimError::UnknownTarget(name.to_string()))
    }

    /// Record the raw level for a named line.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn set_raw_level(&mut self, name: &str, level: bool) -> SimResult<()> {
        self.get_mut(name)?.set_raw_level(level);
        Ok(())
    }

    /// Enable or disable a named line.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> SimResult<()> {
        self.get_mut(name)?.set_enabled(enabled);
        Ok(())
    }

    /// Poll one named line.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn poll(&mut self, name: &str) -> SimResult<Option<InputState>> {
        let line = self.get_mut(name)?;
        let transition = line.poll();
        if let Some(state) = transition {
            report_transition(line, state);
        }
        Ok(transition)
    }

    /// Poll every enabled line in registration order.
    ///
    /// Returns the number of lines that changed state.
    pub fn poll_all(&mut self) -> usize {
        let mut changed = 0;
        for line in &mut self.lines {
            if let Some(state) = line.poll() {
                report_transition(line, state);
                changed += 1;
            }
        }
        changed
    }

    /// Force a named line back to IDLE.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn reset(&mut self, name: &str) -> SimResult<()> {
        self.get_mut(name)?.reset();
        Ok(())
    }

    /// Whether a named line is in PRESSED.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn is_pressed(&self, name: &str) -> SimResult<bool> {
        self.get(name)
            .map(DebouncedInput::is_pressed)
            .ok_or_else(|| SimError::UnknownTarget(name.to_string()))
    }

    /// Raw level of a named line.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::UnknownTarget`] if no such line exists.
    pub fn raw_level(&self, name: &str) -> SimResult<bool> {
        self.get(name)
            .map(DebouncedInput::raw_level)
            .ok_or_else(|| SimError::UnknownTarget(name.to_string()))
    }

    /// Iterate lines in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &DebouncedInput> {
        self.lines.iter()
    }

    /// Number of registered lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no lines are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

fn report_transition(line: &DebouncedInput, state: InputState) {
    match state {
        InputState::Pressed => info!(input = %line.name, "Input recognized as pressed"),
        InputState::Released => info!(
            input = %line.name,
            pressed_samples = line.pressed_samples,
            "Input released"
        ),
        InputState::Idle => debug!(input = %line.name, "Bounce rejected"),
        InputState::Debouncing => debug!(input = %line.name, "Debouncing"),
    }
}
