//! Configuration structures for the simulated control core.
//!
//! Supports TOML deserialization with defaults that reproduce the stock
//! device: a 100 µs clock, one continuous one-second timer, and a single
//! input line.

use crate::error::{SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// Name of the input line created when no inputs are configured.
pub const DEFAULT_INPUT_NAME: &str = "aButton";

/// Top-level simulation configuration.
///
/// The default is the stock device: one continuous auto-started 1 s timer
/// and the [`DEFAULT_INPUT_NAME`] input line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Clock (tick source) configuration.
    pub clock: ClockConfig,

    /// Control-loop pacing.
    pub control: ControlConfig,

    /// Timers attached to the clock at startup, in index order.
    pub timers: Vec<TimerConfig>,

    /// Input lines registered at startup.
    pub inputs: Vec<InputConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            control: ControlConfig::default(),
            timers: vec![TimerConfig::default()],
            inputs: vec![InputConfig::default()],
        }
    }
}

/// Tick source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Time between two edges of the logical output.
    #[serde(with = "humantime_serde")]
    pub period: Duration,

    /// Output level the clock starts from.
    pub initial_level: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_micros(100),
            initial_level: false,
        }
    }
}

impl ClockConfig {
    /// Clock period in whole nanoseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn period_ns(&self) -> u64 {
        u64::try_from(self.period.as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Control-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Delay between control-loop iterations when driven by a thread.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Delay between iterations while the clock is paused.
    #[serde(with = "humantime_serde")]
    pub paused_backoff: Duration,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            paused_backoff: Duration::from_millis(10),
        }
    }
}

/// A cycle-counting timer attached to the clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Time between rollovers, in whole milliseconds.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Re-arm after each rollover instead of latching.
    pub continuous: bool,

    /// Start counting as soon as the system starts.
    pub autostart: bool,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(1),
            continuous: true,
            autostart: true,
        }
    }
}

impl TimerConfig {
    /// Duration in whole milliseconds, saturating at `u64::MAX`.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A debounced digital input line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Unique line name.
    pub name: String,

    /// Disabled lines are skipped when polling.
    pub enabled: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_INPUT_NAME.to_string(),
            enabled: true,
        }
    }
}

impl SimConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Input lines to create, falling back to the default line when none are configured.
    #[must_use]
    pub fn effective_inputs(&self) -> Vec<InputConfig> {
        if self.inputs.is_empty() {
            vec![InputConfig::default()]
        } else {
            self.inputs.clone()
        }
    }

    /// Reject values that would otherwise surface as a division by zero or
    /// an ambiguous lookup at run time.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] describing the first invalid value.
    pub fn validate(&self) -> SimResult<()> {
        if self.clock.period_ns() == 0 {
            return Err(SimError::Config("clock period must be non-zero".into()));
        }
        if self.control.poll_interval.is_zero() {
            return Err(SimError::Config(
                "control poll interval must be non-zero".into(),
            ));
        }

        for (index, timer) in self.timers.iter().enumerate() {
            if timer.duration_ms() == 0 {
                return Err(SimError::Config(format!(
                    "timer {index}: duration must be at least 1ms (got {})",
                    humantime::format_duration(timer.duration)
                )));
            }
            if timer.duration.subsec_nanos() % 1_000_000 != 0 {
                return Err(SimError::Config(format!(
                    "timer {index}: duration must be a whole number of milliseconds (got {})",
                    humantime::format_duration(timer.duration)
                )));
            }
        }

        let mut seen = HashSet::new();
        for input in &self.inputs {
            if input.name.trim().is_empty() {
                return Err(SimError::Config("input name must not be empty".into()));
            }
            if input.name.chars().any(char::is_whitespace) {
                return Err(SimError::Config(format!(
                    "input name '{}' must not contain whitespace",
                    input.name
                )));
            }
            if !seen.insert(input.name.as_str()) {
                return Err(SimError::Config(format!(
                    "input '{}' is configured more than once",
                    input.name
                )));
            }
        }

        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
