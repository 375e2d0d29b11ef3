//! Command vocabulary accepted by [`System::dispatch`](crate::system::System::dispatch).

use crate::status::SystemStatus;
use embedsim_common::error::{SimError, SimResult};
use std::fmt;

/// Text returned by the `help` command.
pub const HELP_TEXT: &str = "\
Available commands:
  stop           - Stop the clock
  start          - Start the clock
  pause          - Pause input sampling (clock keeps ticking)
  resume         - Resume input sampling
  flag           - Toggle the global interrupt flag
  press <name>   - Drive an input line high
  release <name> - Drive an input line low
  reset <name>   - Reset an input line to IDLE
  status         - Show system status
  help           - Show this help
  exit           - Stop the system and exit";

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Stop the clock.
    Stop,
    /// Start the clock.
    Start,
    /// Suspend input sampling.
    Pause,
    /// Resume input sampling.
    Resume,
    /// Toggle the global flag.
    Flag,
    /// Set an input's raw level high.
    Press(String),
    /// Set an input's raw level low.
    Release(String),
    /// Force an input back to IDLE.
    Reset(String),
    /// Report system status.
    Status,
    /// List commands.
    Help,
    /// Request shutdown.
    Exit,
}

impl Command {
    /// Parse a command name and its arguments. Extra arguments are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidCommand`] for unknown names and
    /// [`SimError::MissingArgument`] when an input command has no target.
    pub fn parse(name: &str, args: &[&str]) -> SimResult<Self> {
        let target = || {
            args.first()
                .filter(|arg| !arg.is_empty())
                .map(|arg| (*arg).to_string())
                .ok_or_else(|| SimError::MissingArgument {
                    command: name.to_string(),
                })
        };

        match name {
            "stop" => Ok(Self::Stop),
            "start" => Ok(Self::Start),
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            "flag" => Ok(Self::Flag),
            "press" => target().map(Self::Press),
            "release" => target().map(Self::Release),
            "reset" => target().map(Self::Reset),
            "status" => Ok(Self::Status),
            "help" => Ok(Self::Help),
            "exit" => Ok(Self::Exit),
            other => Err(SimError::InvalidCommand(other.to_string())),
        }
    }

    /// Parse a whitespace-separated command line.
    ///
    /// # Errors
    ///
    /// Same as [`Command::parse`]; an empty line is an invalid command.
    pub fn parse_line(line: &str) -> SimResult<Self> {
        let mut words = line.split_whitespace();
        let name = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        Self::parse(name, &args)
    }
}

/// Result of dispatching a command. Dispatch never fails; errors are
/// carried as values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Command applied.
    Done(String),
    /// Status report.
    Status(Box<SystemStatus>),
    /// Help text.
    Help,
    /// Shutdown requested.
    Exit,
    /// Redundant request; nothing changed.
    Warning(SimError),
    /// Command not applied.
    Rejected(SimError),
}

impl CommandOutcome {
    /// Whether the command was applied (or was a pure read).
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Warning(_) | Self::Rejected(_))
    }

    /// Whether the command asked the system to exit.
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit)
    }

    /// The error carried by a warning or rejection.
    #[must_use]
    pub fn error(&self) -> Option<&SimError> {
        match self {
            Self::Warning(e) | Self::Rejected(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn from_error(error: SimError) -> Self {
        if error.is_warning() {
            Self::Warning(error)
        } else {
            Self::Rejected(error)
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done(message) => write!(f, "{message}"),
            Self::Status(status) => write!(f, "{status}"),
            Self::Help => write!(f, "{HELP_TEXT}"),
            Self::Exit => write!(f, "Exiting..."),
            Self::Warning(e) => write!(f, "Warning: {e}"),
            Self::Rejected(e @ SimError::InvalidCommand(_)) => {
                write!(f, "Error: {e}. Type 'help' for available commands.")
            }
            Self::Rejected(e) => write!(f, "Error: {e}"),
        }
    }
}
