use thiserror::Error;

/// Simulation error types covering command dispatch, configuration, and lifecycle faults.
///
/// Every variant is recoverable at the call site; nothing in the core
/// propagates one of these past its own boundary as a process failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// Unknown command name.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A command that targets an input line was given no name.
    #[error("missing argument: '{command}' requires an input name")]
    MissingArgument {
        /// Command that was missing its argument.
        command: String,
    },

    /// Named input line does not exist.
    #[error("unknown target: no input named '{0}'")]
    UnknownTarget(String),

    /// Timer handle does not refer to an attached timer.
    #[error("unknown timer: index {0}")]
    UnknownTimer(usize),

    /// An input line with this name is already registered.
    #[error("duplicate input: '{0}' is already registered")]
    DuplicateInput(String),

    /// Start requested while the clock is already ticking.
    #[error("clock is already running")]
    AlreadyRunning,

    /// Stop requested while the clock is not ticking.
    #[error("clock is not running")]
    NotRunning,

    /// Configuration or construction error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid lifecycle transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// Generic runtime fault (thread spawn failure, misuse from the tick thread).
    #[error("runtime fault: {0}")]
    Fault(String),
}

impl SimError {
    /// Returns true for redundant start/stop requests, which are reported as
    /// warnings rather than failures.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::AlreadyRunning | Self::NotRunning)
    }
}

/// Convenience type alias for simulation operations.
pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_classification() {
        assert!(SimError::AlreadyRunning.is_warning());
        assert!(SimError::NotRunning.is_warning());
        assert!(!SimError::UnknownTarget("x".into()).is_warning());
        assert!(!SimError::Config("zero period".into()).is_warning());
    }

    #[test]
    fn test_error_messages() {
        let err = SimError::MissingArgument {
            command: "press".into(),
        };
        assert_eq!(
            err.to_string(),
            "missing argument: 'press' requires an input name"
        );
        assert_eq!(
            SimError::UnknownTarget("bButton".into()).to_string(),
            "unknown target: no input named 'bButton'"
        );
    }
}
