//! Named control actions ("interrupts").
//!
//! An interrupt here is a zero-argument closure invoked synchronously on the
//! caller's thread. Triggering a name with no binding is a defined no-op.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Stop the clock and join its thread.
pub const STOP_CLOCK: &str = "stop_clock";
/// Start the clock.
pub const START_CLOCK: &str = "start_clock";
/// Suspend input sampling.
pub const PAUSE_CLOCK: &str = "pause_clock";
/// Resume input sampling.
pub const RESUME_CLOCK: &str = "resume_clock";
/// Ask the control loop to exit.
pub const USER_STOP: &str = "user_stop";
/// Toggle the diagnostic global flag.
pub const TOGGLE_FLAG: &str = "toggle_flag";

/// Interrupts every system registers at construction.
pub const BUILTIN_INTERRUPTS: [&str; 6] = [
    STOP_CLOCK,
    START_CLOCK,
    PAUSE_CLOCK,
    RESUME_CLOCK,
    USER_STOP,
    TOGGLE_FLAG,
];

/// A bound interrupt action.
pub type InterruptAction = Arc<dyn Fn() + Send + Sync>;

/// Name → action map.
///
/// # Example
///
/// ```
/// use embedsim_core::interrupt::InterruptRegistry;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let hits = Arc::new(AtomicU32::new(0));
/// let counter = Arc::clone(&hits);
///
/// let mut registry = InterruptRegistry::new();
/// registry.register("ping", move || {
///     counter.fetch_add(1, Ordering::Relaxed);
/// });
///
/// assert!(registry.trigger("ping"));
/// assert!(!registry.trigger("nonexistent"));
/// assert_eq!(hits.load(Ordering::Relaxed), 1);
/// ```
#[derive(Default)]
pub struct InterruptRegistry {
    handlers: HashMap<String, InterruptAction>,
}

impl fmt::Debug for InterruptRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterruptRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl InterruptRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `action` to `name`, replacing any previous binding.
    ///
    /// Returns true if a previous binding was replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, action: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(interrupt = %name, "Registering interrupt");
        self.handlers.insert(name, Arc::new(action)).is_some()
    }

    /// Invoke the action bound to `name`, if any.
    ///
    /// Returns true if an action ran.
    pub fn trigger(&self, name: &str) -> bool {
        match self.handlers.get(name) {
            Some(action) => {
                debug!(interrupt = name, "Interrupt triggered");
                action();
                true
            }
            None => {
                trace!(interrupt = name, "Ignoring unbound interrupt");
                false
            }
        }
    }

    /// Whether `name` has a binding.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Bound names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no interrupts are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
