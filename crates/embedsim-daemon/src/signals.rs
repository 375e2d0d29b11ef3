//! Signal handling for the simulator daemon.
//!
//! SIGTERM and SIGINT request shutdown (mapped onto the `user_stop`
//! interrupt by the control loop); SIGUSR1 requests a status dump. Handlers
//! only set atomic flags, which a watcher thread copies into shared state.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - Graceful termination request.
    Terminate,
    /// SIGINT - Interrupt (Ctrl+C).
    Interrupt,
    /// SIGUSR1 - Status dump request.
    Status,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Status => write!(f, "SIGUSR1"),
        }
    }
}

/// Shared state for signal handling.
#[derive(Debug, Default)]
pub struct SignalState {
    shutdown_requested: AtomicBool,
    status_requested: AtomicBool,
    signal_count: AtomicU32,
}

impl SignalState {
    /// Create a new signal state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Check if a status dump has been requested (and clear the flag).
    #[inline]
    pub fn take_status_request(&self) -> bool {
        self.status_requested.swap(false, Ordering::Relaxed)
    }

    /// Request shutdown (can be called from any thread).
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Request a status dump (can be called from any thread).
    pub fn request_status(&self) {
        self.status_requested.store(true, Ordering::Relaxed);
    }

    fn record_signal(&self, kind: SignalKind) {
        debug!(signal = %kind, "Signal recorded");
        self.signal_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Handle for signal management.
#[derive(Debug, Clone)]
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    /// Create a new signal handler and register OS handlers.
    ///
    /// On non-Unix platforms only manual shutdown is available.
    pub fn new() -> std::io::Result<Self> {
        let handler = Self {
            state: Arc::new(SignalState::new()),
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    #[cfg(unix)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use std::os::raw::c_int;

        static TERM_FLAG: AtomicBool = AtomicBool::new(false);
        static INT_FLAG: AtomicBool = AtomicBool::new(false);
        static STATUS_FLAG: AtomicBool = AtomicBool::new(false);

        let state = Arc::clone(&self.state);
        let _watcher = std::thread::Builder::new()
            .name("sim-signals".into())
            .spawn(move || loop {
                if TERM_FLAG.swap(false, Ordering::Relaxed) {
                    info!("SIGTERM received");
                    state.record_signal(SignalKind::Terminate);
                    state.request_shutdown();
                }
                if INT_FLAG.swap(false, Ordering::Relaxed) {
                    info!("SIGINT received");
                    state.record_signal(SignalKind::Interrupt);
                    state.request_shutdown();
                }
                if STATUS_FLAG.swap(false, Ordering::Relaxed) {
                    state.record_signal(SignalKind::Status);
                    state.request_status();
                }
                if state.shutdown_requested() {
                    break;
                }
                std::thread::sleep(std::time::Duration::from_millis(10));
            })?;

        extern "C" fn sigterm_handler(_: c_int) {
            TERM_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sigint_handler(_: c_int) {
            INT_FLAG.store(true, Ordering::Relaxed);
        }

        extern "C" fn sigusr1_handler(_: c_int) {
            STATUS_FLAG.store(true, Ordering::Relaxed);
        }

        // SAFETY: the handlers only store to static atomics, which is
        // async-signal-safe.
        unsafe {
            libc::signal(libc::SIGTERM, sigterm_handler as libc::sighandler_t);
            libc::signal(libc::SIGINT, sigint_handler as libc::sighandler_t);
            libc::signal(libc::SIGUSR1, sigusr1_handler as libc::sighandler_t);
        }

        debug!("Unix signal handlers registered");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Check if a status dump has been requested (clears the flag).
    #[inline]
    pub fn take_status_request(&self) -> bool {
        self.state.take_status_request()
    }

    /// Get the signal state for inspection.
    pub fn state(&self) -> &SignalState {
        &self.state
    }
}
