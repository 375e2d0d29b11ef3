//! Simulated embedded control core.
//!
//! - **Clock** ([`clock`]): background tick thread flipping a logical level
//! - **Timers** ([`timer`]): cycle-counted rollover timers polled per edge
//! - **Inputs** ([`input`]): debounced digital input lines
//! - **Interrupts** ([`interrupt`]): named control actions
//! - **System** ([`system`]): orchestrator with thread-safe command dispatch
//!
//! # Example
//!
//! ```
//! use embedsim_core::clock::TickSource;
//! use embedsim_core::input::{DebouncedInput, DEBOUNCE_THRESHOLD};
//!
//! let clock = TickSource::new(10_000_000, false).unwrap();
//! let timer = clock.create_timer(50, true).unwrap();
//! clock.start_timer(timer).unwrap();
//! clock.step().unwrap();
//!
//! let mut button = DebouncedInput::new("aButton");
//! button.set_raw_level(true);
//! for _ in 0..DEBOUNCE_THRESHOLD {
//!     button.poll();
//! }
//! assert!(button.is_pressed());
//! ```

pub mod clock;
pub mod command;
pub mod input;
pub mod interrupt;
pub mod status;
pub mod system;
pub mod timer;

// Re-export main types for convenience
pub use clock::{TickSource, TimerHandle};
pub use command::{Command, CommandOutcome};
pub use input::{DebouncedInput, InputBank, InputState, DEBOUNCE_THRESHOLD};
pub use interrupt::InterruptRegistry;
pub use status::{InputStatus, SystemStatus, TimerStatus};
pub use system::{ControlStep, System};
pub use timer::Timer;
