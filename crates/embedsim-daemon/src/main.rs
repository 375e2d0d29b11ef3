//! Simulator daemon entry point.
//!
//! Builds the simulated device from configuration, starts its clock, reads
//! commands from stdin on a dedicated thread, and drives the control loop on
//! the main thread until `exit`, SIGINT, or SIGTERM.

mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use embedsim_common::config::SimConfig;
use embedsim_core::system::System;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::signals::SignalHandler;

/// Simulator command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "embedsim",
    about = "Embedded device simulator - clock, timers, debounced inputs, and interrupts",
    version,
    long_about = None
)]
struct Args {
    /// Path to a simulation configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Clock edge period (overrides config file), e.g. "100us" or "10ms".
    #[arg(long, short = 'p', value_parser = humantime::parse_duration)]
    period: Option<Duration>,

    /// Run without the stdin command reader.
    #[arg(long)]
    headless: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting embedsim");

    let mut config = load_config(&args)?;
    if let Some(period) = args.period {
        config.clock.period = period;
    }

    info!(
        period = %humantime::format_duration(config.clock.period),
        timers = config.timers.len(),
        "Configuration loaded"
    );

    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    run(&config, &signal_handler, args.headless)
}

/// Initialize logging with the specified log level.
///
/// Logs go to stderr so command replies on stdout stay readable.
fn init_logging(level: &str) {
    let filter = format!(
        "embedsim={level},embedsim_daemon={level},embedsim_core={level},embedsim_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_writer(io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use the stock device.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `EMBEDSIM_CONFIG` environment variable
/// 3. `embedsim.toml` in the working directory
/// 4. Built-in stock configuration
fn load_config(args: &Args) -> Result<SimConfig> {
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return SimConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {}", config_path.display()));
    }

    if let Ok(env_path) = std::env::var("EMBEDSIM_CONFIG") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from EMBEDSIM_CONFIG");
            return SimConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from EMBEDSIM_CONFIG={env_path}")
            });
        }
        warn!(
            path = %env_path,
            "EMBEDSIM_CONFIG set but file does not exist, checking other locations"
        );
    }

    let local_path = PathBuf::from("embedsim.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from working directory");
        return SimConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {}", local_path.display()));
    }

    info!("No config file found, using stock device");
    Ok(SimConfig::default())
}

/// Build, start, and drive the system until a stop is requested.
fn run(config: &SimConfig, signal_handler: &SignalHandler, headless: bool) -> Result<()> {
    let system = Arc::new(System::new(config).context("Invalid simulation configuration")?);
    system.start().context("Failed to start system")?;

    if headless {
        info!("Headless mode, command reader disabled");
    } else {
        // Detached: the reader blocks on stdin and ends with the process.
        let _reader = spawn_command_reader(Arc::clone(&system))
            .context("Failed to spawn command reader")?;
        println!("System started. Type 'help' for available commands.");
    }

    system.run_until(|| {
        if signal_handler.take_status_request() {
            info!("Status requested:\n{}", system.status());
        }
        signal_handler.shutdown_requested()
    });

    info!("Shutting down...");
    system.shutdown();

    let status = system.status();
    info!(
        edges = status.edge_count,
        signals = signal_handler.state().signal_count(),
        final_state = %status.state,
        "Simulator shutdown complete"
    );

    Ok(())
}

/// Why the command reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderEnd {
    /// The `exit` command was dispatched.
    Exit,
    /// Input reached end of file.
    Eof,
}

/// Spawn the stdin command reader.
fn spawn_command_reader(system: Arc<System>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sim-cli".into())
        .spawn(move || {
            match read_commands(&system, io::stdin().lock(), io::stdout()) {
                Ok(ReaderEnd::Exit) => debug!("Command reader exiting"),
                Ok(ReaderEnd::Eof) => info!(
                    "Command input closed; no further commands will be read. \
                     Send SIGINT or SIGTERM to stop the simulator"
                ),
                Err(e) => warn!("Command reader failed: {e}"),
            }
        })
}

/// Dispatch each non-empty line from `input`, writing outcomes and prompts to
/// `output`, until `exit` or end of input.
fn read_commands<R, W>(system: &System, input: R, mut output: W) -> io::Result<ReaderEnd>
where
    R: BufRead,
    W: Write,
{
    prompt(&mut output)?;

    for line in input.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            let outcome = system.dispatch_line(&line);
            writeln!(output, "{outcome}")?;
            if outcome.is_exit() {
                return Ok(ReaderEnd::Exit);
            }
        }
        prompt(&mut output)?;
    }

    Ok(ReaderEnd::Eof)
}

fn prompt<W: Write>(output: &mut W) -> io::Result<()> {
    write!(output, "CLI> ")?;
    output.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parsing() {
        let args = Args::parse_from(["embedsim", "--headless"]);
        assert!(args.headless);
        assert!(args.config.is_none());
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_with_config_and_period() {
        let args = Args::parse_from(["embedsim", "-c", "sim.toml", "-p", "10ms"]);
        assert_eq!(args.config, Some(PathBuf::from("sim.toml")));
        assert_eq!(args.period, Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_rejects_bad_period() {
        assert!(Args::try_parse_from(["embedsim", "--period", "fast"]).is_err());
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.toml");
        std::fs::write(&path, "[clock]\nperiod = \"2ms\"\n").unwrap();

        let args = Args::parse_from(["embedsim", "-c", path.to_str().unwrap()]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.clock.period, Duration::from_millis(2));
        assert_eq!(config.timers.len(), 1);
    }

    #[test]
    fn test_reader_stops_on_exit() {
        let system = System::with_defaults().unwrap();
        let input = io::Cursor::new("help\n\nexit\nstatus\n");
        let mut output = Vec::new();

        let end = read_commands(&system, input, &mut output).unwrap();
        assert_eq!(end, ReaderEnd::Exit);
        assert!(system.should_stop());

        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("CLI> "));
        assert!(text.contains("Available commands:"));
        assert!(text.contains("Exiting..."));
        assert!(!text.contains("System state:"));
    }

    #[test]
    fn test_reader_reports_end_of_input() {
        let system = System::with_defaults().unwrap();
        let input = io::Cursor::new("flag\n");
        let mut output = Vec::new();

        let end = read_commands(&system, input, &mut output).unwrap();
        assert_eq!(end, ReaderEnd::Eof);
        assert!(system.global_flag());
        assert!(!system.should_stop());
        assert!(String::from_utf8(output).unwrap().contains("Global flag ON"));
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let args = Args::parse_from(["embedsim", "-c", "/nonexistent/embedsim.toml"]);
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
