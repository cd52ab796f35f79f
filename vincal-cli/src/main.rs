//! vincal CLI - Interactive VIN ADC calibration over a serial link.
//!
//! ## Features
//!
//! - Calibration mode: pair board readings with reference voltages, fit a
//!   cubic and patch `calibrateVIN` in the firmware sketch
//! - Evaluation mode: log residuals of the uploaded correction
//! - Optional compile and upload through `arduino-cli`
//! - Interactive serial port selection (Bluetooth links hidden)
//! - Layered TOML configuration and environment variable support

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use vincal::BoardId;

mod commands;
mod config;
mod prompt;
mod serial;

use commands::{Bench, calibrate, evaluate, list_ports, render};
use config::{Config, Overrides, Settings};
use prompt::Mode;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if emoji/animations should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Forget a handled Ctrl-C so later prompts and sessions run normally.
pub(crate) fn clear_interrupted() {
    INTERRUPTED.store(false, Ordering::Relaxed);
}

/// Failures with a dedicated exit status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Bad invocation or missing terminal (exit 2).
    #[error("{0}")]
    Usage(String),
    /// The operator cancelled (exit 130).
    #[error("{0}")]
    Cancelled(String),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Cancelled(_) => 130,
        }
    }
}

/// vincal - Calibrate the VIN sense ADC of a serial-connected board.
///
/// Without a command, asks for the board number, the serial port and the
/// mode (calibration or evaluation).
///
/// Environment variables:
///   VINCAL_PORT       - Serial port
///   VINCAL_BOARD      - Four-digit board number
///   VINCAL_FIRMWARE   - Firmware sketch to patch
#[derive(Parser)]
#[command(name = "vincal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (asked for if not specified).
    #[arg(short, long, global = true, env = "VINCAL_PORT")]
    port: Option<String>,

    /// Four-digit board number used to name the CSV logs.
    #[arg(short, long, global = true, env = "VINCAL_BOARD")]
    board: Option<BoardId>,

    /// Firmware sketch containing calibrateVIN.
    #[arg(short, long, global = true, env = "VINCAL_FIRMWARE", value_name = "PATH")]
    firmware: Option<PathBuf>,

    /// Directory for the CSV logs.
    #[arg(short, long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Compile and upload the sketch with arduino-cli after patching.
    #[arg(long, global = true)]
    upload: bool,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Collect calibration samples, fit and patch the firmware.
    Calibrate,

    /// Log how far the current correction is from reference voltages.
    Evaluate,

    /// List serial ports that can be selected.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Print the calibrateVIN function for given coefficients.
    Render {
        /// Coefficients a,b,c,d (highest degree first).
        #[arg(
            long,
            value_name = "A,B,C,D",
            allow_hyphen_values = true,
            value_parser = render::parse_coefficients
        )]
        coefficients: [f64; 4],
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self
                .port
                .clone(),
            board: self
                .board
                .clone(),
            firmware: self
                .firmware
                .clone(),
            output_dir: self
                .output_dir
                .clone(),
            upload: self.upload,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);
    if env::var_os("NO_COLOR").is_some() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed)) {
        debug!("Cannot install Ctrl-C handler: {e}");
    }
    vincal::set_interrupt_checker(was_interrupted);

    debug!(
        "vincal v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code(&err))
        },
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        return cli_err.exit_code();
    }
    if matches!(
        err.downcast_ref::<vincal::Error>(),
        Some(vincal::Error::Interrupted)
    ) || was_interrupted()
    {
        return 130;
    }
    1
}

fn run(cli: &Cli) -> Result<()> {
    // Commands that never touch the board need no configuration.
    match &cli.command {
        Some(Commands::ListPorts { json }) => {
            list_ports::run(*json);
            return Ok(());
        },
        Some(Commands::Render { coefficients }) => {
            render::run(*coefficients);
            return Ok(());
        },
        _ => {},
    }

    let config = Config::load(cli.config_path.as_deref());
    let settings = Settings::resolve(config, cli.overrides());

    match cli.command {
        Some(Commands::Calibrate) => cmd_calibrate(&settings, cli.quiet),
        Some(Commands::Evaluate) => cmd_evaluate(&settings, cli.quiet),
        _ => cmd_interactive(&settings, cli.quiet),
    }
}

fn board_or_ask(settings: &Settings) -> Result<BoardId> {
    match &settings.board {
        Some(board) => Ok(board.clone()),
        None => prompt::ask_board(),
    }
}

/// Board, port and mode prompts, then the chosen mode.
fn cmd_interactive(settings: &Settings, quiet: bool) -> Result<()> {
    prompt::ensure_interactive_terminal()?;
    let board = board_or_ask(settings)?;
    let port = serial::select_serial_port(settings)?;

    let mut bench = Bench::native(settings, quiet);
    match prompt::ask_mode()? {
        Mode::Calibration => calibrate::run(settings, &board, &port, &mut bench, true),
        Mode::Evaluation => evaluate::run(settings, &board, &port, &mut bench),
    }
}

fn cmd_calibrate(settings: &Settings, quiet: bool) -> Result<()> {
    prompt::ensure_interactive_terminal()?;
    let board = board_or_ask(settings)?;
    let port = serial::select_serial_port(settings)?;
    calibrate::run(settings, &board, &port, &mut Bench::native(settings, quiet), true)
}

fn cmd_evaluate(settings: &Settings, quiet: bool) -> Result<()> {
    prompt::ensure_interactive_terminal()?;
    let board = board_or_ask(settings)?;
    let port = serial::select_serial_port(settings)?;
    evaluate::run(settings, &board, &port, &mut Bench::native(settings, quiet))
}
