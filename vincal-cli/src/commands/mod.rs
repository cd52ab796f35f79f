//! Command implementations.

pub mod calibrate;
pub mod evaluate;
pub mod list_ports;
pub mod patch;
pub mod render;
pub mod upload;

use {
    anyhow::{Context, Result},
    indicatif::{ProgressBar, ProgressStyle},
    std::{path::Path, time::Duration},
    vincal::{NativePort, Port, Session},
};

use crate::{config::Settings, prompt::TerminalPrompter};

/// Opens a board session on a named port.
pub trait Opener {
    /// Port type of the opened session.
    type Port: Port;

    /// Open `port` and wait until the board is ready.
    fn open(&mut self, port: &str) -> Result<Session<Self::Port>>;
}

/// Builds a patched sketch and flashes it to the board.
pub trait Uploader {
    /// Compile and upload `sketch` through `port`, which must be closed.
    fn upload(&mut self, port: &str, fqbn: &str, sketch: &Path) -> Result<()>;
}

/// What a mode runs against: the board, the operator and the uploader.
pub struct Bench<O, Q, U> {
    /// Opens board sessions.
    pub opener: O,
    /// Answers collection, confirmation and file name prompts.
    pub prompter: Q,
    /// Flashes the patched sketch.
    pub uploader: U,
    /// Hide non-essential output.
    pub quiet: bool,
}

impl<'a> Bench<NativeOpener<'a>, TerminalPrompter, upload::ArduinoCli> {
    /// Real serial ports, terminal prompts and `arduino-cli`.
    pub fn native(settings: &'a Settings, quiet: bool) -> Self {
        Self {
            opener: NativeOpener { settings, quiet },
            prompter: TerminalPrompter::new(quiet),
            uploader: upload::ArduinoCli,
            quiet,
        }
    }
}

/// Opens serial ports with the configured line settings.
pub struct NativeOpener<'a> {
    settings: &'a Settings,
    quiet: bool,
}

impl Opener for NativeOpener<'_> {
    type Port = NativePort;

    fn open(&mut self, port: &str) -> Result<Session<NativePort>> {
        open_session(self.settings, port, self.quiet)
    }
}

/// Open the board's port, showing a spinner while it settles.
pub fn open_session(settings: &Settings, port: &str, quiet: bool) -> Result<Session<NativePort>> {
    let spinner = if quiet || !crate::use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };
    spinner.set_message(format!("Opening {port}, waiting for the board to settle"));

    let session = vincal::open_native(&settings.serial_config(port));
    spinner.finish_and_clear();
    session.with_context(|| format!("Failed to open serial port {port}"))
}
