//! Compile and upload the patched sketch with `arduino-cli`.

use super::Uploader;
use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

/// The Arduino command-line tool.
pub const ARDUINO_CLI: &str = "arduino-cli";

/// Arguments for `arduino-cli compile`.
pub fn compile_args(fqbn: &str, sketch: &Path) -> Vec<OsString> {
    vec![
        "compile".into(),
        "--fqbn".into(),
        fqbn.into(),
        sketch
            .as_os_str()
            .to_owned(),
    ]
}

/// Arguments for `arduino-cli upload`.
pub fn upload_args(port: &str, fqbn: &str, sketch: &Path) -> Vec<OsString> {
    vec![
        "upload".into(),
        "--port".into(),
        port.into(),
        "--fqbn".into(),
        fqbn.into(),
        sketch
            .as_os_str()
            .to_owned(),
    ]
}

fn run_step(step: &str, args: &[OsString]) -> Result<()> {
    debug!("Running {ARDUINO_CLI} {args:?}");
    let status = Command::new(ARDUINO_CLI)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {ARDUINO_CLI} {step}"))?;

    if !status.success() {
        bail!("{ARDUINO_CLI} {step} failed ({status})");
    }
    Ok(())
}

/// Compile `sketch` and flash it to the board on `port`.
///
/// The serial port must be closed before calling this.
pub fn compile_and_upload(port: &str, fqbn: &str, sketch: &Path) -> Result<()> {
    info!("Compiling {}", sketch.display());
    run_step("compile", &compile_args(fqbn, sketch))?;

    info!("Uploading to {port}");
    run_step("upload", &upload_args(port, fqbn, sketch))?;
    Ok(())
}

/// [`Uploader`] that shells out to `arduino-cli`.
pub struct ArduinoCli;

impl Uploader for ArduinoCli {
    fn upload(&mut self, port: &str, fqbn: &str, sketch: &Path) -> Result<()> {
        compile_and_upload(port, fqbn, sketch)
    }
}
