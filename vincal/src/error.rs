//! Error types for vincal.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for vincal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for vincal operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// CSV log error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The board stopped answering sample requests.
    #[error("No data received from the board after {misses} attempts")]
    NoResponse {
        /// Consecutive empty or unparsable lines seen.
        misses: u32,
    },

    /// Not enough samples for a cubic fit.
    #[error("Need at least {required} samples for a cubic fit, got {got}")]
    InsufficientSamples {
        /// Minimum number of samples.
        required: usize,
        /// Samples supplied.
        got: usize,
    },

    /// Measured and actual sequences differ in length.
    #[error("Sample length mismatch: {measured} measured vs {actual} actual")]
    LengthMismatch {
        /// Measured values supplied.
        measured: usize,
        /// Actual values supplied.
        actual: usize,
    },

    /// Least-squares solve failed or produced non-finite coefficients.
    #[error("Fit failed: {0}")]
    Fit(String),

    /// Firmware source file does not exist.
    #[error("Firmware file not found: {}", .0.display())]
    FirmwareNotFound(PathBuf),

    /// Firmware source could not be patched.
    #[error("Cannot patch firmware: {0}")]
    Patch(String),

    /// Board identifier is not exactly four digits.
    #[error("Invalid board number '{0}': expected 4 digits")]
    InvalidBoard(String),

    /// Operation was interrupted by the operator.
    #[error("Interrupted")]
    Interrupted,
}
