//! # vincal
//!
//! A library for calibrating the VIN sense ADC of a microcontroller board.
//!
//! The board streams one text line per sample over a serial link. This crate
//! pairs each reading with an independently measured reference voltage, fits
//! a cubic polynomial mapping measured to true voltage, and splices the
//! coefficients back into the firmware's `calibrateVIN` function:
//!
//! - Serial port discovery (Bluetooth endpoints filtered out)
//! - Line-oriented session transport with a settle delay after open
//! - Parser for the board's sample line
//! - Calibration and evaluation collectors driven by an operator prompt
//! - Least-squares cubic fit with residual statistics
//! - Brace-matching firmware patcher
//! - Flushed-per-row CSV logs
//!
//! ## Features
//!
//! - `native` (default): Native serial port support via `serialport`
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use vincal::{Fit, firmware};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let measured = [1.0, 2.0, 3.0, 4.0, 5.0];
//!     let actual = [1.1, 2.05, 2.95, 4.2, 5.1];
//!
//!     let fit = Fit::cubic(&measured, &actual)?;
//!     let report = fit.evaluate(&measured, &actual);
//!     println!("avg {:.4} V, max {:.4} V", report.average_error, report.max_error);
//!
//!     firmware::patch_file("adc_for_calib.ino", &firmware::render_function(&fit))?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod board;
pub mod collect;
pub mod device;
pub mod error;
pub mod firmware;
pub mod fit;
pub mod log_file;
pub mod port;
pub mod protocol;
pub mod transport;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by the collection loops.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications).
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

#[cfg(test)]
pub(crate) fn test_set_interrupted(value: bool) {
    use std::sync::atomic::{AtomicBool, Ordering};

    static TEST_INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

    let flag = TEST_INTERRUPT_FLAG
        .get_or_init(|| {
            let shared = Arc::new(AtomicBool::new(false));
            let checker = Arc::clone(&shared);
            set_interrupt_checker(move || checker.load(Ordering::Relaxed));
            shared
        })
        .clone();

    flag.store(value, Ordering::Relaxed);
}

// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::NativePort;
#[cfg(feature = "native")]
pub use transport::open_native;
pub use {
    board::BoardId,
    collect::{
        CalibrationSession, CollectOutcome, Collector, EvaluationRecord, EvaluationSession, Event,
        MAX_CONSECUTIVE_MISSES, Prompter, SampleSink, difference,
    },
    device::{
        DetectedPort, PortKind, detect_ports, discover_ports, filter_candidates, format_port_list,
    },
    error::{Error, Result},
    firmware::{PatchOutcome, patch_file, patch_source, render_function},
    fit::{Fit, FitReport, Sample},
    log_file::{CalibrationLog, EvaluationLog},
    port::{Port, SerialConfig},
    protocol::{Reading, SAMPLE_REQUEST, parse_line},
    transport::Session,
};
