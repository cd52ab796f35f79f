//! Operator-driven sample collection.
//!
//! Calibration and evaluation share one state machine:
//!
//! ```text
//!            'a'                 valid line             number
//! AwaitCommand ──► AwaitSample ─────────────► AwaitActualValue ──► AwaitCommand
//!      │               │ empty / other line        │ not a number
//!      │ 'q'           └──► (retry, abort after    └──► (re-prompt)
//!      ▼                    10 consecutive misses)
//!    Done
//! ```
//!
//! What happens to a confirmed `(reading, actual)` pair is up to the
//! [`SampleSink`]: the calibration session keeps samples for a fit, the
//! evaluation session logs the residual of the firmware's current correction.

use crate::error::{Error, Result};
use crate::fit::{Fit, Sample};
use crate::log_file::{CalibrationLog, EvaluationLog};
use crate::port::Port;
use crate::protocol::{Reading, parse_line};
use crate::transport::Session;
use log::{debug, warn};

/// Consecutive empty or unparsable lines tolerated while waiting for a sample.
pub const MAX_CONSECUTIVE_MISSES: u32 = 10;

/// Prompt shown while waiting for a command.
pub const COMMAND_PROMPT: &str = "Enter 'a' to input Actual Voltage, or 'q' to quit";

/// Prompt shown for the reference voltage.
pub const ACTUAL_PROMPT: &str = "Actual Input Voltage";

/// Progress notifications for the operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event<'a> {
    /// A sample was requested from the board.
    WaitingForSample,
    /// A non-empty line arrived from the board.
    Received(&'a str),
    /// A sample was recorded; carries the sink's summary.
    Logged(&'a str),
    /// The reference voltage entry was not a number.
    InvalidNumber(&'a str),
    /// The command was neither `a` nor `q`.
    UnknownCommand(&'a str),
}

/// Source of operator input.
pub trait Prompter {
    /// Ask the operator for a line of input.
    ///
    /// Returns `None` when input is closed or the operator interrupted.
    fn prompt(&mut self, message: &str) -> Result<Option<String>>;

    /// Show a progress notification.
    fn notify(&mut self, _event: Event<'_>) {}
}

/// Destination of confirmed samples.
pub trait SampleSink {
    /// Record a reading paired with the operator's reference voltage.
    ///
    /// Returns a one-line summary for the operator.
    fn record(&mut self, reading: &Reading, actual: f64) -> Result<String>;
}

/// How a collection run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The operator entered `q`.
    Finished,
    /// Input closed or an interrupt was requested.
    Interrupted,
}

#[derive(Debug)]
enum State {
    AwaitCommand,
    AwaitSample,
    AwaitActualValue(Reading),
    Done,
}

/// Runs the collection state machine over a session and a prompter.
pub struct Collector<'a, P: Port, Q: Prompter> {
    session: &'a mut Session<P>,
    prompter: &'a mut Q,
    misses: u32,
    interrupted: fn() -> bool,
}

impl<'a, P: Port, Q: Prompter> Collector<'a, P, Q> {
    /// Create a collector. Interrupts are taken from [`crate::is_interrupted_requested`].
    pub fn new(session: &'a mut Session<P>, prompter: &'a mut Q) -> Self {
        Self {
            session,
            prompter,
            misses: 0,
            interrupted: crate::is_interrupted_requested,
        }
    }

    /// Replace the interrupt check.
    #[must_use]
    pub fn with_interrupt_check(mut self, check: fn() -> bool) -> Self {
        self.interrupted = check;
        self
    }

    /// Collect samples into `sink` until the operator quits.
    ///
    /// Fails with [`Error::NoResponse`] once more than
    /// [`MAX_CONSECUTIVE_MISSES`] lines in a row are empty or unparsable.
    pub fn run<S: SampleSink>(&mut self, sink: &mut S) -> Result<CollectOutcome> {
        let mut state = State::AwaitCommand;

        loop {
            if (self.interrupted)() {
                debug!("Collection interrupted in {state:?}");
                return Ok(CollectOutcome::Interrupted);
            }

            state = match state {
                State::AwaitCommand => {
                    let Some(input) = self
                        .prompter
                        .prompt(COMMAND_PROMPT)?
                    else {
                        return Ok(CollectOutcome::Interrupted);
                    };
                    match input
                        .trim()
                        .to_ascii_lowercase()
                        .as_str()
                    {
                        "q" => State::Done,
                        "a" => {
                            self.session
                                .request_sample()?;
                            self.prompter
                                .notify(Event::WaitingForSample);
                            State::AwaitSample
                        },
                        other => {
                            self.prompter
                                .notify(Event::UnknownCommand(other));
                            State::AwaitCommand
                        },
                    }
                },
                State::AwaitSample => self.await_sample()?,
                State::AwaitActualValue(reading) => {
                    let Some(input) = self
                        .prompter
                        .prompt(ACTUAL_PROMPT)?
                    else {
                        return Ok(CollectOutcome::Interrupted);
                    };
                    match input
                        .trim()
                        .parse::<f64>()
                    {
                        Ok(actual) if actual.is_finite() => {
                            let summary = sink.record(&reading, actual)?;
                            self.prompter
                                .notify(Event::Logged(&summary));
                            State::AwaitCommand
                        },
                        _ => {
                            self.prompter
                                .notify(Event::InvalidNumber(input.trim()));
                            State::AwaitActualValue(reading)
                        },
                    }
                },
                State::Done => return Ok(CollectOutcome::Finished),
            };
        }
    }

    fn await_sample(&mut self) -> Result<State> {
        let line = self
            .session
            .read_line()?;
        if !line.is_empty() {
            self.prompter
                .notify(Event::Received(&line));
        }

        if let Some(reading) = parse_line(&line) {
            self.misses = 0;
            return Ok(State::AwaitActualValue(reading));
        }

        self.misses += 1;
        debug!("No reading in line ({} consecutive misses)", self.misses);
        if self.misses > MAX_CONSECUTIVE_MISSES {
            warn!("Board on {} stopped responding", self.session.name());
            return Err(Error::NoResponse {
                misses: self.misses,
            });
        }
        Ok(State::AwaitSample)
    }
}

/// Signed residual `actual - calibrated`, rounded to 4 decimal places.
pub fn difference(actual: f64, calibrated: f64) -> f64 {
    round4(actual - calibrated)
}

/// Round to 4 decimals the way the value prints.
///
/// Scaling by 10^4 first would move binary ties such as `5.00005` (stored
/// just below the half) across the rounding boundary.
fn round4(value: f64) -> f64 {
    format!("{value:.4}")
        .parse()
        .unwrap_or(value)
}

/// Samples gathered for a fit, logged as they arrive.
#[derive(Debug)]
pub struct CalibrationSession {
    log: CalibrationLog,
    samples: Vec<Sample>,
}

impl CalibrationSession {
    /// Start a session writing to `log`.
    pub fn new(log: CalibrationLog) -> Self {
        Self {
            log,
            samples: Vec::new(),
        }
    }

    /// Samples collected so far.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// The session's log.
    pub fn log(&self) -> &CalibrationLog {
        &self.log
    }

    /// Whether enough samples exist for a cubic fit.
    pub fn can_fit(&self) -> bool {
        self.samples
            .len()
            >= Fit::MIN_SAMPLES
    }

    /// Fit the collected samples and append the coefficients to the log.
    pub fn finish(&self) -> Result<Fit> {
        let fit = Fit::from_samples(&self.samples)?;
        self.log
            .append_coefficients(&fit)?;
        Ok(fit)
    }
}

impl SampleSink for CalibrationSession {
    fn record(&mut self, reading: &Reading, actual: f64) -> Result<String> {
        let sample = Sample {
            measured: reading.calculated_vin,
            actual,
        };
        self.log
            .append(&sample)?;
        self.samples
            .push(sample);
        Ok(format!(
            "Measured VIN={}, Actual VIN={}",
            sample.measured, sample.actual
        ))
    }
}

/// One evaluation row: a reading, its reference value and the residual.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationRecord {
    /// Reading reported by the board.
    pub reading: Reading,
    /// Reference voltage entered by the operator.
    pub actual: f64,
    /// `actual - calibrated_vin`, 4 decimals.
    pub difference: f64,
}

/// Evaluation of the firmware's current correction against fresh references.
#[derive(Debug)]
pub struct EvaluationSession {
    log: EvaluationLog,
    records: Vec<EvaluationRecord>,
}

impl EvaluationSession {
    /// Start a session writing to `log`.
    pub fn new(log: EvaluationLog) -> Self {
        Self {
            log,
            records: Vec::new(),
        }
    }

    /// Records collected so far.
    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    /// The session's log.
    pub fn log(&self) -> &EvaluationLog {
        &self.log
    }
}

impl SampleSink for EvaluationSession {
    fn record(&mut self, reading: &Reading, actual: f64) -> Result<String> {
        let record = EvaluationRecord {
            reading: *reading,
            actual,
            difference: difference(actual, reading.calibrated_vin),
        };
        self.log
            .append(&record)?;
        self.records
            .push(record);
        Ok(format!(
            "Raw ADC={}, Calibrated VIN={}, Actual={}, Diff={}",
            reading.raw_adc, reading.calibrated_vin, actual, record.difference
        ))
    }
}
