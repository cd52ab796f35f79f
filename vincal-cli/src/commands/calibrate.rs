//! Calibration mode: collect samples, fit, patch and optionally upload.

use {
    super::{Bench, Opener, Uploader, evaluate, patch},
    crate::{CliError, config::Settings, prompt},
    anyhow::{Context, Result},
    console::style,
    log::{error, warn},
    std::path::Path,
    vincal::{
        BoardId, CalibrationLog, CalibrationSession, CollectOutcome, Collector, Fit, FitReport,
        Prompter, log_file, render_function,
    },
};

/// Question asked once calibration is done.
pub const EVALUATION_QUESTION: &str = "Do you want to proceed with Evaluation Mode?";

/// Operator-facing fit summary, errors to 4 decimals.
pub fn format_report(fit: &Fit, report: &FitReport) -> String {
    format!(
        "Cubic Fit Coefficients: a={}, b={}, c={}, d={}\nAverage Error: {:.4} V\nMaximum Error: {:.4} V",
        fit.a, fit.b, fit.c, fit.d, report.average_error, report.max_error
    )
}

/// Run calibration against `port`, then offer evaluation if `offer_evaluation`.
pub fn run<O, Q, U>(
    settings: &Settings,
    board: &BoardId,
    port: &str,
    bench: &mut Bench<O, Q, U>,
    offer_evaluation: bool,
) -> Result<()>
where
    O: Opener,
    Q: Prompter,
    U: Uploader,
{
    let quiet = bench.quiet;

    // The previous log is only replaced once the board is reachable.
    let mut session = bench
        .opener
        .open(port)?;
    let path = log_file::calibration_path(&settings.output_dir, &settings.prefix, board);
    let log = CalibrationLog::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut sink = CalibrationSession::new(log);

    if !quiet {
        eprintln!(
            "{} Calibration mode on {port}, logging to {}",
            style("🔌").cyan(),
            path.display()
        );
    }

    let outcome = Collector::new(&mut session, &mut bench.prompter).run(&mut sink);
    // Release the port before anything else may need it (upload, evaluation).
    let closed = session.close();
    let outcome = outcome.with_context(|| {
        format!(
            "Calibration stopped, {} sample(s) kept in {}",
            sink.samples()
                .len(),
            path.display()
        )
    })?;
    closed.context("Failed to close serial port")?;

    let count = sink
        .samples()
        .len();
    if outcome == CollectOutcome::Interrupted {
        if !sink.can_fit() {
            return Err(CliError::Cancelled(format!(
                "Calibration interrupted, {count} sample(s) kept in {}",
                path.display()
            ))
            .into());
        }
        // With enough samples an interrupt ends collection like `q`.
        crate::clear_interrupted();
        warn!("Calibration interrupted, fitting the {count} sample(s) collected");
    }

    match sink.finish() {
        Ok(fit) => apply_fit(settings, port, bench, &sink, &fit, &path),
        Err(e) => eprintln!(
            "{} Cannot compute calibration: {e}. Firmware left unchanged, {count} sample(s) kept in {}",
            style("✗").red(),
            path.display()
        ),
    }

    if offer_evaluation && prompt::confirm(&mut bench.prompter, EVALUATION_QUESTION)? {
        evaluate::run(settings, board, port, bench)?;
    }
    Ok(())
}

/// Report the fit, patch the sketch and upload it if configured.
///
/// Failures are reported and never undo the logged data.
fn apply_fit<O, Q, U>(
    settings: &Settings,
    port: &str,
    bench: &mut Bench<O, Q, U>,
    sink: &CalibrationSession,
    fit: &Fit,
    path: &Path,
) where
    O: Opener,
    Q: Prompter,
    U: Uploader,
{
    let report = fit.evaluate_samples(sink.samples());
    let rendered = render_function(fit);

    if !bench.quiet {
        eprintln!("\n{}", format_report(fit, &report));
        eprintln!("\n{}\n", style(&rendered).cyan());
    }

    let sketch = match patch::patch_with_recovery(
        &mut bench.prompter,
        &settings.firmware,
        &settings.extension,
        &rendered,
    ) {
        Ok(sketch) => sketch,
        Err(e) => {
            error!("{e:#}");
            eprintln!(
                "{} Firmware not patched; calibration data kept in {}",
                style("✗").red(),
                path.display()
            );
            return;
        },
    };

    if !settings.upload {
        return;
    }
    match bench
        .uploader
        .upload(port, &settings.fqbn, &sketch)
    {
        Ok(()) => eprintln!("{} Uploaded {}", style("✓").green(), sketch.display()),
        Err(e) => {
            error!("{e:#}");
            eprintln!(
                "{} Upload failed; the sketch is patched, upload it manually",
                style("✗").red()
            );
        },
    }
}
