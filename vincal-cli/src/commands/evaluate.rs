//! Evaluation mode: measure how well the uploaded correction performs.

use {
    super::{Bench, Opener},
    crate::{CliError, config::Settings},
    anyhow::{Context, Result},
    console::style,
    vincal::{
        BoardId, CollectOutcome, Collector, EvaluationLog, EvaluationSession, Prompter, log_file,
    },
};

/// Run one evaluation session against `port`.
pub fn run<O, Q, U>(
    settings: &Settings,
    board: &BoardId,
    port: &str,
    bench: &mut Bench<O, Q, U>,
) -> Result<()>
where
    O: Opener,
    Q: Prompter,
{
    let quiet = bench.quiet;

    let mut session = bench
        .opener
        .open(port)?;
    let path = log_file::evaluation_path(&settings.output_dir, &settings.prefix, board);
    let log = EvaluationLog::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut sink = EvaluationSession::new(log);

    if !quiet {
        eprintln!(
            "{} Evaluation mode on {port}, logging to {}",
            style("🔌").cyan(),
            path.display()
        );
    }

    let outcome = Collector::new(&mut session, &mut bench.prompter).run(&mut sink);
    let closed = session.close();
    let outcome = outcome.with_context(|| {
        format!(
            "Evaluation stopped, {} record(s) kept in {}",
            sink.records()
                .len(),
            path.display()
        )
    })?;
    closed.context("Failed to close serial port")?;

    let count = sink
        .records()
        .len();
    if outcome == CollectOutcome::Interrupted {
        return Err(CliError::Cancelled(format!(
            "Evaluation interrupted, {count} record(s) kept in {}",
            path.display()
        ))
        .into());
    }

    if !quiet {
        eprintln!(
            "{} Evaluation complete: {count} record(s) in {}",
            style("✓").green(),
            path.display()
        );
        if count > 0 {
            let worst = sink
                .records()
                .iter()
                .map(|r| r.difference.abs())
                .fold(0.0, f64::max);
            eprintln!("  Largest difference: {worst:.4} V");
        }
    }
    Ok(())
}
