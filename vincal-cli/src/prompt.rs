//! Terminal prompts for the interactive workflow.

use {
    crate::CliError,
    anyhow::Result,
    console::style,
    dialoguer::{Error as DialoguerError, Input, theme::ColorfulTheme},
    std::io::{ErrorKind, IsTerminal},
    vincal::{BoardId, Event, Prompter},
};

/// Operating mode chosen at the mode prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Collect samples and fit.
    Calibration,
    /// Measure the current correction.
    Evaluation,
}

impl Mode {
    /// Parse the operator's `c`/`e` answer.
    pub fn parse(input: &str) -> Option<Self> {
        match input
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "c" => Some(Self::Calibration),
            "e" => Some(Self::Evaluation),
            _ => None,
        }
    }
}

/// Fail with a usage error when stdin or stderr is not a terminal.
pub fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(CliError::Usage(
            "Interactive prompts need a terminal; run vincal from a terminal".to_string(),
        )
        .into())
    }
}

fn is_interrupt(err: &DialoguerError) -> bool {
    match err {
        DialoguerError::IO(io_err) => io_err.kind() == ErrorKind::Interrupted,
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    if is_interrupt(&err) {
        CliError::Cancelled("Prompt cancelled".to_string()).into()
    } else {
        anyhow::Error::new(err).context("Prompt failed")
    }
}

/// Read one line of text; `None` when the operator interrupted.
fn read_text(prompt: &str) -> std::result::Result<Option<String>, DialoguerError> {
    match Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()
    {
        Ok(text) => Ok(Some(text)),
        Err(e) if is_interrupt(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Prompt until a valid four-digit board number is entered.
pub fn ask_board() -> Result<BoardId> {
    loop {
        let Some(input) = read_text("Board no. (in XXXX)").map_err(map_prompt_error)? else {
            return Err(CliError::Cancelled("Board selection cancelled".to_string()).into());
        };
        match BoardId::parse(&input) {
            Ok(board) => return Ok(board),
            Err(e) => eprintln!("{} {e}", style("✗").red()),
        }
    }
}

/// Prompt until `c` or `e` is entered.
pub fn ask_mode() -> Result<Mode> {
    loop {
        let Some(input) = read_text("Select mode - Calibration (c) or Evaluation (e)")
            .map_err(map_prompt_error)?
        else {
            return Err(CliError::Cancelled("Mode selection cancelled".to_string()).into());
        };
        match Mode::parse(&input) {
            Some(mode) => return Ok(mode),
            None => eprintln!(
                "{} Invalid mode '{}', enter 'c' or 'e'",
                style("✗").red(),
                input.trim()
            ),
        }
    }
}

/// Ask a yes/no question; only `y`/`yes` answers yes, closed input answers no.
pub fn confirm<Q: Prompter>(prompter: &mut Q, question: &str) -> Result<bool> {
    let answer = prompter.prompt(&format!("{question} (y/n)"))?;
    Ok(answer.is_some_and(|a| {
        matches!(
            a.trim()
                .to_ascii_lowercase()
                .as_str(),
            "y" | "yes"
        )
    }))
}

/// Ask for a line of free text; `None` when interrupted.
pub fn ask_text(prompt: &str) -> Result<Option<String>> {
    read_text(prompt).map_err(map_prompt_error)
}

/// [`Prompter`] over the terminal, with progress printed to stderr.
pub struct TerminalPrompter {
    quiet: bool,
}

impl TerminalPrompter {
    /// Create a prompter; `quiet` hides progress notifications.
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }
}

impl Prompter for TerminalPrompter {
    fn prompt(&mut self, message: &str) -> vincal::Result<Option<String>> {
        read_text(message).map_err(|DialoguerError::IO(e)| vincal::Error::Io(e))
    }

    fn notify(&mut self, event: Event<'_>) {
        match event {
            Event::WaitingForSample if !self.quiet => {
                eprintln!("{} Waiting for serial data...", style("⏳").yellow());
            },
            Event::Received(line) if !self.quiet => {
                eprintln!("  {} {}", style("Received:").dim(), line);
            },
            Event::Logged(summary) if !self.quiet => {
                eprintln!("{} Logged: {summary}", style("✓").green());
            },
            Event::InvalidNumber(input) => {
                eprintln!(
                    "{} '{input}' is not a number, enter the measured voltage",
                    style("✗").red()
                );
            },
            Event::UnknownCommand(input) => {
                eprintln!(
                    "{} Unknown command '{input}', enter 'a' or 'q'",
                    style("✗").red()
                );
            },
            _ => {},
        }
    }
}
