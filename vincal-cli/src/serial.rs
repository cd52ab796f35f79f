//! Interactive serial port selection.
//!
//! Bluetooth serial links are never offered. The remaining ports are shown as
//! an ordinal list and the operator is asked until a valid number is entered.

use {
    crate::{CliError, config::Settings, prompt},
    anyhow::Result,
    console::style,
    log::{debug, info},
    vincal::{DetectedPort, discover_ports, format_port_list},
};

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

/// Parse a 1-based ordinal choice against `count` entries.
pub fn parse_port_choice(input: &str, count: usize) -> Option<usize> {
    let choice: usize = input
        .trim()
        .parse()
        .ok()?;
    (1..=count)
        .contains(&choice)
        .then(|| choice - 1)
}

/// Resolve the port to open: explicit flag or config first, then ask.
pub fn select_serial_port(settings: &Settings) -> Result<String> {
    if let Some(port_name) = &settings.port {
        debug!("Using configured port: {port_name}");
        return Ok(port_name.clone());
    }

    let ports = discover_ports();
    if ports.is_empty() {
        return Err(usage_err("No serial ports found"));
    }

    prompt::ensure_interactive_terminal()?;
    select_port_interactive(&ports)
}

fn select_port_interactive(ports: &[DetectedPort]) -> Result<String> {
    eprintln!(
        "{} Found {} serial port(s):",
        style("ℹ").blue(),
        ports.len()
    );

    let term_width = console::Term::stderr()
        .size()
        .1 as usize;
    for line in format_port_list(ports) {
        eprintln!(
            "  {}",
            console::truncate_str(&line, term_width.saturating_sub(2), "\u{2026}")
        );
    }

    loop {
        let Some(input) = prompt::ask_text(&format!("Select a port (1-{})", ports.len()))? else {
            return Err(CliError::Cancelled("Port selection cancelled".to_string()).into());
        };

        if let Some(index) = parse_port_choice(&input, ports.len()) {
            let name = ports[index]
                .name
                .clone();
            info!("Selected port: {name}");
            return Ok(name);
        }

        eprintln!(
            "{} Invalid choice '{}', enter a number between 1 and {}",
            style("✗").red(),
            input.trim(),
            ports.len()
        );
    }
}
