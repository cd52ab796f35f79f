//! List the serial ports the selector would offer.

use console::style;
use vincal::{DetectedPort, discover_ports};

fn port_json(port: &DetectedPort) -> serde_json::Value {
    serde_json::json!({
        "name": port.name,
        "kind": port.kind.name(),
        "description": port.description(),
        "vid": port.vid,
        "pid": port.pid,
        "manufacturer": port.manufacturer,
        "product": port.product,
        "serial": port.serial,
    })
}

/// List ports command implementation.
pub fn run(json: bool) {
    let ports = discover_ports();

    if json {
        let values: Vec<serde_json::Value> = ports
            .iter()
            .map(port_json)
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&values).unwrap_or_default()
        );
        return;
    }

    eprintln!(
        "{}",
        style("Available serial ports")
            .bold()
            .underlined()
    );

    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return;
    }

    for port in &ports {
        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };
        let description = port.description();
        let description = if description == port.name {
            String::new()
        } else {
            format!(" - {}", style(description).dim())
        };

        eprintln!(
            "  {} {} [{}]{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            port.kind.name(),
            vid_pid,
            description
        );
    }
}
