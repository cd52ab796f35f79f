//! Board text protocol.
//!
//! The host writes a single `a` byte to request a sample. The board answers
//! with one line:
//!
//! ```text
//! Raw ADC: 2048 | ESP ADC Cal Raw to Voltage: 1.6420 | Calculated VIN: 12.3150 | Calibrated VIN: 12.2987
//! ```
//!
//! Anything else on the wire (boot banners, diagnostics, partial lines) is
//! not a reading.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

/// Command byte that requests one sample.
pub const SAMPLE_REQUEST: u8 = b'a';

#[allow(clippy::unwrap_used)] // Static pattern
static READING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"Raw ADC: (\d+) \| ESP ADC Cal Raw to Voltage: ([\d.]+) \| Calculated VIN: ([\d.]+) \| Calibrated VIN: ([\d.]+)",
    )
    .unwrap()
});

/// One sample line from the board.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Reading {
    /// Raw ADC code.
    pub raw_adc: u32,
    /// ESP-IDF calibrated raw-to-voltage at the ADC pin.
    pub esp_voltage: f64,
    /// VIN computed from the divider ratio. This is the "measured" value.
    pub calculated_vin: f64,
    /// VIN after the firmware's `calibrateVIN` correction.
    pub calibrated_vin: f64,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Raw ADC: {} | ESP ADC Cal Raw to Voltage: {} | Calculated VIN: {} | Calibrated VIN: {}",
            self.raw_adc, self.esp_voltage, self.calculated_vin, self.calibrated_vin
        )
    }
}

/// Parse a sample line. Returns `None` for anything that is not a reading.
///
/// The pattern may appear anywhere in the line, so a reading preceded by a
/// log prefix still parses.
pub fn parse_line(line: &str) -> Option<Reading> {
    let caps = READING_PATTERN.captures(line)?;
    Some(Reading {
        raw_adc: caps[1]
            .parse()
            .ok()?,
        esp_voltage: caps[2]
            .parse()
            .ok()?,
        calculated_vin: caps[3]
            .parse()
            .ok()?,
        calibrated_vin: caps[4]
            .parse()
            .ok()?,
    })
}
