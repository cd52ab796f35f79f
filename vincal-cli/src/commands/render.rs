//! Print the firmware function for a set of coefficients.

use vincal::{Fit, render_function};

/// Parse `a,b,c,d` into coefficients, highest degree first.
pub fn parse_coefficients(s: &str) -> Result<[f64; 4], String> {
    let values = s
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("Invalid coefficient: '{part}'"))
        })
        .collect::<Result<Vec<f64>, String>>()?;

    <[f64; 4]>::try_from(values).map_err(|v| {
        format!(
            "Expected 4 coefficients (a,b,c,d), got {}",
            v.len()
        )
    })
}

/// Render the function to stdout.
pub fn run(coefficients: [f64; 4]) {
    println!(
        "{}",
        render_function(&Fit::from_coefficients(coefficients))
    );
}
