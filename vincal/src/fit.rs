//! Least-squares cubic fit of actual voltage against measured voltage.

use crate::error::{Error, Result};
use log::debug;
use nalgebra::{DMatrix, DVector};
use std::fmt;

/// Singular values below this (on column-normalised data) are treated as zero.
const SINGULAR_EPS: f64 = 1e-12;

/// One calibration point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// VIN as computed by the board.
    pub measured: f64,
    /// VIN measured independently with a reference meter.
    pub actual: f64,
}

/// Cubic correction `actual = a*m^3 + b*m^2 + c*m + d`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fit {
    /// Cubic coefficient.
    pub a: f64,
    /// Quadratic coefficient.
    pub b: f64,
    /// Linear coefficient.
    pub c: f64,
    /// Constant term.
    pub d: f64,
}

/// Residual statistics of a fit against its calibration points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitReport {
    /// Mean absolute deviation in volts.
    pub average_error: f64,
    /// Largest absolute deviation in volts.
    pub max_error: f64,
}

impl Fit {
    /// Number of coefficients, and therefore the minimum number of samples.
    pub const MIN_SAMPLES: usize = 4;

    /// Build a fit from coefficients, highest degree first.
    pub fn from_coefficients(coefficients: [f64; 4]) -> Self {
        let [a, b, c, d] = coefficients;
        Self { a, b, c, d }
    }

    /// Coefficients, highest degree first.
    pub fn coefficients(&self) -> [f64; 4] {
        [self.a, self.b, self.c, self.d]
    }

    /// Least-squares cubic through `(measured[i], actual[i])`.
    ///
    /// Columns of the Vandermonde matrix are normalised before the SVD solve
    /// so that large voltages do not swamp the constant term.
    pub fn cubic(measured: &[f64], actual: &[f64]) -> Result<Self> {
        if measured.len() != actual.len() {
            return Err(Error::LengthMismatch {
                measured: measured.len(),
                actual: actual.len(),
            });
        }
        if measured.len() < Self::MIN_SAMPLES {
            return Err(Error::InsufficientSamples {
                required: Self::MIN_SAMPLES,
                got: measured.len(),
            });
        }

        let n = measured.len();
        let mut lhs = DMatrix::from_fn(n, 4, |i, j| {
            let exponent = i32::try_from(3 - j).unwrap_or(0);
            measured[i].powi(exponent)
        });
        let rhs = DVector::from_column_slice(actual);

        let mut scale = [1.0f64; 4];
        for (j, s) in scale
            .iter_mut()
            .enumerate()
        {
            let norm = lhs
                .column(j)
                .norm();
            if norm > 0.0 {
                *s = norm;
                lhs.column_mut(j)
                    .unscale_mut(norm);
            }
        }

        let solution = lhs
            .svd(true, true)
            .solve(&rhs, SINGULAR_EPS)
            .map_err(|e| Error::Fit(e.to_string()))?;

        let fit = Self {
            a: solution[0] / scale[0],
            b: solution[1] / scale[1],
            c: solution[2] / scale[2],
            d: solution[3] / scale[3],
        };

        if !fit
            .coefficients()
            .iter()
            .all(|c| c.is_finite())
        {
            return Err(Error::Fit(format!("non-finite coefficients: {fit}")));
        }

        debug!("Cubic fit over {n} samples: {fit}");
        Ok(fit)
    }

    /// Least-squares cubic through a sequence of samples.
    pub fn from_samples(samples: &[Sample]) -> Result<Self> {
        let (measured, actual): (Vec<f64>, Vec<f64>) = samples
            .iter()
            .map(|s| (s.measured, s.actual))
            .unzip();
        Self::cubic(&measured, &actual)
    }

    /// Corrected voltage for a measured value.
    pub fn apply(&self, measured: f64) -> f64 {
        ((self.a * measured + self.b) * measured + self.c) * measured + self.d
    }

    /// Mean and maximum absolute residual over the given points.
    ///
    /// Extra elements of the longer slice are ignored; empty input reports zero.
    pub fn evaluate(&self, measured: &[f64], actual: &[f64]) -> FitReport {
        let errors: Vec<f64> = measured
            .iter()
            .zip(actual)
            .map(|(&m, &y)| (self.apply(m) - y).abs())
            .collect();

        if errors.is_empty() {
            return FitReport {
                average_error: 0.0,
                max_error: 0.0,
            };
        }

        FitReport {
            average_error: errors
                .iter()
                .sum::<f64>()
                / errors.len() as f64,
            max_error: errors
                .iter()
                .copied()
                .fold(0.0, f64::max),
        }
    }

    /// [`Fit::evaluate`] over samples.
    pub fn evaluate_samples(&self, samples: &[Sample]) -> FitReport {
        let (measured, actual): (Vec<f64>, Vec<f64>) = samples
            .iter()
            .map(|s| (s.measured, s.actual))
            .unzip();
        self.evaluate(&measured, &actual)
    }
}

impl fmt::Display for Fit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}, {}]", self.a, self.b, self.c, self.d)
    }
}
