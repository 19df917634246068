//! # Local curve fitting
//!
//! Fits a polynomial `y = c0 + c1*x + ... + cn*x^n` to the path points expressed in the robot-local
//! frame. Since the robot sits at the origin of that frame facing along X, the cross track error
//! is the curve's value at `x = 0` and the heading error is the angle of its slope there.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector};
use serde::Serialize;

use util::maths::{poly_deriv_eval, poly_eval};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Diagonal elements of R smaller than this fraction of the largest mark the fit as rank
/// deficient.
const RANK_TOLERANCE: f64 = 1e-10;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A polynomial fitted to the local path. Only valid for the tick which produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalCurve {
    /// Coefficients, lowest power first
    pub coeffs: Vec<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum FitError {
    #[error("Cannot fit a degree {degree} curve to {num_points} points")]
    DegenerateFit { degree: usize, num_points: usize },

    #[error("Number of X values ({0}) and Y values ({1}) differ")]
    LengthMismatch(usize, usize),

    #[error("The least squares problem is singular, are the points' X values distinct?")]
    Singular,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LocalCurve {
    /// Fit a curve of the given degree to the points.
    ///
    /// The least squares solution is found with a Householder QR decomposition of the
    /// Vandermonde matrix.
    pub fn fit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Self, FitError> {
        if xs.len() != ys.len() {
            return Err(FitError::LengthMismatch(xs.len(), ys.len()));
        }

        if degree < 1 || degree + 1 > xs.len() {
            return Err(FitError::DegenerateFit {
                degree,
                num_points: xs.len(),
            });
        }

        let a = DMatrix::from_fn(xs.len(), degree + 1, |r, c| xs[r].powi(c as i32));
        let y = DVector::from_column_slice(ys);

        // A = QR, so R c = Q^T y
        let qr = a.qr();
        let r = qr.r();

        let max_diag = r.diagonal().iter().fold(0.0f64, |m, d| m.max(d.abs()));
        if r
            .diagonal()
            .iter()
            .any(|d| d.abs() <= max_diag * RANK_TOLERANCE)
        {
            return Err(FitError::Singular);
        }

        let qty = qr.q().transpose() * y;
        let coeffs = r
            .solve_upper_triangular(&qty)
            .ok_or(FitError::Singular)?;

        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(FitError::Singular);
        }

        Ok(Self {
            coeffs: coeffs.iter().copied().collect(),
        })
    }

    /// Value of the curve at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        poly_eval(&self.coeffs, x)
    }

    /// Slope of the curve at `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        poly_deriv_eval(&self.coeffs, x)
    }

    /// Lateral offset of the curve from the robot.
    pub fn cross_track_error(&self) -> f64 {
        self.evaluate(0.0)
    }

    /// Angle between the robot's heading and the curve's tangent at the robot.
    ///
    /// Uses only the linear coefficient, which is exact at `x = 0`.
    pub fn heading_error(&self) -> f64 {
        self.coeffs.get(1).map(|c| c.atan()).unwrap_or(0.0)
    }
}
