//! Body-image calibration
//!
//! The self-reported body-image picture scale is calibrated against measured
//! BMI with an orthogonal-distance regression, since both axes carry
//! measurement error. The fit maps the ideal body-image selection onto the
//! BMI scale; the difference to measured BMI is the perceived fatness.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{CohortError, Result};

/// Default iteration bound for the ODR solver
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Initial Levenberg-Marquardt damping
const INITIAL_DAMPING: f64 = 1e-3;

/// Damping above which the solver gives up
const MAX_DAMPING: f64 = 1e16;

/// Solver settings for the orthogonal-distance fit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdrConfig {
    /// Upper bound on solver iterations
    pub max_iterations: usize,
    /// Relative sum-of-squares reduction treated as converged
    pub sum_of_squares_tolerance: f64,
    /// Relative parameter change treated as converged
    pub parameter_tolerance: f64,
}

impl Default for OdrConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            sum_of_squares_tolerance: f64::EPSILON.sqrt(),
            parameter_tolerance: f64::EPSILON.powf(2.0 / 3.0),
        }
    }
}

/// Linear calibration `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    pub intercept: f64,
    pub slope: f64,
}

impl CalibrationParams {
    pub fn apply(&self, q: f64) -> f64 {
        self.intercept + self.slope * q
    }
}

/// Orthogonal-distance calibrator for the body-image scale
#[derive(Debug, Clone, Default)]
pub struct BodyImageCalibrator {
    config: OdrConfig,
}

impl BodyImageCalibrator {
    pub fn new(config: OdrConfig) -> Self {
        Self { config }
    }

    /// Fit `y ≈ intercept + slope * x` minimizing perpendicular residuals.
    ///
    /// With equal weights on both axes the optimal point corrections have a
    /// closed form, which leaves the residuals `(y - b0 - b1 x) / sqrt(1 + b1²)`
    /// to be minimized over the two parameters. They are solved with
    /// Levenberg-Marquardt starting from (0, 0).
    pub fn fit(&self, x: &[f64], y: &[f64]) -> Result<CalibrationParams> {
        if x.len() != y.len() {
            return Err(CohortError::DataError(format!(
                "calibration axes differ in length ({} vs {})",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(CohortError::FitError(format!(
                "need at least two points to fit a line, got {}",
                x.len()
            )));
        }
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(CohortError::FitError(
                "calibration data contains non-finite values".to_string(),
            ));
        }
        if x.iter().all(|v| *v == x[0]) {
            return Err(CohortError::FitError(
                "predictor is constant; slope is undefined".to_string(),
            ));
        }

        let mut beta = [0.0_f64, 0.0_f64];
        let mut sum_sq = sum_of_squares(x, y, beta);
        let mut damping = INITIAL_DAMPING;

        for iteration in 0..self.config.max_iterations {
            if sum_sq == 0.0 {
                return Ok(finish(beta, iteration));
            }

            let (jtj, gradient) = normal_equations(x, y, beta);
            let step = solve_damped(jtj, gradient, damping)?;
            let candidate = [beta[0] + step[0], beta[1] + step[1]];
            let candidate_sum_sq = sum_of_squares(x, y, candidate);

            let step_norm = step[0].hypot(step[1]);
            let beta_norm = beta[0].hypot(beta[1]);
            let small_step = step_norm
                <= self.config.parameter_tolerance * (beta_norm + self.config.parameter_tolerance);

            if candidate_sum_sq.is_finite() && candidate_sum_sq <= sum_sq {
                let reduction = (sum_sq - candidate_sum_sq) / sum_sq;
                beta = candidate;
                sum_sq = candidate_sum_sq;
                damping = (damping / 10.0).max(f64::EPSILON);

                if reduction <= self.config.sum_of_squares_tolerance || small_step {
                    return Ok(finish(beta, iteration + 1));
                }
            } else {
                if small_step {
                    return Ok(finish(beta, iteration + 1));
                }
                damping *= 10.0;
                if damping > MAX_DAMPING {
                    break;
                }
            }
        }

        Err(CohortError::FitError(format!(
            "orthogonal-distance regression did not converge within {} iterations",
            self.config.max_iterations
        )))
    }

    /// Apply fitted parameters elementwise
    pub fn project(params: &CalibrationParams, q: &[f64]) -> Vec<f64> {
        q.iter().map(|v| params.apply(*v)).collect()
    }
}

fn finish(beta: [f64; 2], iterations: usize) -> CalibrationParams {
    debug!(
        "ODR converged after {iterations} iterations: intercept={:.6}, slope={:.6}",
        beta[0], beta[1]
    );
    CalibrationParams {
        intercept: beta[0],
        slope: beta[1],
    }
}

/// Sum of squared orthogonal distances
fn sum_of_squares(x: &[f64], y: &[f64], beta: [f64; 2]) -> f64 {
    let scale = 1.0 + beta[1] * beta[1];
    x.iter()
        .zip(y)
        .map(|(xi, yi)| {
            let e = yi - beta[0] - beta[1] * xi;
            e * e / scale
        })
        .sum()
}

/// Accumulate JᵀJ and Jᵀr for the orthogonal residuals
fn normal_equations(x: &[f64], y: &[f64], beta: [f64; 2]) -> ([[f64; 2]; 2], [f64; 2]) {
    let scale = 1.0 + beta[1] * beta[1];
    let s = scale.sqrt();
    let mut jtj = [[0.0; 2]; 2];
    let mut gradient = [0.0; 2];

    for (xi, yi) in x.iter().zip(y) {
        let r = (yi - beta[0] - beta[1] * xi) / s;
        let d0 = -1.0 / s;
        let d1 = -xi / s - r * beta[1] / scale;

        jtj[0][0] += d0 * d0;
        jtj[0][1] += d0 * d1;
        jtj[1][1] += d1 * d1;
        gradient[0] += d0 * r;
        gradient[1] += d1 * r;
    }
    jtj[1][0] = jtj[0][1];
    (jtj, gradient)
}

/// Solve (JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr
fn solve_damped(jtj: [[f64; 2]; 2], gradient: [f64; 2], damping: f64) -> Result<[f64; 2]> {
    let a00 = jtj[0][0] * (1.0 + damping);
    let a11 = jtj[1][1] * (1.0 + damping);
    let a01 = jtj[0][1];
    let det = a00 * a11 - a01 * a01;

    if !det.is_finite() || det.abs() < f64::MIN_POSITIVE {
        return Err(CohortError::FitError(
            "singular normal equations in orthogonal-distance regression".to_string(),
        ));
    }

    let step = [
        (-gradient[0] * a11 + gradient[1] * a01) / det,
        (-gradient[1] * a00 + gradient[0] * a01) / det,
    ];
    if step.iter().any(|v| !v.is_finite()) {
        return Err(CohortError::FitError(
            "non-finite parameter update".to_string(),
        ));
    }
    Ok(step)
}
