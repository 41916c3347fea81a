//! Error-function edge model fitted with Levenberg–Marquardt.
//!
//! A Gaussian point spread function blurs an ideal step into
//! `low + (high - low) · Φ((d - μ) / σ)`, where `Φ` is the standard normal CDF.

use levenberg_marquardt::{LeastSquaresProblem, LevenbergMarquardt};
use log::{debug, warn};
use nalgebra::{storage::Owned, DMatrix, DVector, Dyn};
use serde::{Deserialize, Serialize};

use super::EsfError;
use crate::util::{normal_cdf, normal_pdf};

const MAX_EVALUATIONS: usize = 200;

/// Fitted parameters of the error-function edge model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianEsfFit {
    /// Plateau for `d → -∞`.
    pub low: f64,
    /// Plateau for `d → +∞`.
    pub high: f64,
    /// Edge position along the normal.
    pub mu: f64,
    /// Standard deviation of the Gaussian PSF, in pixels.
    pub sigma: f64,
    /// Root-mean-square residual of the fit.
    pub rms_residual: f64,
    /// Number of residual evaluations the solver used.
    pub evaluations: usize,
}

impl GaussianEsfFit {
    /// Fits the model to `(distance, value)` samples.
    ///
    /// # Errors
    ///
    /// * `EsfError::InvalidParams` if the slices differ in length
    /// * `EsfError::InsufficientSamples` for fewer than 4 samples or flat data
    pub fn fit(distances: &[f64], values: &[f64]) -> Result<Self, EsfError> {
        if distances.len() != values.len() {
            return Err(EsfError::InvalidParams(format!(
                "got {} distances but {} values",
                distances.len(),
                values.len()
            )));
        }
        if distances.len() < 4 {
            return Err(EsfError::InsufficientSamples(format!(
                "fitting an edge needs at least 4 samples, got {}",
                distances.len()
            )));
        }

        let x0 = initial_guess(distances, values)?;
        let problem = ErfEdgeProblem {
            distances,
            values,
            params: x0,
        };
        let (problem, report) = LevenbergMarquardt::new()
            .with_patience(MAX_EVALUATIONS)
            .minimize(problem);

        let p = problem.params;
        if p.iter().any(|v| !v.is_finite()) {
            return Err(EsfError::InvalidParams(
                "edge fit diverged to non-finite parameters".to_string(),
            ));
        }
        if !report.termination.was_successful() {
            warn!("edge fit stopped early: {:?}", report.termination);
        }

        // objective_function is half the sum of squared residuals.
        let rms_residual = (2.0 * report.objective_function / distances.len() as f64).sqrt();
        let fit = GaussianEsfFit {
            low: p[0],
            high: p[1],
            mu: p[2],
            sigma: p[3].exp(),
            rms_residual,
            evaluations: report.number_of_evaluations,
        };
        debug!("edge fit {fit:?}");
        Ok(fit)
    }

    /// Fitted edge response at signed distance `d`.
    pub fn eval(&self, d: f64) -> f64 {
        self.low + (self.high - self.low) * normal_cdf((d - self.mu) / self.sigma)
    }

    /// Derivative of [`eval`](Self::eval): the fitted line spread function.
    pub fn lsf(&self, d: f64) -> f64 {
        (self.high - self.low) * normal_pdf((d - self.mu) / self.sigma) / self.sigma
    }
}

fn initial_guess(distances: &[f64], values: &[f64]) -> Result<DVector<f64>, EsfError> {
    let n = values.len();
    let k = (n / 10).max(1);
    let low = values[..k].iter().sum::<f64>() / k as f64;
    let high = values[n - k..].iter().sum::<f64>() / k as f64;
    if (high - low).abs() < 1e-9 {
        return Err(EsfError::InsufficientSamples(
            "edge response is flat, nothing to fit".to_string(),
        ));
    }

    let mid = 0.5 * (low + high);
    let mu = values
        .windows(2)
        .position(|w| (w[0] - mid) * (w[1] - mid) <= 0.0)
        .map(|i| 0.5 * (distances[i] + distances[i + 1]))
        .unwrap_or(0.0);

    Ok(DVector::from_vec(vec![low, high, mu, 0.0]))
}

/// Residuals `model(d_i) - v_i` over parameters `[low, high, mu, ln(sigma)]`.
struct ErfEdgeProblem<'a> {
    distances: &'a [f64],
    values: &'a [f64],
    params: DVector<f64>,
}

impl LeastSquaresProblem<f64, Dyn, Dyn> for ErfEdgeProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, Dyn>;
    type ParameterStorage = Owned<f64, Dyn>;

    fn set_params(&mut self, x: &DVector<f64>) {
        self.params.clone_from(x);
    }

    fn params(&self) -> DVector<f64> {
        self.params.clone()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let (low, high, mu, sigma) = self.unpack()?;
        Some(DVector::from_iterator(
            self.distances.len(),
            self.distances
                .iter()
                .zip(self.values)
                .map(|(d, v)| low + (high - low) * normal_cdf((d - mu) / sigma) - v),
        ))
    }

    fn jacobian(&self) -> Option<DMatrix<f64>> {
        let (low, high, mu, sigma) = self.unpack()?;
        let mut jac = DMatrix::zeros(self.distances.len(), 4);
        for (i, d) in self.distances.iter().enumerate() {
            let z = (d - mu) / sigma;
            let cdf = normal_cdf(z);
            let pdf = normal_pdf(z);
            jac[(i, 0)] = 1.0 - cdf;
            jac[(i, 1)] = cdf;
            jac[(i, 2)] = -(high - low) * pdf / sigma;
            jac[(i, 3)] = -(high - low) * pdf * z;
        }
        Some(jac)
    }
}

impl ErfEdgeProblem<'_> {
    fn unpack(&self) -> Option<(f64, f64, f64, f64)> {
        let sigma = self.params[3].exp();
        if !sigma.is_finite() || sigma <= 0.0 {
            return None;
        }
        Some((self.params[0], self.params[1], self.params[2], sigma))
    }
}
