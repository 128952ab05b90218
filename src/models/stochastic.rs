//! Stochastic linear imputation
//!
//! Least-squares point predictions plus Gaussian noise whose standard
//! deviation is the mean squared error of the fit, so repeated transforms
//! of the same frame spread the fills instead of collapsing them onto the
//! regression line.

use super::least_squares::{self, LinearFit};
use crate::error::{ImputeError, Result};
use ndarray::Array2;
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Impute missing rows with noisy point predictions. Falls back to the
/// plain prediction when the fit was exact (zero residual scale).
pub fn impute<R: Rng>(fit: &LinearFit, x_miss: &Array2<f64>, rng: &mut R) -> Result<Vec<f64>> {
    let preds = least_squares::predict(fit, x_miss);
    if fit.mse <= 0.0 || !fit.mse.is_finite() {
        return Ok(preds.to_vec());
    }
    let noise = Normal::new(0.0, fit.mse)
        .map_err(|e| ImputeError::ComputationError(format!("invalid noise scale: {e}")))?;
    Ok(preds.iter().map(|p| p + noise.sample(rng)).collect())
}
