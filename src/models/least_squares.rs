//! Ordinary least squares imputation
//!
//! The workhorse model: missing numeric cells are replaced with point
//! predictions from a linear regression of the column on its prepared
//! predictors. Also the base for the stochastic, Bayesian, PMM and LRD
//! strategies, which all start from these point estimates.

use crate::error::{ImputeError, Result};
use crate::linalg;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Fitted linear regression for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearFit {
    pub intercept: f64,
    pub coefficients: Array1<f64>,
    /// Mean squared error on the fit rows
    pub mse: f64,
    /// Observed rows the model was fit on
    pub n_obs: usize,
}

/// Fit a linear regression of y on x via the normal equations
pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<LinearFit> {
    let n = x.nrows();
    if n == 0 || n != y.len() {
        return Err(ImputeError::ShapeError {
            expected: format!("{n} response values"),
            actual: y.len().to_string(),
        });
    }

    let z = super::with_intercept(x);
    let w = linalg::solve_normal_equations(&z, y).ok_or_else(|| {
        ImputeError::ComputationError("least squares system is singular".to_string())
    })?;

    let intercept = w[0];
    let coefficients = w.slice(ndarray::s![1..]).to_owned();

    let fitted = z.dot(&w);
    let mse = (y - &fitted).mapv(|r| r * r).sum() / n as f64;

    Ok(LinearFit {
        intercept,
        coefficients,
        mse,
        n_obs: n,
    })
}

/// Point predictions for the given feature rows
pub fn predict(fit: &LinearFit, x: &Array2<f64>) -> Array1<f64> {
    x.dot(&fit.coefficients) + fit.intercept
}

/// Impute missing rows with point predictions
pub fn impute(fit: &LinearFit, x_miss: &Array2<f64>) -> Vec<f64> {
    predict(fit, x_miss).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_recovers_exact_line() {
        // y = 1 + 2x
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![1.0, 3.0, 5.0, 7.0];
        let fit = fit(&x, &y).unwrap();

        assert!((fit.intercept - 1.0).abs() < 1e-9);
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-9);
        assert!(fit.mse < 1e-9);
        assert_eq!(fit.n_obs, 4);
    }

    #[test]
    fn test_predict_new_rows() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![0.0, 2.0, 4.0];
        let model = fit(&x, &y).unwrap();

        let preds = impute(&model, &array![[5.0]]);
        assert!((preds[0] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let x = array![[1.0], [2.0]];
        let y = array![1.0];
        assert!(matches!(
            fit(&x, &y).unwrap_err(),
            ImputeError::ShapeError { .. }
        ));
    }

    #[test]
    fn test_mse_positive_with_noise() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![0.1, 1.9, 4.2, 5.8];
        let model = fit(&x, &y).unwrap();
        assert!(model.mse > 0.0);
    }
}
