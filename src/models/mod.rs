//! Per-column imputation models
//!
//! Each module pairs a fit function (run once per column at fit time) with
//! an impute function (run per transform on the missing rows only). The
//! fitted state is a closed enum so the orchestrator's dispatch is
//! exhaustive, and everything is serializable for inspection.

pub mod bayes_least_squares;
pub mod bayes_logistic;
pub mod least_squares;
pub mod logistic;
pub mod lrd;
pub mod pmm;
pub mod stochastic;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Fitted per-column model state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FittedParams {
    LeastSquares(least_squares::LinearFit),
    BinaryLogistic(logistic::BinaryLogisticFit),
    MultinomialLogistic(logistic::MultinomialLogisticFit),
    Stochastic(least_squares::LinearFit),
    BayesianLeastSquares(bayes_least_squares::BayesLinearFit),
    BayesianBinaryLogistic(bayes_logistic::BayesLogisticFit),
    Pmm(pmm::PmmFit),
    Lrd(pmm::PmmFit),
}

/// Imputed replacements for one column's missing rows, in row order
#[derive(Debug, Clone, PartialEq)]
pub enum ImputedValues {
    Numeric(Vec<f64>),
    Labels(Vec<String>),
}

/// Prepend an intercept column of ones to the feature matrix
pub(crate) fn with_intercept(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let p = x.ncols();
    let mut z = Array2::ones((n, p + 1));
    for i in 0..n {
        for j in 0..p {
            z[[i, j + 1]] = x[[i, j]];
        }
    }
    z
}

/// Indices of the k observed predictions closest to `pred`.
///
/// Ties break to the earlier row so the neighborhood is deterministic for a
/// given fit frame. k is clamped to the number of observed rows.
pub(crate) fn nearest_neighbors(pred: f64, y_pred_obs: &[f64], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..y_pred_obs.len()).collect();
    order.sort_by(|&a, &b| {
        let da = (y_pred_obs[a] - pred).abs();
        let db = (y_pred_obs[b] - pred).abs();
        da.partial_cmp(&db)
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });
    order.truncate(k.max(1).min(y_pred_obs.len()));
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_neighbors_ordering() {
        let preds = [1.0, 5.0, 2.0, 8.0];
        let nn = nearest_neighbors(1.9, &preds, 2);
        assert_eq!(nn, vec![2, 0]);
    }

    #[test]
    fn test_nearest_neighbors_tie_breaks_to_earlier_row() {
        let preds = [3.0, 1.0, 3.0];
        let nn = nearest_neighbors(3.0, &preds, 2);
        assert_eq!(nn, vec![0, 2]);
    }

    #[test]
    fn test_nearest_neighbors_clamps_k() {
        let preds = [1.0, 2.0];
        let nn = nearest_neighbors(0.0, &preds, 10);
        assert_eq!(nn.len(), 2);
    }

    #[test]
    fn test_with_intercept_shape() {
        let x = ndarray::array![[2.0], [3.0]];
        let z = with_intercept(&x);
        assert_eq!(z.shape(), &[2, 2]);
        assert_eq!(z[[0, 0]], 1.0);
        assert_eq!(z[[1, 1]], 3.0);
    }
}
