//! Logistic regression imputation for categorical columns
//!
//! Binary columns use a sigmoid model, wider columns a softmax model. Both
//! are fit by gradient descent with a small L2 penalty on the coefficients
//! (never the intercept). Imputation is deterministic: the most probable
//! class wins, ties breaking to the lexicographically smaller label.

use crate::error::{ImputeError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const LEARNING_RATE: f64 = 0.1;
const L2_ALPHA: f64 = 0.01;
const MAX_ITER: usize = 1000;
const TOLERANCE: f64 = 1e-6;

/// Fitted binary logistic regression. `classes[1]` is the positive class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryLogisticFit {
    pub classes: [String; 2],
    pub intercept: f64,
    pub coefficients: Array1<f64>,
}

/// Fitted softmax regression, one weight row per class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultinomialLogisticFit {
    pub classes: Vec<String>,
    /// Per-class intercepts
    pub intercept: Array1<f64>,
    /// Class x feature coefficient matrix
    pub coefficients: Array2<f64>,
}

fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

/// Sorted distinct labels observed in the response
pub(crate) fn observed_classes(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Fit a binary logistic regression. The response must carry exactly two
/// distinct labels; the sorted-second label is treated as positive.
pub fn fit_binary(x: &Array2<f64>, labels: &[String]) -> Result<BinaryLogisticFit> {
    let classes = observed_classes(labels);
    if classes.len() != 2 {
        return Err(ImputeError::ComputationError(format!(
            "binary logistic fit needs 2 classes, found {}",
            classes.len()
        )));
    }
    let n = x.nrows();
    if n != labels.len() {
        return Err(ImputeError::ShapeError {
            expected: format!("{n} labels"),
            actual: labels.len().to_string(),
        });
    }

    let positive = &classes[1];
    let y: Array1<f64> = labels
        .iter()
        .map(|l| if l == positive { 1.0 } else { 0.0 })
        .collect();

    let z = super::with_intercept(x);
    let m = z.ncols();
    let mut w: Array1<f64> = Array1::zeros(m);

    for _ in 0..MAX_ITER {
        let p_hat = z.dot(&w).mapv(sigmoid);
        let err = &p_hat - &y;
        let mut grad = z.t().dot(&err) / n as f64;
        for j in 1..m {
            grad[j] += L2_ALPHA * w[j] / n as f64;
        }
        let norm = grad.dot(&grad).sqrt();
        w -= &(grad * LEARNING_RATE);
        if norm < TOLERANCE {
            break;
        }
    }

    Ok(BinaryLogisticFit {
        classes: [classes[0].clone(), classes[1].clone()],
        intercept: w[0],
        coefficients: w.slice(ndarray::s![1..]).to_owned(),
    })
}

/// Positive-class probabilities for the given feature rows
pub fn predict_proba_binary(fit: &BinaryLogisticFit, x: &Array2<f64>) -> Array1<f64> {
    (x.dot(&fit.coefficients) + fit.intercept).mapv(sigmoid)
}

/// Impute missing rows with the most probable class
pub fn impute_binary(fit: &BinaryLogisticFit, x_miss: &Array2<f64>) -> Vec<String> {
    predict_proba_binary(fit, x_miss)
        .iter()
        .map(|&p| {
            if p >= 0.5 {
                fit.classes[1].clone()
            } else {
                fit.classes[0].clone()
            }
        })
        .collect()
}

/// Fit a softmax regression over however many labels are observed
pub fn fit_multinomial(x: &Array2<f64>, labels: &[String]) -> Result<MultinomialLogisticFit> {
    let classes = observed_classes(labels);
    let k = classes.len();
    if k < 2 {
        return Err(ImputeError::ComputationError(format!(
            "multinomial logistic fit needs at least 2 classes, found {k}"
        )));
    }
    let n = x.nrows();
    if n != labels.len() {
        return Err(ImputeError::ShapeError {
            expected: format!("{n} labels"),
            actual: labels.len().to_string(),
        });
    }

    let mut y_onehot = Array2::zeros((n, k));
    for (i, label) in labels.iter().enumerate() {
        // observed_classes came from labels, so position lookup cannot fail
        if let Some(c) = classes.iter().position(|cl| cl == label) {
            y_onehot[[i, c]] = 1.0;
        }
    }

    let z = super::with_intercept(x);
    let m = z.ncols();
    let mut w: Array2<f64> = Array2::zeros((k, m));

    for _ in 0..MAX_ITER {
        let probs = softmax_rows(&z.dot(&w.t()));
        let mut grad = (&probs - &y_onehot).t().dot(&z) / n as f64;
        for c in 0..k {
            for j in 1..m {
                grad[[c, j]] += L2_ALPHA * w[[c, j]] / n as f64;
            }
        }
        let norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();
        w -= &(grad * LEARNING_RATE);
        if norm < TOLERANCE {
            break;
        }
    }

    Ok(MultinomialLogisticFit {
        classes,
        intercept: w.column(0).to_owned(),
        coefficients: w.slice(ndarray::s![.., 1..]).to_owned(),
    })
}

/// Row-wise class probabilities
pub fn predict_proba_multinomial(fit: &MultinomialLogisticFit, x: &Array2<f64>) -> Array2<f64> {
    let logits = x.dot(&fit.coefficients.t()) + &fit.intercept;
    softmax_rows(&logits)
}

/// Impute missing rows with the most probable class
pub fn impute_multinomial(fit: &MultinomialLogisticFit, x_miss: &Array2<f64>) -> Vec<String> {
    let probs = predict_proba_multinomial(fit, x_miss);
    probs
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0;
            for (c, p) in row.iter().enumerate() {
                if *p > row[best] {
                    best = c;
                }
            }
            fit.classes[best].clone()
        })
        .collect()
}

fn softmax_rows(logits: &Array2<f64>) -> Array2<f64> {
    let mut out = logits.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_binary_separable() {
        let x = array![[0.0], [1.0], [2.0], [5.0], [6.0], [7.0]];
        let y = labels(&["no", "no", "no", "yes", "yes", "yes"]);
        let fit = fit_binary(&x, &y).unwrap();

        assert_eq!(fit.classes, ["no".to_string(), "yes".to_string()]);
        let imputed = impute_binary(&fit, &array![[0.5], [6.5]]);
        assert_eq!(imputed, labels(&["no", "yes"]));
    }

    #[test]
    fn test_binary_rejects_one_class() {
        let x = array![[0.0], [1.0]];
        let y = labels(&["a", "a"]);
        assert!(fit_binary(&x, &y).is_err());
    }

    #[test]
    fn test_multinomial_three_classes() {
        let x = array![
            [0.0],
            [0.5],
            [1.0],
            [5.0],
            [5.5],
            [6.0],
            [10.0],
            [10.5],
            [11.0]
        ];
        let y = labels(&["low", "low", "low", "mid", "mid", "mid", "high", "high", "high"]);
        let fit = fit_multinomial(&x, &y).unwrap();

        assert_eq!(fit.classes.len(), 3);
        let imputed = impute_multinomial(&fit, &array![[0.2], [5.3], [10.8]]);
        assert_eq!(imputed, labels(&["low", "mid", "high"]));
    }

    #[test]
    fn test_multinomial_probabilities_sum_to_one() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = labels(&["a", "a", "b", "b"]);
        let fit = fit_multinomial(&x, &y).unwrap();
        let probs = predict_proba_multinomial(&fit, &array![[1.5]]);
        let total: f64 = probs.row(0).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }
}
