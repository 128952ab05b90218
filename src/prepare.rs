//! Per-column predictor preparation
//!
//! For each target column the preparer resolves its predictor matrix:
//! numeric predictors pass through (optionally scaled), categorical
//! predictors are one-hot encoded with category maps learned at fit time.
//! Missing covariate cells are filled with a deterministic univariate
//! fallback (fit-time mean for numeric, fit-time mode for categorical)
//! before use, so mutually-predicting columns never recurse.

use crate::config::ScalerType;
use crate::error::{ImputeError, Result};
use crate::strategy::ColumnKind;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Infer the kind of a column from its dtype
pub(crate) fn column_kind(name: &str, dtype: &DataType) -> Result<ColumnKind> {
    if dtype.is_primitive_numeric() {
        Ok(ColumnKind::Numeric)
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        Ok(ColumnKind::Categorical)
    } else {
        Err(ImputeError::DataError(format!(
            "column '{name}' has unsupported dtype {dtype:?}"
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NumericPredictor {
    name: String,
    /// Fallback fill for missing covariate cells (fit-time mean)
    fill: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CategoricalPredictor {
    name: String,
    /// Categories observed at fit, sorted; one dummy column each
    categories: Vec<String>,
    /// Fallback fill for missing covariate cells (fit-time mode)
    fill: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ScaleParams {
    center: f64,
    scale: f64,
}

/// Fitted predictor layout for one target column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnPreparer {
    numeric: Vec<NumericPredictor>,
    categorical: Vec<CategoricalPredictor>,
    scaler: ScalerType,
    /// Scale parameters per numeric predictor, empty when scaler is None
    scale_params: Vec<ScaleParams>,
}

impl ColumnPreparer {
    /// Learn the predictor layout from the fit frame
    pub fn fit(df: &DataFrame, predictors: &[String], scaler: ScalerType) -> Result<Self> {
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();

        for name in predictors {
            let column = df
                .column(name)
                .map_err(|_| ImputeError::SchemaMismatch(name.clone()))?;
            let series = column.as_materialized_series();

            match column_kind(name, series.dtype())? {
                ColumnKind::Numeric => {
                    let casted = series.cast(&DataType::Float64)?;
                    let ca = casted.f64()?;
                    numeric.push(NumericPredictor {
                        name: name.clone(),
                        fill: ca.mean().unwrap_or(0.0),
                    });
                }
                ColumnKind::Categorical => {
                    let casted = series.cast(&DataType::String)?;
                    let ca = casted.str()?;
                    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
                    for val in ca.into_iter().flatten() {
                        *counts.entry(val.to_string()).or_insert(0) += 1;
                    }
                    // Mode; ties break to the lexicographically smallest
                    let fill = counts
                        .iter()
                        .max_by_key(|(_, count)| *count)
                        .map(|(k, _)| k.clone())
                        .unwrap_or_default();
                    categorical.push(CategoricalPredictor {
                        name: name.clone(),
                        categories: counts.into_keys().collect(),
                        fill,
                    });
                }
            }
        }

        let mut preparer = Self {
            numeric,
            categorical,
            scaler,
            scale_params: Vec::new(),
        };
        preparer.refit_scale(df)?;
        Ok(preparer)
    }

    /// Number of features in the encoded matrix
    pub fn n_features(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    /// Names of the predictor columns this layout was fit on
    pub fn predictor_names(&self) -> Vec<&str> {
        self.numeric
            .iter()
            .map(|p| p.name.as_str())
            .chain(self.categorical.iter().map(|p| p.name.as_str()))
            .collect()
    }

    /// Recompute scaler statistics on the full prepared predictor matrix
    /// of the given frame. No-op without a scaler.
    pub fn refit_scale(&mut self, df: &DataFrame) -> Result<()> {
        if self.scaler == ScalerType::None {
            self.scale_params.clear();
            return Ok(());
        }
        let mut params = Vec::with_capacity(self.numeric.len());
        for pred in &self.numeric {
            let column = df
                .column(&pred.name)
                .map_err(|_| ImputeError::SchemaMismatch(pred.name.clone()))?;
            let casted = column.as_materialized_series().cast(&DataType::Float64)?;
            let ca = casted.f64()?;
            let values: Vec<f64> = ca
                .into_iter()
                .map(|v| v.unwrap_or(pred.fill))
                .collect();
            params.push(compute_scale(&values, self.scaler));
        }
        self.scale_params = params;
        Ok(())
    }

    /// Encode the given rows into a dense predictor matrix, filling missing
    /// covariates with the fit-time fallback. Unseen categories encode to
    /// all zeros. Fails with `SchemaMismatch` when a predictor is absent.
    pub fn encode(&self, df: &DataFrame, rows: &[usize]) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((rows.len(), self.n_features()));
        let mut feature = 0;

        for (k, pred) in self.numeric.iter().enumerate() {
            let column = df
                .column(&pred.name)
                .map_err(|_| ImputeError::SchemaMismatch(pred.name.clone()))?;
            let casted = column.as_materialized_series().cast(&DataType::Float64)?;
            let ca = casted.f64()?;
            for (r, &row) in rows.iter().enumerate() {
                let mut v = ca.get(row).unwrap_or(pred.fill);
                if let Some(p) = self.scale_params.get(k) {
                    v = (v - p.center) / p.scale;
                }
                out[[r, feature]] = v;
            }
            feature += 1;
        }

        for pred in &self.categorical {
            let column = df
                .column(&pred.name)
                .map_err(|_| ImputeError::SchemaMismatch(pred.name.clone()))?;
            let casted = column.as_materialized_series().cast(&DataType::String)?;
            let ca = casted.str()?;
            for (r, &row) in rows.iter().enumerate() {
                let val = ca.get(row).unwrap_or(pred.fill.as_str());
                for (c, category) in pred.categories.iter().enumerate() {
                    if val == category {
                        out[[r, feature + c]] = 1.0;
                    }
                }
            }
            feature += pred.categories.len();
        }

        Ok(out)
    }
}

fn compute_scale(values: &[f64], scaler: ScalerType) -> ScaleParams {
    match scaler {
        ScalerType::Standard => {
            let n = values.len().max(1) as f64;
            let mean = values.iter().sum::<f64>() / n;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / (values.len().saturating_sub(1)).max(1) as f64;
            let std = var.sqrt();
            ScaleParams {
                center: mean,
                scale: if std == 0.0 { 1.0 } else { std },
            }
        }
        ScalerType::MinMax => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            ScaleParams {
                center: if min.is_finite() { min } else { 0.0 },
                scale: if range.is_finite() && range != 0.0 {
                    range
                } else {
                    1.0
                },
            }
        }
        ScalerType::None => ScaleParams {
            center: 0.0,
            scale: 1.0,
        },
    }
}
