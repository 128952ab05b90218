//! Predictive imputer orchestration
//!
//! Ties the pieces together: configuration is normalized and validated
//! eagerly, every requested column is checked before any model is fit, and
//! transforms splice model output back into the frame null-by-null. All
//! predictor encoding during a transform reads from a snapshot taken before
//! any splicing, so mutually-predicting columns see the incoming frame, not
//! each other's fresh fills.

use crate::config::{FillPolicy, ImputerConfig};
use crate::error::{ImputeError, Result};
use crate::models::{
    bayes_least_squares, bayes_logistic, least_squares, logistic, lrd, pmm, stochastic,
    FittedParams, ImputedValues,
};
use crate::prepare::{column_kind, ColumnPreparer};
use crate::sampler::{McmcSampler, PosteriorSampler, PosteriorTrace};
use crate::strategy::{ColumnKind, Strategy};
use ndarray::Array1;
use polars::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Fitted state for one imputed column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnFit {
    /// Concrete strategy after default resolution
    pub strategy: Strategy,
    /// Predictor layout the model was fit with
    pub preparer: ColumnPreparer,
    /// Fitted model parameters
    pub params: FittedParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FitState {
    /// Frame columns in fit order
    columns: Vec<String>,
    /// Canonical predictor assignment per imputed column
    predictors: BTreeMap<String, Vec<String>>,
    /// Fitted models per imputed column
    stats: BTreeMap<String, ColumnFit>,
    /// Fill policy for sampling strategies
    fill: FillPolicy,
}

/// Multivariate predictive imputer over a polars DataFrame.
///
/// Each column with missing values gets its own regression model, fit on
/// the rows where that column is observed and using the other columns as
/// predictors. Fit and transform are separate so one fit can impute many
/// frames.
pub struct PredictiveImputer {
    config: ImputerConfig,
    sampler: Box<dyn PosteriorSampler>,
    fitted: Option<FitState>,
    imputed: BTreeMap<String, Vec<usize>>,
    traces: BTreeMap<String, PosteriorTrace>,
}

impl std::fmt::Debug for PredictiveImputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictiveImputer")
            .field("config", &self.config)
            .field("fitted", &self.fitted)
            .field("imputed", &self.imputed)
            .field("traces", &self.traces)
            .finish_non_exhaustive()
    }
}

impl Default for PredictiveImputer {
    fn default() -> Self {
        Self::new(ImputerConfig::default())
    }
}

impl PredictiveImputer {
    /// Create an imputer with the default MCMC sampling backend
    pub fn new(config: ImputerConfig) -> Self {
        Self {
            config,
            sampler: Box::new(McmcSampler),
            fitted: None,
            imputed: BTreeMap::new(),
            traces: BTreeMap::new(),
        }
    }

    /// Create an imputer with a custom posterior sampling backend
    pub fn with_sampler(config: ImputerConfig, sampler: Box<dyn PosteriorSampler>) -> Self {
        Self {
            config,
            sampler,
            fitted: None,
            imputed: BTreeMap::new(),
            traces: BTreeMap::new(),
        }
    }

    /// The configuration this imputer was built with
    pub fn config(&self) -> &ImputerConfig {
        &self.config
    }

    /// Fit one model per imputed column.
    ///
    /// All validation happens before any fitting: strategy and predictor
    /// normalization, column-kind compatibility, class counts for binary
    /// strategies, and the fill-value policy. A failure leaves the imputer
    /// unfitted. Returns `&mut Self` so a transform can chain directly.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        // A failed refit must not leave the previous models reachable
        self.fitted = None;
        self.imputed.clear();
        self.traces.clear();

        let columns: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        if columns.is_empty() {
            return Err(ImputeError::DataError("cannot fit on an empty frame".to_string()));
        }

        let fill = self.config.fill_policy()?;
        let assigned = self.config.strategy.normalize(&columns)?;

        // Validate every column up front, resolving defaults as we go
        let mut resolved: BTreeMap<String, Strategy> = BTreeMap::new();
        for name in &columns {
            let strategy = match assigned.get(name) {
                Some(s) => *s,
                None => continue,
            };
            if strategy == Strategy::None {
                continue;
            }

            let series = df.column(name)?.as_materialized_series();
            let kind = column_kind(name, series.dtype())?;
            if series.null_count() == series.len() {
                return Err(ImputeError::AllColumnsNull(name.clone()));
            }

            let n_classes = match kind {
                ColumnKind::Categorical => observed_class_count(series)?,
                ColumnKind::Numeric => 0,
            };
            let concrete = match strategy {
                Strategy::Default => Strategy::resolve_default(kind, n_classes),
                other => other,
            };
            if !concrete.is_compatible(kind) {
                return Err(ImputeError::StrategyMismatch {
                    column: name.clone(),
                    strategy: concrete.name().to_string(),
                    kind: kind.name().to_string(),
                });
            }
            if concrete.requires_binary_response() && n_classes != 2 {
                return Err(ImputeError::InvalidClassCount {
                    column: name.clone(),
                    observed: n_classes,
                });
            }
            resolved.insert(name.clone(), concrete);
        }

        let predictors = self
            .config
            .predictors
            .normalize(&columns, resolved.keys())?;

        let targets: Vec<(String, Strategy)> = columns
            .iter()
            .filter_map(|c| resolved.get(c).map(|s| (c.clone(), *s)))
            .collect();

        let fitted: Vec<(String, ColumnFit)> = if self.config.parallel {
            use rayon::prelude::*;
            targets
                .par_iter()
                .map(|(name, strategy)| {
                    let fit = fit_column(df, name, *strategy, &predictors[name], &self.config)?;
                    Ok((name.clone(), fit))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            targets
                .iter()
                .map(|(name, strategy)| {
                    let fit = fit_column(df, name, *strategy, &predictors[name], &self.config)?;
                    Ok((name.clone(), fit))
                })
                .collect::<Result<Vec<_>>>()?
        };

        if self.config.verbose {
            for (name, fit) in &fitted {
                tracing::info!(column = %name, strategy = %fit.strategy, "fitted column model");
            }
        }

        self.fitted = Some(FitState {
            columns,
            predictors,
            stats: fitted.into_iter().collect(),
            fill,
        });
        Ok(self)
    }

    /// Impute a copy of the frame, leaving the input untouched.
    ///
    /// `new_data` refits the scaler statistics on the incoming frame before
    /// encoding; pass false when transforming the fit frame itself.
    pub fn transform(&mut self, df: &DataFrame, new_data: bool) -> Result<DataFrame> {
        let mut out = df.clone();
        self.transform_inplace(&mut out, new_data)?;
        Ok(out)
    }

    /// Impute the frame in place
    pub fn transform_inplace(&mut self, df: &mut DataFrame, new_data: bool) -> Result<()> {
        let state = self.fitted.as_mut().ok_or(ImputeError::NotFitted)?;

        for name in &state.columns {
            if df.column(name).is_err() {
                return Err(ImputeError::SchemaMismatch(name.clone()));
            }
        }
        if new_data {
            for fit in state.stats.values_mut() {
                fit.preparer.refit_scale(df)?;
            }
        }

        let mut rng = match self.config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        // Predictor snapshot: encoding always reads pre-splice values
        let source = df.clone();
        self.imputed.clear();
        self.traces.clear();

        for name in &state.columns {
            let fit = match state.stats.get(name) {
                Some(f) => f,
                None => continue,
            };
            let series = df.column(name)?.as_materialized_series().clone();
            let rows = null_rows(&series);
            self.imputed.insert(name.clone(), rows.clone());
            if rows.is_empty() {
                continue;
            }

            let x_miss = fit.preparer.encode(&source, &rows)?;
            let (values, trace) = impute_column(
                fit,
                &x_miss,
                self.sampler.as_ref(),
                &self.config,
                state.fill,
                &mut rng,
            )?;
            if let Some(trace) = trace {
                self.traces.insert(name.clone(), trace);
            }
            if self.config.verbose {
                tracing::info!(column = %name, filled = rows.len(), "imputed column");
            }

            match values {
                ImputedValues::Numeric(vals) => splice_numeric(df, name, &rows, &vals)?,
                ImputedValues::Labels(vals) => splice_labels(df, name, &rows, &vals)?,
            }
        }
        Ok(())
    }

    /// Fit and impute in one call.
    ///
    /// With `copy` set (the default) the input is left untouched and the
    /// imputed frame is returned; otherwise the input is imputed in place
    /// and a cheap handle to it is returned.
    pub fn fit_transform(&mut self, df: &mut DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        if self.config.copy {
            self.transform(df, false)
        } else {
            self.transform_inplace(df, false)?;
            Ok(df.clone())
        }
    }

    /// Fitted per-column models, keyed by column name
    pub fn statistics(&self) -> Result<&BTreeMap<String, ColumnFit>> {
        self.fitted
            .as_ref()
            .map(|s| &s.stats)
            .ok_or(ImputeError::NotFitted)
    }

    /// Canonical predictor assignment resolved at fit time
    pub fn predictors(&self) -> Result<&BTreeMap<String, Vec<String>>> {
        self.fitted
            .as_ref()
            .map(|s| &s.predictors)
            .ok_or(ImputeError::NotFitted)
    }

    /// Row indices filled per column during the last transform
    pub fn imputed(&self) -> &BTreeMap<String, Vec<usize>> {
        &self.imputed
    }

    /// Posterior traces recorded per column during the last transform
    pub fn traces(&self) -> &BTreeMap<String, PosteriorTrace> {
        &self.traces
    }

    /// Whether `fit` has completed successfully
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

fn fit_column(
    df: &DataFrame,
    name: &str,
    strategy: Strategy,
    predictors: &[String],
    config: &ImputerConfig,
) -> Result<ColumnFit> {
    let preparer = ColumnPreparer::fit(df, predictors, config.scaler)?;
    let series = df.column(name)?.as_materialized_series();
    let obs_rows = observed_rows(series);
    let x = preparer.encode(df, &obs_rows)?;

    let params = match strategy {
        Strategy::LeastSquares => {
            FittedParams::LeastSquares(least_squares::fit(&x, &numeric_response(series, &obs_rows)?)?)
        }
        Strategy::Stochastic => {
            FittedParams::Stochastic(least_squares::fit(&x, &numeric_response(series, &obs_rows)?)?)
        }
        Strategy::BayesianLeastSquares => FittedParams::BayesianLeastSquares(
            bayes_least_squares::fit(&x, &numeric_response(series, &obs_rows)?)?,
        ),
        Strategy::Pmm => {
            FittedParams::Pmm(pmm::fit(&x, &numeric_response(series, &obs_rows)?)?)
        }
        Strategy::Lrd => {
            FittedParams::Lrd(pmm::fit(&x, &numeric_response(series, &obs_rows)?)?)
        }
        Strategy::BinaryLogistic => {
            FittedParams::BinaryLogistic(logistic::fit_binary(&x, &label_response(series, &obs_rows)?)?)
        }
        Strategy::MultinomialLogistic => FittedParams::MultinomialLogistic(
            logistic::fit_multinomial(&x, &label_response(series, &obs_rows)?)?,
        ),
        Strategy::BayesianBinaryLogistic => FittedParams::BayesianBinaryLogistic(
            bayes_logistic::fit(&x, &label_response(series, &obs_rows)?)?,
        ),
        Strategy::Default | Strategy::None => {
            return Err(ImputeError::InvalidConfig(format!(
                "strategy '{strategy}' reached the fit stage unresolved"
            )))
        }
    };

    Ok(ColumnFit {
        strategy,
        preparer,
        params,
    })
}

fn impute_column(
    fit: &ColumnFit,
    x_miss: &ndarray::Array2<f64>,
    sampler: &dyn PosteriorSampler,
    config: &ImputerConfig,
    fill: FillPolicy,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<(ImputedValues, Option<PosteriorTrace>)> {
    let out = match &fit.params {
        FittedParams::LeastSquares(f) => {
            (ImputedValues::Numeric(least_squares::impute(f, x_miss)), None)
        }
        FittedParams::Stochastic(f) => (
            ImputedValues::Numeric(stochastic::impute(f, x_miss, rng)?),
            None,
        ),
        FittedParams::BinaryLogistic(f) => {
            (ImputedValues::Labels(logistic::impute_binary(f, x_miss)), None)
        }
        FittedParams::MultinomialLogistic(f) => (
            ImputedValues::Labels(logistic::impute_multinomial(f, x_miss)),
            None,
        ),
        FittedParams::BayesianLeastSquares(f) => {
            let (vals, trace) = bayes_least_squares::impute(
                f,
                x_miss,
                sampler,
                config.samples,
                config.burn_in,
                fill,
                rng,
            )?;
            (ImputedValues::Numeric(vals), Some(trace))
        }
        FittedParams::BayesianBinaryLogistic(f) => {
            let (vals, trace) = bayes_logistic::impute(
                f,
                x_miss,
                sampler,
                config.samples,
                config.burn_in,
                fill,
                rng,
            )?;
            (ImputedValues::Labels(vals), Some(trace))
        }
        FittedParams::Pmm(f) => {
            let (vals, trace) = pmm::impute(
                f,
                x_miss,
                sampler,
                config.samples,
                config.burn_in,
                config.neighbors,
                fill,
                rng,
            )?;
            (ImputedValues::Numeric(vals), Some(trace))
        }
        FittedParams::Lrd(f) => {
            let (vals, trace) = lrd::impute(
                f,
                x_miss,
                sampler,
                config.samples,
                config.burn_in,
                config.neighbors,
                fill,
                rng,
            )?;
            (ImputedValues::Numeric(vals), Some(trace))
        }
    };
    Ok(out)
}

fn null_rows(series: &Series) -> Vec<usize> {
    series
        .is_null()
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| if v.unwrap_or(false) { Some(i) } else { None })
        .collect()
}

fn observed_rows(series: &Series) -> Vec<usize> {
    series
        .is_not_null()
        .into_iter()
        .enumerate()
        .filter_map(|(i, v)| if v.unwrap_or(false) { Some(i) } else { None })
        .collect()
}

fn observed_class_count(series: &Series) -> Result<usize> {
    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;
    let classes: BTreeSet<&str> = ca.into_iter().flatten().collect();
    Ok(classes.len())
}

fn numeric_response(series: &Series, rows: &[usize]) -> Result<Array1<f64>> {
    let casted = series.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    let mut out = Vec::with_capacity(rows.len());
    for &row in rows {
        let v = ca.get(row).ok_or_else(|| {
            ImputeError::DataError(format!("unexpected null at row {row} in '{}'", series.name()))
        })?;
        out.push(v);
    }
    Ok(Array1::from_vec(out))
}

fn label_response(series: &Series, rows: &[usize]) -> Result<Vec<String>> {
    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;
    let mut out = Vec::with_capacity(rows.len());
    for &row in rows {
        let v = ca.get(row).ok_or_else(|| {
            ImputeError::DataError(format!("unexpected null at row {row} in '{}'", series.name()))
        })?;
        out.push(v.to_string());
    }
    Ok(out)
}

/// Splice fills into the null rows, keeping the column's dtype. Integer
/// columns splice in their native representation with rounded fills, so
/// observed cells never pass through a lossy float cast.
fn splice_numeric(df: &mut DataFrame, name: &str, rows: &[usize], values: &[f64]) -> Result<()> {
    let series = df.column(name)?.as_materialized_series().clone();
    let dtype = series.dtype().clone();

    let spliced = if dtype.is_integer() {
        let casted = series.cast(&DataType::Int64)?;
        let ca = casted.i64()?;
        let mut out: Vec<Option<i64>> = ca.into_iter().collect();
        for (k, &row) in rows.iter().enumerate() {
            out[row] = Some(values[k].round() as i64);
        }
        Series::new(name.into(), out).cast(&dtype)?
    } else {
        let casted = series.cast(&DataType::Float64)?;
        let ca = casted.f64()?;
        let mut out: Vec<Option<f64>> = ca.into_iter().collect();
        for (k, &row) in rows.iter().enumerate() {
            out[row] = Some(values[k]);
        }
        Series::new(name.into(), out).cast(&dtype)?
    };
    df.with_column(spliced)?;
    Ok(())
}

fn splice_labels(df: &mut DataFrame, name: &str, rows: &[usize], values: &[String]) -> Result<()> {
    let series = df.column(name)?.as_materialized_series().clone();
    let dtype = series.dtype().clone();

    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;
    let mut out: Vec<Option<String>> = ca
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    for (k, &row) in rows.iter().enumerate() {
        out[row] = Some(values[k].clone());
    }
    let spliced = Series::new(name.into(), out);
    let spliced = if dtype == DataType::String {
        spliced
    } else {
        spliced.cast(&dtype)?
    };
    df.with_column(spliced)?;
    Ok(())
}
