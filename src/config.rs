//! Imputer configuration and boundary normalization
//!
//! Strategy and predictor assignments accept three shapes (uniform value,
//! positional list, per-column map). They are normalized into canonical
//! per-column maps at fit time; malformed shapes are rejected with a single
//! `InvalidConfig` error kind rather than threading unions through the core.

use crate::error::{ImputeError, Result};
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Strategy assignment: one for all columns, one per column by position,
/// or an explicit column -> strategy map (columns absent from the map are
/// left untouched).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StrategySpec {
    Uniform(String),
    PerColumn(Vec<String>),
    Named(HashMap<String, String>),
}

impl Default for StrategySpec {
    fn default() -> Self {
        StrategySpec::Uniform("default".to_string())
    }
}

impl StrategySpec {
    /// Normalize into a canonical column -> strategy map
    pub fn normalize(&self, columns: &[String]) -> Result<BTreeMap<String, Strategy>> {
        match self {
            StrategySpec::Uniform(name) => {
                let strategy = Strategy::parse(name)?;
                Ok(columns
                    .iter()
                    .map(|c| (c.clone(), strategy))
                    .collect())
            }
            StrategySpec::PerColumn(names) => {
                if names.len() != columns.len() {
                    return Err(ImputeError::InvalidConfig(format!(
                        "strategy list has {} entries but the frame has {} columns",
                        names.len(),
                        columns.len()
                    )));
                }
                columns
                    .iter()
                    .zip(names.iter())
                    .map(|(c, n)| Ok((c.clone(), Strategy::parse(n)?)))
                    .collect()
            }
            StrategySpec::Named(map) => {
                let mut out = BTreeMap::new();
                for (col, name) in map {
                    if !columns.contains(col) {
                        return Err(ImputeError::InvalidConfig(format!(
                            "strategy assigned to unknown column '{col}'"
                        )));
                    }
                    out.insert(col.clone(), Strategy::parse(name)?);
                }
                Ok(out)
            }
        }
    }
}

/// Predictor assignment: all other columns, a shared subset, or an explicit
/// column -> predictors map (columns absent from the map get all others).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PredictorSpec {
    #[default]
    All,
    List(Vec<String>),
    Named(HashMap<String, Vec<String>>),
}

impl PredictorSpec {
    /// Normalize into a canonical column -> predictor-list map for the given
    /// target columns. A target is always excluded from its own predictors.
    pub fn normalize<'a>(
        &self,
        columns: &[String],
        targets: impl Iterator<Item = &'a String>,
    ) -> Result<BTreeMap<String, Vec<String>>> {
        let mut out = BTreeMap::new();
        for target in targets {
            let preds: Vec<String> = match self {
                PredictorSpec::All => columns
                    .iter()
                    .filter(|c| *c != target)
                    .cloned()
                    .collect(),
                PredictorSpec::List(list) => {
                    Self::check_known(list, columns)?;
                    list.iter().filter(|c| *c != target).cloned().collect()
                }
                PredictorSpec::Named(map) => match map.get(target) {
                    Some(list) => {
                        Self::check_known(list, columns)?;
                        list.iter().filter(|c| *c != target).cloned().collect()
                    }
                    None => columns
                        .iter()
                        .filter(|c| *c != target)
                        .cloned()
                        .collect(),
                },
            };
            if preds.is_empty() {
                return Err(ImputeError::InvalidConfig(format!(
                    "column '{target}' has no predictors after excluding itself"
                )));
            }
            out.insert(target.clone(), preds);
        }
        Ok(out)
    }

    fn check_known(list: &[String], columns: &[String]) -> Result<()> {
        for name in list {
            if !columns.contains(name) {
                return Err(ImputeError::InvalidConfig(format!(
                    "unknown predictor column '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Fill policy for sampling strategies (Bayesian, PMM, LRD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPolicy {
    /// Posterior-mean prediction / mean of neighbor values
    Mean,
    /// One random posterior draw / random neighbor pick
    Random,
}

impl FillPolicy {
    /// Parse a fill-value string; anything but "mean" or "random" is rejected
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "mean" => Ok(FillPolicy::Mean),
            "random" => Ok(FillPolicy::Random),
            other => Err(ImputeError::InvalidFillValue(other.to_string())),
        }
    }
}

/// Feature scaler applied to the prepared numeric predictor matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling: (x - mean) / std
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
    /// No scaling
    #[default]
    None,
}

/// Configuration for the predictive imputer.
///
/// Everything here is validated eagerly at fit time, before any per-column
/// fitting work begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImputerConfig {
    /// Strategy assignment
    pub strategy: StrategySpec,
    /// Predictor assignment
    pub predictors: PredictorSpec,
    /// Fill-value policy for sampling strategies ("mean" or "random")
    pub fill_value: Option<String>,
    /// Operate on a working copy in `fit_transform` (vs in place)
    pub copy: bool,
    /// Optional scaler for numeric predictor features
    pub scaler: ScalerType,
    /// Neighbor count for PMM/LRD
    pub neighbors: usize,
    /// Retained posterior samples per chain
    pub samples: usize,
    /// Burn-in draws discarded before retaining samples
    pub burn_in: usize,
    /// RNG seed for reproducible sampling
    pub seed: Option<u64>,
    /// Fit columns across a rayon pool (results are order-insensitive)
    pub parallel: bool,
    /// Emit per-column diagnostics via tracing
    pub verbose: bool,
}

impl Default for ImputerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategySpec::default(),
            predictors: PredictorSpec::All,
            fill_value: None,
            copy: true,
            scaler: ScalerType::None,
            neighbors: 5,
            samples: 1000,
            burn_in: 1000,
            seed: None,
            parallel: false,
            verbose: false,
        }
    }
}

impl ImputerConfig {
    /// Create a default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy assignment
    pub fn with_strategy(mut self, strategy: StrategySpec) -> Self {
        self.strategy = strategy;
        self
    }

    /// Broadcast a single strategy name to every column
    pub fn with_uniform_strategy(mut self, name: &str) -> Self {
        self.strategy = StrategySpec::Uniform(name.to_string());
        self
    }

    /// Assign strategies per column by name
    pub fn with_named_strategies<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.strategy = StrategySpec::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Set the predictor assignment
    pub fn with_predictors(mut self, predictors: PredictorSpec) -> Self {
        self.predictors = predictors;
        self
    }

    /// Set the fill-value policy string
    pub fn with_fill_value(mut self, value: &str) -> Self {
        self.fill_value = Some(value.to_string());
        self
    }

    /// Enable or disable the working copy in `fit_transform`
    pub fn with_copy(mut self, copy: bool) -> Self {
        self.copy = copy;
        self
    }

    /// Set the predictor-matrix scaler
    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    /// Set the PMM/LRD neighbor count
    pub fn with_neighbors(mut self, n: usize) -> Self {
        self.neighbors = n.max(1);
        self
    }

    /// Set retained posterior samples per chain
    pub fn with_samples(mut self, n: usize) -> Self {
        self.samples = n.max(1);
        self
    }

    /// Set burn-in draws
    pub fn with_burn_in(mut self, n: usize) -> Self {
        self.burn_in = n;
        self
    }

    /// Set the RNG seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Enable parallel per-column fit
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Enable verbose diagnostics
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Parse the fill policy, defaulting to random draws
    pub(crate) fn fill_policy(&self) -> Result<FillPolicy> {
        match &self.fill_value {
            Some(v) => FillPolicy::parse(v),
            None => Ok(FillPolicy::Random),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_uniform_normalize() {
        let spec = StrategySpec::Uniform("least squares".to_string());
        let map = spec.normalize(&cols(&["a", "b"])).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], Strategy::LeastSquares);
    }

    #[test]
    fn test_per_column_length_mismatch() {
        let spec = StrategySpec::PerColumn(vec!["least squares".to_string()]);
        let err = spec.normalize(&cols(&["a", "b"])).unwrap_err();
        assert!(matches!(err, ImputeError::InvalidConfig(_)));
    }

    #[test]
    fn test_named_unknown_column() {
        let spec = StrategySpec::Named(
            [("z".to_string(), "pmm".to_string())].into_iter().collect(),
        );
        let err = spec.normalize(&cols(&["a", "b"])).unwrap_err();
        assert!(matches!(err, ImputeError::InvalidConfig(_)));
    }

    #[test]
    fn test_predictors_exclude_self() {
        let columns = cols(&["a", "b", "c"]);
        let targets = cols(&["a"]);
        let map = PredictorSpec::All
            .normalize(&columns, targets.iter())
            .unwrap();
        assert_eq!(map["a"], vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_predictor_list_excludes_target() {
        let columns = cols(&["a", "b", "c"]);
        let targets = cols(&["a"]);
        let spec = PredictorSpec::List(cols(&["a", "b"]));
        let map = spec.normalize(&columns, targets.iter()).unwrap();
        assert_eq!(map["a"], vec!["b".to_string()]);
    }

    #[test]
    fn test_fill_policy_parse() {
        assert_eq!(FillPolicy::parse("mean").unwrap(), FillPolicy::Mean);
        assert_eq!(FillPolicy::parse("Random").unwrap(), FillPolicy::Random);
        assert!(matches!(
            FillPolicy::parse("median").unwrap_err(),
            ImputeError::InvalidFillValue(_)
        ));
    }

    #[test]
    fn test_config_serialize() {
        let config = ImputerConfig::new()
            .with_uniform_strategy("pmm")
            .with_neighbors(3)
            .with_seed(42);
        let json = serde_json::to_string(&config).unwrap();
        let back: ImputerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.neighbors, 3);
        assert_eq!(back.seed, Some(42));
    }
}
