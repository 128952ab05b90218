//! Imputation strategy identifiers and dispatch rules
//!
//! The strategy set is closed: a fixed enum rather than a runtime-mutable
//! registry, so dispatch is exhaustive and checked at compile time.

use crate::error::{ImputeError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inferred kind of a column, used for strategy compatibility checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Float-castable column
    Numeric,
    /// String or categorical column
    Categorical,
}

impl ColumnKind {
    /// Human-readable name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Categorical => "categorical",
        }
    }
}

/// Per-column imputation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Resolved by column type at fit time
    Default,
    /// Ordinary least squares point prediction
    LeastSquares,
    /// Logistic regression over exactly 2 observed classes
    BinaryLogistic,
    /// Softmax regression over any number of classes
    MultinomialLogistic,
    /// Least squares plus residual-scaled Gaussian noise
    Stochastic,
    /// Posterior-sampled linear regression
    BayesianLeastSquares,
    /// Posterior-sampled logistic regression
    BayesianBinaryLogistic,
    /// Predictive mean matching (hot-deck over observed values)
    Pmm,
    /// Local residual draws
    Lrd,
    /// Leave the column untouched
    None,
}

impl Strategy {
    /// Parse a strategy name.
    ///
    /// Accepted names match the configuration surface: "default",
    /// "least squares", "binary logistic", "multinomial logistic",
    /// "stochastic", "bayesian least squares", "bayesian binary logistic",
    /// "pmm", "lrd", "none".
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "default" => Ok(Strategy::Default),
            "least squares" => Ok(Strategy::LeastSquares),
            "binary logistic" => Ok(Strategy::BinaryLogistic),
            "multinomial logistic" => Ok(Strategy::MultinomialLogistic),
            "stochastic" => Ok(Strategy::Stochastic),
            "bayesian least squares" => Ok(Strategy::BayesianLeastSquares),
            "bayesian binary logistic" => Ok(Strategy::BayesianBinaryLogistic),
            "pmm" => Ok(Strategy::Pmm),
            "lrd" => Ok(Strategy::Lrd),
            "none" => Ok(Strategy::None),
            other => Err(ImputeError::UnknownStrategy(other.to_string())),
        }
    }

    /// Canonical strategy name
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Default => "default",
            Strategy::LeastSquares => "least squares",
            Strategy::BinaryLogistic => "binary logistic",
            Strategy::MultinomialLogistic => "multinomial logistic",
            Strategy::Stochastic => "stochastic",
            Strategy::BayesianLeastSquares => "bayesian least squares",
            Strategy::BayesianBinaryLogistic => "bayesian binary logistic",
            Strategy::Pmm => "pmm",
            Strategy::Lrd => "lrd",
            Strategy::None => "none",
        }
    }

    /// Resolve `Default` to a concrete strategy for a column.
    ///
    /// Numeric columns get least squares; categorical columns get binary
    /// logistic when exactly 2 classes were observed, multinomial otherwise.
    pub fn resolve_default(kind: ColumnKind, n_classes: usize) -> Strategy {
        match kind {
            ColumnKind::Numeric => Strategy::LeastSquares,
            ColumnKind::Categorical => {
                if n_classes == 2 {
                    Strategy::BinaryLogistic
                } else {
                    Strategy::MultinomialLogistic
                }
            }
        }
    }

    /// Whether this strategy can impute a column of the given kind
    pub fn is_compatible(&self, kind: ColumnKind) -> bool {
        match self {
            Strategy::Default | Strategy::None => true,
            Strategy::LeastSquares
            | Strategy::Stochastic
            | Strategy::BayesianLeastSquares
            | Strategy::Pmm
            | Strategy::Lrd => kind == ColumnKind::Numeric,
            Strategy::BinaryLogistic
            | Strategy::MultinomialLogistic
            | Strategy::BayesianBinaryLogistic => kind == ColumnKind::Categorical,
        }
    }

    /// Whether imputation draws from a posterior and records a trace
    pub fn is_sampling(&self) -> bool {
        matches!(
            self,
            Strategy::BayesianLeastSquares
                | Strategy::BayesianBinaryLogistic
                | Strategy::Pmm
                | Strategy::Lrd
        )
    }

    /// Whether this strategy requires exactly 2 observed classes
    pub fn requires_binary_response(&self) -> bool {
        matches!(
            self,
            Strategy::BinaryLogistic | Strategy::BayesianBinaryLogistic
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for name in [
            "default",
            "least squares",
            "binary logistic",
            "multinomial logistic",
            "stochastic",
            "bayesian least squares",
            "bayesian binary logistic",
            "pmm",
            "lrd",
            "none",
        ] {
            let s = Strategy::parse(name).unwrap();
            assert_eq!(s.name(), name);
        }
    }

    #[test]
    fn test_parse_unknown() {
        let err = Strategy::parse("ridge").unwrap_err();
        assert!(matches!(err, crate::error::ImputeError::UnknownStrategy(_)));
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(
            Strategy::parse("Least Squares").unwrap(),
            Strategy::LeastSquares
        );
    }

    #[test]
    fn test_compatibility() {
        assert!(Strategy::LeastSquares.is_compatible(ColumnKind::Numeric));
        assert!(!Strategy::LeastSquares.is_compatible(ColumnKind::Categorical));
        assert!(Strategy::BinaryLogistic.is_compatible(ColumnKind::Categorical));
        assert!(!Strategy::Pmm.is_compatible(ColumnKind::Categorical));
    }

    #[test]
    fn test_default_resolution() {
        assert_eq!(
            Strategy::resolve_default(ColumnKind::Numeric, 0),
            Strategy::LeastSquares
        );
        assert_eq!(
            Strategy::resolve_default(ColumnKind::Categorical, 2),
            Strategy::BinaryLogistic
        );
        assert_eq!(
            Strategy::resolve_default(ColumnKind::Categorical, 3),
            Strategy::MultinomialLogistic
        );
    }
}
