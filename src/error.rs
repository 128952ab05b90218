//! Error types for the predimpute crate

use thiserror::Error;

/// Result type alias for imputation operations
pub type Result<T> = std::result::Result<T, ImputeError>;

/// Main error type for the predictive imputer
#[derive(Error, Debug)]
pub enum ImputeError {
    #[error("Unknown strategy: '{0}'")]
    UnknownStrategy(String),

    #[error("Strategy mismatch: '{strategy}' cannot impute {kind} column '{column}'")]
    StrategyMismatch {
        column: String,
        strategy: String,
        kind: String,
    },

    #[error(
        "Invalid class count: column '{column}' has {observed} observed classes, \
         binary logistic requires exactly 2"
    )]
    InvalidClassCount { column: String, observed: usize },

    #[error("Imputer not fitted")]
    NotFitted,

    #[error("Schema mismatch: column '{0}' was present at fit but is missing at transform")]
    SchemaMismatch(String),

    #[error("Invalid fill value: '{0}' must be 'mean' or 'random'")]
    InvalidFillValue(String),

    #[error("Column '{0}' has no observed values to fit on")]
    AllColumnsNull(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl From<polars::error::PolarsError> for ImputeError {
    fn from(err: polars::error::PolarsError) -> Self {
        ImputeError::DataError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ImputeError {
    fn from(err: ndarray::ShapeError) -> Self {
        ImputeError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ImputeError {
    fn from(err: serde_json::Error) -> Self {
        ImputeError::DataError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImputeError::UnknownStrategy("ridge".to_string());
        assert_eq!(err.to_string(), "Unknown strategy: 'ridge'");
    }

    #[test]
    fn test_not_fitted_display() {
        assert_eq!(ImputeError::NotFitted.to_string(), "Imputer not fitted");
    }

    #[test]
    fn test_strategy_mismatch_display() {
        let err = ImputeError::StrategyMismatch {
            column: "city".to_string(),
            strategy: "least squares".to_string(),
            kind: "categorical".to_string(),
        };
        assert!(err.to_string().contains("city"));
        assert!(err.to_string().contains("least squares"));
    }
}
