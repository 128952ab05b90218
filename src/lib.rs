//! # predimpute
//!
//! Multivariate predictive imputation for polars DataFrames. Each column
//! with missing values is modelled as a regression on the other columns,
//! fit on the rows where it is observed, then the nulls are filled with
//! model predictions. Strategies range from plain least squares and
//! logistic classification through Bayesian posterior sampling, predictive
//! mean matching and local residual draws.
//!
//! ```no_run
//! use polars::prelude::*;
//! use predimpute::{ImputerConfig, PredictiveImputer};
//!
//! # fn main() -> predimpute::Result<()> {
//! let mut df = DataFrame::new(vec![
//!     Column::new("age".into(), &[Some(23.0), None, Some(41.0), Some(35.0)]),
//!     Column::new("income".into(), &[Some(40.0), Some(55.0), None, Some(70.0)]),
//! ])?;
//!
//! let mut imputer = PredictiveImputer::new(
//!     ImputerConfig::new()
//!         .with_uniform_strategy("pmm")
//!         .with_neighbors(3)
//!         .with_seed(42),
//! );
//! let filled = imputer.fit_transform(&mut df)?;
//! assert_eq!(filled.height(), 4);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod imputer;
pub mod models;
pub mod prepare;
pub mod sampler;
pub mod strategy;

mod linalg;

pub use config::{FillPolicy, ImputerConfig, PredictorSpec, ScalerType, StrategySpec};
pub use error::{ImputeError, Result};
pub use imputer::{ColumnFit, PredictiveImputer};
pub use models::{FittedParams, ImputedValues};
pub use sampler::{
    BayesLinearSpec, BayesLogisticSpec, McmcSampler, PosteriorSampler, PosteriorTrace,
};
pub use strategy::{ColumnKind, Strategy};
