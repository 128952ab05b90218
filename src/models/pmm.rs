//! Predictive mean matching
//!
//! A hot-deck strategy: fills are always values actually observed in the
//! column. Observed rows keep their least-squares predictions; missing rows
//! are predicted from one posterior parameter draw, then matched against
//! the nearest observed predictions and filled from the donors' real
//! values. Guarantees plausible fills even when the linear model is rough.

use super::least_squares::{self, LinearFit};
use crate::config::FillPolicy;
use crate::error::Result;
use crate::sampler::{BayesLinearSpec, PosteriorSampler, PosteriorTrace};
use ndarray::{Array1, Array2};
use rand::Rng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Fitted matching model, shared by the PMM and LRD strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmmFit {
    pub point: LinearFit,
    pub spec: BayesLinearSpec,
    /// Observed response values, donor pool for the match
    pub y_obs: Vec<f64>,
    /// Point predictions on the observed rows, match keys
    pub y_pred_obs: Vec<f64>,
}

/// Fit the point model, the posterior specification, and the donor pool
pub fn fit(x: &Array2<f64>, y: &Array1<f64>) -> Result<PmmFit> {
    let bayes = super::bayes_least_squares::fit(x, y)?;
    let y_pred_obs = least_squares::predict(&bayes.point, x).to_vec();
    Ok(PmmFit {
        point: bayes.point,
        spec: bayes.spec,
        y_obs: y.to_vec(),
        y_pred_obs,
    })
}

/// Posterior predictions for the missing rows from one random retained draw
pub(crate) fn posterior_predictions(
    fit: &PmmFit,
    x_miss: &Array2<f64>,
    sampler: &dyn PosteriorSampler,
    samples: usize,
    burn_in: usize,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<(Vec<f64>, PosteriorTrace)> {
    let trace = sampler.sample_linear(&fit.spec, samples, burn_in, rng)?;
    let d = trace.draw_index(rng);
    let beta = trace.beta.row(d).to_owned();
    let preds = x_miss
        .rows()
        .into_iter()
        .map(|r| trace.alpha[d] + r.dot(&beta))
        .collect();
    Ok((preds, trace))
}

/// Match each missing row against its nearest observed predictions and fill
/// from the donors' observed values.
pub fn impute(
    fit: &PmmFit,
    x_miss: &Array2<f64>,
    sampler: &dyn PosteriorSampler,
    samples: usize,
    burn_in: usize,
    neighbors: usize,
    fill: FillPolicy,
    rng: &mut Xoshiro256PlusPlus,
) -> Result<(Vec<f64>, PosteriorTrace)> {
    let (preds, trace) = posterior_predictions(fit, x_miss, sampler, samples, burn_in, rng)?;
    let values = preds
        .iter()
        .map(|&p| {
            let nn = super::nearest_neighbors(p, &fit.y_pred_obs, neighbors);
            match fill {
                FillPolicy::Random => fit.y_obs[nn[rng.gen_range(0..nn.len())]],
                FillPolicy::Mean => {
                    nn.iter().map(|&j| fit.y_obs[j]).sum::<f64>() / nn.len() as f64
                }
            }
        })
        .collect();
    Ok((values, trace))
}
