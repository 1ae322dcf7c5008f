//! Summary statistics and convergence diagnostics for recorded chains.

use ndarray::prelude::*;
use ndarray_stats::{CorrelationExt, QuantileExt};
use num_traits::Float;
use thiserror::Error;

use crate::chain::{ChainRecord, MultiChainRecord};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("need at least {needed} {what}, got {got}")]
    TooFew {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("chains disagree on {what}")]
    Mismatch { what: &'static str },

    #[error("R-hat is undefined (no dimensions, or zero within-chain variance)")]
    Undefined,
}

fn to_f64_array<T: Float>(samples: ArrayView2<T>) -> Array2<f64> {
    samples.mapv(|x| x.to_f64().unwrap_or(f64::NAN))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainSummary {
    /// Number of samples summarized.
    pub n: usize,
    pub acceptance_rate: f64,
    pub mean: Array1<f64>,
    /// Unbiased per-dimension sample variance.
    pub variance: Array1<f64>,
    pub covariance: Array2<f64>,
}

impl ChainSummary {
    /**
    Summarizes the accepted states of `chain` from iteration `start` on.

    The acceptance rate always covers the whole chain.
    */
    pub fn from_record<T: Float>(chain: &ChainRecord<T>, start: usize) -> Result<Self, StatsError> {
        let samples = to_f64_array(chain.tail_array(start).view());
        let n = samples.nrows();
        if n < 2 {
            return Err(StatsError::TooFew {
                what: "samples",
                needed: 2,
                got: n,
            });
        }
        let mean = samples.mean_axis(Axis(0)).ok_or(StatsError::TooFew {
            what: "samples",
            needed: 2,
            got: n,
        })?;
        let variance = samples.var_axis(Axis(0), 1.0);
        let covariance = samples
            .t()
            .cov(1.0)
            .map_err(|_| StatsError::TooFew {
                what: "samples",
                needed: 2,
                got: n,
            })?;
        Ok(Self {
            n,
            acceptance_rate: chain.acceptance_rate(),
            mean,
            variance,
            covariance,
        })
    }
}

fn tails<T: Float>(chains: &MultiChainRecord<T>, start: usize) -> Vec<Array2<f64>> {
    chains
        .chains()
        .iter()
        .map(|c| to_f64_array(c.tail_array(start).view()))
        .collect()
}

// Between/within formula over equally long sequences.
fn rhat_of(seqs: &[Array2<f64>]) -> Result<Array1<f64>, StatsError> {
    let m = seqs.len();
    if m < 2 {
        return Err(StatsError::TooFew {
            what: "chains",
            needed: 2,
            got: m,
        });
    }
    let n = seqs[0].nrows();
    if seqs.iter().any(|t| t.nrows() != n) {
        return Err(StatsError::Mismatch { what: "length" });
    }
    if seqs.iter().any(|t| t.ncols() != seqs[0].ncols()) {
        return Err(StatsError::Mismatch {
            what: "dimensionality",
        });
    }
    if n < 2 {
        return Err(StatsError::TooFew {
            what: "samples per chain",
            needed: 2,
            got: n,
        });
    }

    let means: Vec<Array1<f64>> = seqs
        .iter()
        .filter_map(|t| t.mean_axis(Axis(0)))
        .collect();
    let means_view: Vec<ArrayView1<f64>> = means.iter().map(|x| x.view()).collect();
    let means = ndarray::stack(Axis(0), &means_view)
        .map_err(|_| StatsError::Mismatch { what: "dimensionality" })?;
    let vars: Vec<Array1<f64>> = seqs.iter().map(|t| t.var_axis(Axis(0), 1.0)).collect();
    let vars_view: Vec<ArrayView1<f64>> = vars.iter().map(|x| x.view()).collect();
    let vars = ndarray::stack(Axis(0), &vars_view)
        .map_err(|_| StatsError::Mismatch { what: "dimensionality" })?;

    let n = n as f64;
    let within = vars.mean_axis(Axis(0)).ok_or(StatsError::TooFew {
        what: "chains",
        needed: 2,
        got: m,
    })?;
    let between = means.var_axis(Axis(0), 1.0) * n;
    let var_plus = &within * ((n - 1.0) / n) + &between / n;
    Ok((var_plus / within).mapv(f64::sqrt))
}

/**
Potential scale reduction factor (R-hat) per dimension, over the accepted states of
every chain from iteration `start` on.

Uses the within-chain variance `W` and the between-chain variance `B` of the chain
means: `R-hat = sqrt(((n - 1) / n * W + B / n) / W)`. Values close to 1 indicate the
chains agree.
*/
pub fn rhat<T: Float>(chains: &MultiChainRecord<T>, start: usize) -> Result<Array1<f64>, StatsError> {
    rhat_of(&tails(chains, start))
}

/**
Split R-hat: every chain's tail from `start` on is cut into a first and a second half
and [`rhat`]'s formula runs over the `2m` halves. A drift within a chain then shows up
as disagreement between its halves. For odd tails the middle state is left out.

A single chain is enough; each tail needs at least 4 states.
*/
pub fn split_rhat<T: Float>(
    chains: &MultiChainRecord<T>,
    start: usize,
) -> Result<Array1<f64>, StatsError> {
    let tails = tails(chains, start);
    let Some(first) = tails.first() else {
        return Err(StatsError::TooFew {
            what: "chains",
            needed: 1,
            got: 0,
        });
    };
    let n = first.nrows();
    if tails.iter().any(|t| t.nrows() != n) {
        return Err(StatsError::Mismatch { what: "length" });
    }
    if n < 4 {
        return Err(StatsError::TooFew {
            what: "samples per chain",
            needed: 4,
            got: n,
        });
    }
    let half = n / 2;
    let halves: Vec<Array2<f64>> = tails
        .iter()
        .flat_map(|t| {
            [
                t.slice(s![..half, ..]).to_owned(),
                t.slice(s![n - half.., ..]).to_owned(),
            ]
        })
        .collect();
    rhat_of(&halves)
}

/// The largest per-dimension R-hat. Fails if any dimension's R-hat is not finite.
pub fn max_rhat<T: Float>(chains: &MultiChainRecord<T>, start: usize) -> Result<f64, StatsError> {
    let all = rhat(chains, start)?;
    if all.iter().any(|r| !r.is_finite()) {
        return Err(StatsError::Undefined);
    }
    all.max().copied().map_err(|_| StatsError::Undefined)
}
