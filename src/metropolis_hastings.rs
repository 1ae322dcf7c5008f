/*!
# Metropolis–Hastings Sampler

A generic Metropolis–Hastings engine that works with any target `D` and proposal `Q`
implementing [`Target`] and [`Proposal`]. Each run owns one [`RandomSource`] seeded from
its [`RunConfig`], so a run is fully determined by its target, proposal and
configuration.

## Overview

A run moves through `INIT → ITERATING → DONE`:

- **INIT** records the initial location as both the accepted and the candidate state
  of iteration 0, with its log-density.
- **ITERATING**, for every `i` in `1..iterations`: draw `(candidate, factor)` from the
  proposal at the current state, draw `u ~ Uniform(0, 1)`, evaluate the candidate's
  log-density and accept iff `u < exp(lp_candidate - lp_current) * factor`. The
  candidate is recorded either way.
- **DONE** hands back the [`SamplerOutput`].

The comparison uses that formula as written. A large log-density difference makes
`exp` saturate to `+inf`, which still accepts, and a zero factor always rejects.

## Example Usage

```rust
use mh_sampler::config::RunConfig;
use mh_sampler::distributions::{DiagonalGaussian, IsotropicGaussian};
use mh_sampler::metropolis_hastings::MetropolisHastings;

let target = DiagonalGaussian::standard(2);
let proposal = IsotropicGaussian::new(1.0).unwrap();
let config = RunConfig::new(vec![0.0, 0.0], 500).set_seed(42);

let mh = MetropolisHastings::new(target, proposal, config).unwrap();
let output = mh.run().unwrap();
assert_eq!(output.accepted_states().len(), 500);
assert_eq!(output.candidate_states()[0], vec![0.0, 0.0]);
assert!(output.warm_up_states().is_empty());
```
*/

use num_traits::Float;
use rand_distr::{Distribution, Standard};
use std::sync::atomic::AtomicBool;
use tracing::{debug, warn};

use crate::chain::{ChainRecord, MultiChainRecord, SamplerOutput, Transition};
use crate::config::RunConfig;
use crate::core::{self, MarkovChain};
use crate::distributions::{Proposal, Target};
use crate::error::{Result, SamplerError};
use crate::rng::RandomSource;

/// Where a chain is in its run. INIT happens inside [`MHMarkovChain::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Iterating,
    Done,
}

/**
The Metropolis–Hastings sampler: a target, a proposal and a validated run
configuration.

# Type Parameters
- `T`: The floating-point type of states and log-densities (e.g. `f32` or `f64`).
- `D`: The target distribution type. Must implement [`Target`].
- `Q`: The proposal distribution type. Must implement [`Proposal`].
*/
#[derive(Debug, Clone, PartialEq)]
pub struct MetropolisHastings<T: Float, D, Q> {
    /// The target distribution we want to sample from.
    pub target: D,
    /// The proposal distribution used to generate candidate states.
    pub proposal: Q,
    config: RunConfig<T>,
}

impl<T, D, Q> MetropolisHastings<T, D, Q>
where
    T: Float,
    D: Target<T>,
    Q: Proposal<T>,
    Standard: Distribution<T>,
{
    /**
    Validates `config` against the target and proposal and builds the sampler.

    Fails with a configuration error, before the target or proposal is ever called,
    when warm-up is requested, when `iterations < 1`, or when the dimensionalities
    disagree.
    */
    pub fn new(target: D, proposal: Q, config: RunConfig<T>) -> Result<Self> {
        config.validate(target.ndim(), proposal.ndim())?;
        Ok(Self {
            target,
            proposal,
            config,
        })
    }

    pub fn config(&self) -> &RunConfig<T> {
        &self.config
    }

    /// A step-wise chain over this sampler's target and proposal, seeded from the config.
    pub fn chain(&self) -> Result<MHMarkovChain<T, &D, &Q>> {
        MHMarkovChain::new(&self.target, &self.proposal, &self.config)
    }

    /// Runs the configured number of iterations and returns the output.
    pub fn run(&self) -> Result<SamplerOutput<T>> {
        let mut chain = self.chain()?;
        core::run_chain(&mut chain)?;
        Ok(chain.into_output())
    }

    /**
    Like [`run`](Self::run), but checks `stop` once per iteration and returns the
    iterations recorded so far when it is raised.
    */
    pub fn run_with_stop(&self, stop: &AtomicBool) -> Result<SamplerOutput<T>> {
        let mut chain = self.chain()?;
        core::run_chain_until(&mut chain, stop)?;
        Ok(chain.into_output())
    }

    /// Like [`run`](Self::run), showing a progress bar.
    pub fn run_with_progress(&self) -> Result<SamplerOutput<T>> {
        let mut chain = self.chain()?;
        let pb = core::single_progress_bar(chain.remaining());
        core::run_chain_with_progress(&mut chain, &pb)?;
        pb.finish_with_message("Done!");
        Ok(chain.into_output())
    }
}

impl<T, D, Q> MetropolisHastings<T, D, Q>
where
    T: Float + Send + Sync,
    D: Target<T> + Sync,
    Q: Proposal<T> + Sync,
    Standard: Distribution<T>,
{
    fn chains(&self, n_chains: usize) -> Result<Vec<MHMarkovChain<T, &D, &Q>>> {
        (0..n_chains)
            .map(|i| {
                let rng = RandomSource::for_chain(self.config.seed, i);
                MHMarkovChain::with_rng(&self.target, &self.proposal, &self.config, rng)
            })
            .collect()
    }

    /**
    Runs `n_chains` independent chains in parallel from the same initial location.

    Chain `i` draws from stream `i` of the configured seed (see
    [`RandomSource::for_chain`]), so chain 0 reproduces [`run`](Self::run). The records
    are merged only after every chain has finished.
    */
    pub fn run_chains(&self, n_chains: usize) -> Result<MultiChainRecord<T>> {
        let chains = core::run_chains(self.chains(n_chains)?)?;
        Ok(MultiChainRecord::merge(
            chains.into_iter().map(|c| c.into_output().chain),
        ))
    }

    /// Like [`run_chains`](Self::run_chains), with one progress bar per chain.
    pub fn run_chains_with_progress(&self, n_chains: usize) -> Result<MultiChainRecord<T>> {
        let chains = core::run_chains_with_progress(self.chains(n_chains)?)?;
        Ok(MultiChainRecord::merge(
            chains.into_iter().map(|c| c.into_output().chain),
        ))
    }
}

/// A single Metropolis–Hastings chain, advanced one iteration per [`MarkovChain::step`].
#[derive(Debug, Clone)]
pub struct MHMarkovChain<T: Float, D, Q> {
    /// The target distribution to sample from.
    pub target: D,
    /// The proposal distribution used to generate candidate states.
    pub proposal: Q,
    rng: RandomSource,
    record: ChainRecord<T>,
    iterations: usize,
    phase: Phase,
}

impl<T, D, Q> MHMarkovChain<T, D, Q>
where
    T: Float,
    D: Target<T>,
    Q: Proposal<T>,
    Standard: Distribution<T>,
{
    /// Validates `config` and performs INIT, with a random source seeded from `config.seed`.
    pub fn new(target: D, proposal: Q, config: &RunConfig<T>) -> Result<Self> {
        let rng = RandomSource::new(config.seed);
        Self::with_rng(target, proposal, config, rng)
    }

    /// Like [`new`](Self::new), drawing from an explicitly provided random source.
    pub fn with_rng(
        target: D,
        proposal: Q,
        config: &RunConfig<T>,
        rng: RandomSource,
    ) -> Result<Self> {
        config.validate(target.ndim(), proposal.ndim())?;

        let initial = config.initial_location.clone();
        let lp = target.log_density(&initial);
        check_log_density(lp, 0)?;
        debug!(
            seed = rng.seed(),
            stream = rng.stream(),
            iterations = config.iterations,
            ndim = initial.len(),
            "starting Metropolis-Hastings chain"
        );

        let record = ChainRecord::start(initial, lp, config.iterations);
        let phase = if config.iterations > 1 {
            Phase::Iterating
        } else {
            Phase::Done
        };
        Ok(Self {
            target,
            proposal,
            rng,
            record,
            iterations: config.iterations,
            phase,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The iterations recorded so far.
    pub fn record(&self) -> &ChainRecord<T> {
        &self.record
    }

    /// Finishes the run, handing over the record and the (empty) warm-up states.
    pub fn into_output(self) -> SamplerOutput<T> {
        if self.record.len() < self.iterations {
            warn!(
                recorded = self.record.len(),
                iterations = self.iterations,
                "chain ended before all iterations were recorded"
            );
        }
        SamplerOutput {
            chain: self.record,
            warm_up: Vec::new(),
        }
    }

    fn iterate(&mut self) -> Result<Transition> {
        let i = self.record.len();
        let ndim = self.record.ndim();

        let (candidate, factor) = self.proposal.propose(self.record.current_state(), &mut self.rng);
        let u: T = self.rng.uniform();
        if candidate.len() != ndim {
            return Err(SamplerError::CandidateDimension {
                iteration: i,
                expected: ndim,
                found: candidate.len(),
            });
        }

        let candidate_lp = self.target.log_density(&candidate);
        check_log_density(candidate_lp, i)?;
        if factor.is_nan() || factor < T::zero() {
            return Err(SamplerError::InvalidProposalFactor {
                iteration: i,
                value: factor.to_f64().unwrap_or(f64::NAN),
            });
        }

        if accepts(u, candidate_lp - self.record.current_log_density(), factor) {
            self.record.push_accepted(candidate, candidate_lp);
            Ok(Transition::Accepted)
        } else {
            self.record.push_rejected(candidate);
            Ok(Transition::Rejected)
        }
    }
}

impl<T, D, Q> MarkovChain<T> for MHMarkovChain<T, D, Q>
where
    T: Float,
    D: Target<T>,
    Q: Proposal<T>,
    Standard: Distribution<T>,
{
    /// Performs one ITERATING transition, moving to DONE after the last iteration.
    fn step(&mut self) -> Result<Option<Transition>> {
        if self.phase == Phase::Done {
            return Ok(None);
        }
        let transition = self.iterate().inspect_err(|err| {
            warn!(iteration = self.record.len(), %err, "chain aborted");
        })?;
        if self.record.len() >= self.iterations {
            self.phase = Phase::Done;
            debug!(
                iterations = self.record.len(),
                acceptance_rate = self.record.acceptance_rate(),
                "Metropolis-Hastings chain done"
            );
        }
        Ok(Some(transition))
    }

    fn current_state(&self) -> &[T] {
        self.record.current_state()
    }

    fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    fn remaining(&self) -> usize {
        self.iterations.saturating_sub(self.record.len())
    }
}

fn check_log_density<T: Float>(lp: T, iteration: usize) -> Result<()> {
    if lp.is_finite() {
        Ok(())
    } else {
        Err(SamplerError::NonFiniteLogDensity {
            iteration,
            value: lp.to_f64().unwrap_or(f64::NAN),
        })
    }
}

/// `u < exp(log_ratio) * factor`. A zero factor rejects, also when `exp` overflows.
fn accepts<T: Float>(u: T, log_ratio: T, factor: T) -> bool {
    factor > T::zero() && u < log_ratio.exp() * factor
}

/**
Runs one Metropolis–Hastings chain and returns its output.

`warm_up` must be 0; any other value fails with
[`ConfigError::WarmUpNotImplemented`](crate::error::ConfigError::WarmUpNotImplemented)
before the target or proposal is called.

```rust
use mh_sampler::distributions::{FnTarget, IsotropicGaussian};
use mh_sampler::run_sampler;

let target = FnTarget::new(|x: &[f64]| -0.5 * x[0] * x[0]);
let proposal = IsotropicGaussian::new(1.0).unwrap();
let output = run_sampler(target, proposal, vec![0.0], 100, 0, 7).unwrap();
assert_eq!(output.accepted_states().len(), 100);
assert_eq!(output.candidate_states().len(), 100);

let proposal = IsotropicGaussian::new(1.0).unwrap();
let target = FnTarget::new(|x: &[f64]| -0.5 * x[0] * x[0]);
assert!(run_sampler(target, proposal, vec![0.0], 100, 10, 7).is_err());
```
*/
pub fn run_sampler<T, D, Q>(
    target: D,
    proposal: Q,
    initial_location: Vec<T>,
    iterations: usize,
    warm_up: usize,
    seed: u64,
) -> Result<SamplerOutput<T>>
where
    T: Float,
    D: Target<T>,
    Q: Proposal<T>,
    Standard: Distribution<T>,
{
    let config = RunConfig::new(initial_location, iterations)
        .set_warm_up(warm_up)
        .set_seed(seed);
    MetropolisHastings::new(target, proposal, config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{DiagonalGaussian, FnTarget, IsotropicGaussian, LogNormalWalk};
    use crate::error::ConfigError;
    use approx::assert_abs_diff_eq;
    use std::sync::atomic::Ordering;

    fn standard_normal_sampler(iterations: usize, seed: u64) -> MetropolisHastings<f64, DiagonalGaussian<f64>, IsotropicGaussian<f64>> {
        let config = RunConfig::new(vec![0.0], iterations).set_seed(seed);
        MetropolisHastings::new(
            DiagonalGaussian::standard(1),
            IsotropicGaussian::new(1.0).unwrap(),
            config,
        )
        .unwrap()
    }

    #[test]
    fn accept_rule_matches_direct_formula() {
        let cases = [
            (0.5, 0.0, 1.0),
            (0.5, -1.0, 1.0),
            (0.3, -1.0, 1.0),
            (0.9, 0.1, 1.0),
            (0.2, -2.0, 3.0),
            (0.7, 1.0, 0.1),
            (0.0, -10.0, 1.0),
            (0.4, -1e6, 1.0),
        ];
        for (u, log_ratio, factor) in cases {
            let direct = u < f64::exp(log_ratio) * factor;
            assert_eq!(accepts(u, log_ratio, factor), direct, "u={u} lr={log_ratio} f={factor}");
        }
    }

    #[test]
    fn accept_rule_decides_ties_like_direct_formula() {
        for k in 0..200 {
            let log_ratio = -5.0 * k as f64 / 200.0;
            for factor in [1.0, 0.37, 2.5] {
                let h = log_ratio.exp() * factor;
                let below = f64::from_bits(h.to_bits() - 1);
                assert!(accepts(below, log_ratio, factor), "u one ulp below {h}");
                assert!(!accepts(h, log_ratio, factor), "u equal to {h}");
            }
        }
    }

    #[test]
    fn accept_rule_does_not_overflow() {
        assert!(accepts(0.999, 1e6, 1.0));
        assert!(accepts(0.999f32, 1e30, 1.0));
        assert!(!accepts(0.0, 5.0, 0.0));
        assert!(!accepts(0.5, 1e6, 0.0));
        assert!(accepts(0.0, -10.0, 1.0));
    }

    #[test]
    fn single_iteration_run_is_just_init() {
        let mh = standard_normal_sampler(1, 0);
        let chain = mh.chain().unwrap();
        assert_eq!(chain.phase(), Phase::Done);
        let output = mh.run().unwrap();
        assert_eq!(output.accepted_states(), &[vec![0.0]]);
        assert_eq!(output.candidate_states(), &[vec![0.0]]);
        assert_eq!(output.chain.log_densities(), &[0.0]);
    }

    #[test]
    fn stepping_walks_through_phases() {
        let mh = standard_normal_sampler(3, 1);
        let mut chain = mh.chain().unwrap();
        assert_eq!(chain.phase(), Phase::Iterating);
        assert_eq!(chain.remaining(), 2);
        assert!(chain.step().unwrap().is_some());
        assert!(chain.step().unwrap().is_some());
        assert_eq!(chain.phase(), Phase::Done);
        assert_eq!(chain.step().unwrap(), None);
        assert_eq!(chain.record().len(), 3);
    }

    #[test]
    fn same_seed_same_chain() {
        let a = standard_normal_sampler(200, 5).run().unwrap();
        let b = standard_normal_sampler(200, 5).run().unwrap();
        let c = standard_normal_sampler(200, 6).run().unwrap();
        assert_eq!(a, b);
        assert_ne!(a.candidate_states(), c.candidate_states());
    }

    #[test]
    fn log_densities_track_accepted_states() {
        let mh = standard_normal_sampler(300, 2);
        let output = mh.run().unwrap();
        for (state, lp) in output.accepted_states().iter().zip(output.chain.log_densities()) {
            assert_abs_diff_eq!(*lp, mh.target.log_density(state), epsilon = 1e-12);
        }
    }

    #[test]
    fn nan_target_is_reported() {
        let target = FnTarget::new(|x: &[f64]| if x[0] > 0.5 { f64::NAN } else { 0.0 });
        let proposal = IsotropicGaussian::new(5.0).unwrap();
        let err = run_sampler(target, proposal, vec![0.0], 1_000, 0, 3).unwrap_err();
        assert!(matches!(err, SamplerError::NonFiniteLogDensity { iteration, value } if iteration > 0 && value.is_nan()));
    }

    #[test]
    fn infinite_initial_density_is_reported() {
        let target = FnTarget::new(|_: &[f64]| f64::NEG_INFINITY);
        let proposal = IsotropicGaussian::new(1.0).unwrap();
        let err = run_sampler(target, proposal, vec![0.0], 10, 0, 3).unwrap_err();
        assert_eq!(
            err,
            SamplerError::NonFiniteLogDensity {
                iteration: 0,
                value: f64::NEG_INFINITY
            }
        );
    }

    struct NegativeFactor;

    impl Proposal<f64> for NegativeFactor {
        fn propose(&self, current: &[f64], _rng: &mut RandomSource) -> (Vec<f64>, f64) {
            (current.to_vec(), -1.0)
        }
    }

    struct Grows;

    impl Proposal<f64> for Grows {
        fn propose(&self, current: &[f64], _rng: &mut RandomSource) -> (Vec<f64>, f64) {
            let mut next = current.to_vec();
            next.push(0.0);
            (next, 1.0)
        }
    }

    struct Shrinks;

    impl Proposal<f64> for Shrinks {
        fn propose(&self, _current: &[f64], _rng: &mut RandomSource) -> (Vec<f64>, f64) {
            (Vec::new(), 1.0)
        }
    }

    #[test]
    fn short_candidate_is_reported_before_target_sees_it() {
        // Indexing an empty candidate would panic inside the target.
        let target = FnTarget::new(|x: &[f64]| -0.5 * x[0] * x[0]);
        assert_eq!(
            run_sampler(target, Shrinks, vec![0.0], 5, 0, 0),
            Err(SamplerError::CandidateDimension {
                iteration: 1,
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn malformed_proposals_are_reported() {
        let target = FnTarget::new(|_: &[f64]| 0.0);
        assert!(matches!(
            run_sampler(&target, NegativeFactor, vec![0.0], 5, 0, 0),
            Err(SamplerError::InvalidProposalFactor { iteration: 1, .. })
        ));
        assert_eq!(
            run_sampler(&target, Grows, vec![0.0], 5, 0, 0),
            Err(SamplerError::CandidateDimension {
                iteration: 1,
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn configuration_errors_surface_from_new() {
        let config = RunConfig::new(vec![0.0, 0.0], 10);
        let err = MetropolisHastings::new(
            DiagonalGaussian::standard(3),
            IsotropicGaussian::new(1.0).unwrap(),
            config,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SamplerError::Config(ConfigError::DimensionMismatch { expected: 2, found: 3, .. })
        ));

        let err = run_sampler(
            DiagonalGaussian::standard(1),
            IsotropicGaussian::new(1.0).unwrap(),
            vec![0.0],
            0,
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err, SamplerError::Config(ConfigError::NoIterations));
    }

    #[test]
    fn stop_signal_returns_prefix() {
        let mh = standard_normal_sampler(1_000, 9);
        let stop = AtomicBool::new(true);
        let output = mh.run_with_stop(&stop).unwrap();
        assert_eq!(output.accepted_states().len(), 1);

        stop.store(false, Ordering::Relaxed);
        let output = mh.run_with_stop(&stop).unwrap();
        assert_eq!(output, mh.run().unwrap());
    }

    #[test]
    fn progress_run_matches_plain_run() {
        let mh = standard_normal_sampler(100, 4);
        assert_eq!(mh.run_with_progress().unwrap(), mh.run().unwrap());
    }

    #[test]
    fn first_of_many_chains_matches_single_run() {
        let mh = standard_normal_sampler(200, 8);
        let multi = mh.run_chains(4).unwrap();
        assert_eq!(multi.n_chains(), 4);
        assert_eq!(multi.chains()[0], mh.run().unwrap().chain);
        assert_ne!(multi.chains()[0], multi.chains()[1]);

        let with_progress = mh.run_chains_with_progress(4).unwrap();
        assert_eq!(with_progress, multi);
    }

    #[test]
    fn asymmetric_proposal_targets_exponential() {
        // Exp(1) on x > 0; the multiplicative walk needs its ratio factor to be unbiased.
        let target = FnTarget::new(|x: &[f64]| if x[0] > 0.0 { -x[0] } else { -1e6 });
        let proposal = LogNormalWalk::new(0.8).unwrap();
        let output = run_sampler(target, proposal, vec![1.0], 40_000, 0, 21).unwrap();
        let tail = &output.accepted_states()[2_000..];
        let mean = tail.iter().map(|x| x[0]).sum::<f64>() / tail.len() as f64;
        assert!((mean - 1.0).abs() < 0.1, "mean = {mean}");
    }
}
