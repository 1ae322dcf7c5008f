/*!
Target and proposal distributions for the Metropolis–Hastings engine.

A [`Target`] evaluates an (unnormalized) log-density at a state; a [`Proposal`]
produces a candidate state from the current one together with the proposal-ratio
factor the engine multiplies into the acceptance ratio. Both are generic over the
floating-point precision through [`num_traits::Float`].

# Examples

```rust
use mh_sampler::distributions::{GaussianPosterior, IsotropicGaussian, Proposal, Target};
use mh_sampler::rng::RandomSource;

let mut rng = RandomSource::new(12345);
let target = GaussianPosterior::<f64>::builder(2).build(&mut rng).unwrap();
let proposal = IsotropicGaussian::new(1.0).unwrap();

let (candidate, factor) = proposal.propose(&[0.0, 0.0], &mut rng);
assert_eq!(candidate.len(), 2);
assert_eq!(factor, 1.0);
assert!(target.log_density(&candidate).is_finite());
```
*/

use num_traits::Float;
use rand_distr::{Distribution, LogNormal, StandardNormal};
use std::f64::consts::{LN_10, PI};

use crate::error::ConfigError;
use crate::rng::RandomSource;

/// Log-density returned by [`GaussianPosterior`] outside its support.
pub const OUT_OF_SUPPORT_LOG_DENSITY: f64 = -1e6;

/// Half-width of the box (-500, 500)^n on which [`GaussianPosterior`] is supported.
pub const SUPPORT_BOUND: f64 = 500.0;

/// A continuous target distribution from which we want to sample.
pub trait Target<T: Float> {
    /**
    Returns the log of the (possibly unnormalized) density at `state`.

    Must be a pure function of `state` and the distribution's fixed parameters. Points
    outside the support should return a strongly negative finite value rather than
    `-inf`; the sampler rejects NaN and infinities as a contract violation.
    */
    fn log_density(&self, state: &[T]) -> T;

    /// The dimensionality this target is defined on, if it is fixed.
    fn ndim(&self) -> Option<usize> {
        None
    }
}

/// A proposal mechanism for Metropolis–Hastings.
pub trait Proposal<T: Float> {
    /**
    Draws a candidate state given `current`, using `rng` for all randomness.

    Returns the candidate together with the proposal-ratio factor
    `q(current | candidate) / q(candidate | current)`, which is multiplied directly into
    the acceptance ratio. Symmetric proposals return exactly `1`. The factor must be
    non-negative.
    */
    fn propose(&self, current: &[T], rng: &mut RandomSource) -> (Vec<T>, T);

    /// The dimensionality this proposal is defined on, if it is fixed.
    fn ndim(&self) -> Option<usize> {
        None
    }
}

impl<T: Float, D: Target<T> + ?Sized> Target<T> for &D {
    fn log_density(&self, state: &[T]) -> T {
        (**self).log_density(state)
    }

    fn ndim(&self) -> Option<usize> {
        (**self).ndim()
    }
}

impl<T: Float, Q: Proposal<T> + ?Sized> Proposal<T> for &Q {
    fn propose(&self, current: &[T], rng: &mut RandomSource) -> (Vec<T>, T) {
        (**self).propose(current, rng)
    }

    fn ndim(&self) -> Option<usize> {
        (**self).ndim()
    }
}

fn cast<T: Float>(x: f64) -> T {
    T::from(x).unwrap_or_else(T::nan)
}

/**
An N-dimensional Gaussian posterior with diagonal covariance whose parameters are
themselves random:

- `var[i] ~ 10^(1.5 z)`, `z ~ Normal(0, 1)`, i.e. LogNormal(0, 1.5 ln 10),
- `mu[i] ~ Normal(0, scale)`.

The variances are drawn first, then the means, both from the [`RandomSource`] handed
to [`PosteriorBuilder::build`], so a given seed always reconstructs the same
posterior. The density is supported on the open box (-500, 500)^n; outside it
[`OUT_OF_SUPPORT_LOG_DENSITY`] is returned.

```rust
use mh_sampler::distributions::{GaussianPosterior, Target};
use mh_sampler::rng::RandomSource;

let a = GaussianPosterior::<f64>::from_seed(3, 12345).unwrap();
let b = GaussianPosterior::<f64>::builder(3).build(&mut RandomSource::new(12345)).unwrap();
assert_eq!(a.mu, b.mu);
assert_eq!(a.log_density(&[1e3, 0.0, 0.0]), -1e6);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianPosterior<T: Float> {
    pub mu: Vec<T>,
    pub var: Vec<T>,
}

/// Builder for [`GaussianPosterior`]. Parameters not set explicitly are drawn at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct PosteriorBuilder<T: Float> {
    ndim: usize,
    scale: T,
    mu: Option<Vec<T>>,
    var: Option<Vec<T>>,
}

impl<T: Float> PosteriorBuilder<T>
where
    StandardNormal: Distribution<T>,
{
    /// Standard deviation of the Normal the means are drawn from. Defaults to 3.
    pub fn scale(mut self, scale: T) -> Self {
        self.scale = scale;
        self
    }

    pub fn mean(mut self, mu: Vec<T>) -> Self {
        self.mu = Some(mu);
        self
    }

    pub fn var(mut self, var: Vec<T>) -> Self {
        self.var = Some(var);
        self
    }

    pub fn build(self, rng: &mut RandomSource) -> Result<GaussianPosterior<T>, ConfigError> {
        if self.ndim == 0 {
            return Err(ConfigError::EmptyState);
        }
        if !(self.scale.is_finite() && self.scale >= T::zero()) {
            return Err(ConfigError::InvalidParameter {
                name: "scale",
                value: self.scale.to_f64().unwrap_or(f64::NAN),
            });
        }

        let var = match self.var {
            Some(var) => var,
            None => {
                let log_normal = LogNormal::new(T::zero(), cast::<T>(1.5 * LN_10)).map_err(|_| {
                    ConfigError::InvalidParameter {
                        name: "var",
                        value: 1.5 * LN_10,
                    }
                })?;
                (0..self.ndim).map(|_| log_normal.sample(rng)).collect()
            }
        };
        let mu = match self.mu {
            Some(mu) => mu,
            None => rng.normal_vec(T::zero(), self.scale, self.ndim),
        };

        GaussianPosterior::from_params(mu, var)
    }
}

impl<T: Float> GaussianPosterior<T>
where
    StandardNormal: Distribution<T>,
{
    pub fn builder(ndim: usize) -> PosteriorBuilder<T> {
        PosteriorBuilder {
            ndim,
            scale: cast(3.0),
            mu: None,
            var: None,
        }
    }

    /// Draws a posterior of dimension `ndim` from a fresh [`RandomSource`] seeded with `seed`.
    pub fn from_seed(ndim: usize, seed: u64) -> Result<Self, ConfigError> {
        Self::builder(ndim).build(&mut RandomSource::new(seed))
    }
}

impl<T: Float> GaussianPosterior<T> {
    /// Builds a posterior from explicit means and variances.
    pub fn from_params(mu: Vec<T>, var: Vec<T>) -> Result<Self, ConfigError> {
        if mu.is_empty() {
            return Err(ConfigError::EmptyState);
        }
        if mu.len() != var.len() {
            return Err(ConfigError::DimensionMismatch {
                expected: mu.len(),
                found: var.len(),
                component: "variance vector",
            });
        }
        if let Some(bad) = var.iter().find(|v| !(v.is_finite() && **v > T::zero())) {
            return Err(ConfigError::InvalidParameter {
                name: "var",
                value: bad.to_f64().unwrap_or(f64::NAN),
            });
        }
        Ok(Self { mu, var })
    }

    fn in_support(state: &[T]) -> bool {
        let bound = cast::<T>(SUPPORT_BOUND);
        state.iter().all(|&x| x < bound && x > -bound)
    }
}

impl<T: Float> Target<T> for GaussianPosterior<T> {
    /// Normalized multivariate normal log-pdf with covariance `diag(var)`.
    fn log_density(&self, state: &[T]) -> T {
        if !Self::in_support(state) {
            return cast(OUT_OF_SUPPORT_LOG_DENSITY);
        }
        let half = cast::<T>(0.5);
        let log_two_pi = cast::<T>((2.0 * PI).ln());
        let n = T::from(self.mu.len()).unwrap_or_else(T::nan);
        let mut quad = T::zero();
        let mut log_det = T::zero();
        for ((&x, &m), &v) in state.iter().zip(&self.mu).zip(&self.var) {
            let diff = x - m;
            quad = quad + diff * diff / v;
            log_det = log_det + v.ln();
        }
        -half * (n * log_two_pi + log_det + quad)
    }

    fn ndim(&self) -> Option<usize> {
        Some(self.mu.len())
    }
}

/**
A Gaussian with explicit mean and per-dimension variance, evaluated without its
normalizing constant: `-0.5 * Σ (x_i - mean_i)² / var_i`.

```rust
use mh_sampler::distributions::{DiagonalGaussian, Target};

let target = DiagonalGaussian::standard(1);
assert_eq!(target.log_density(&[2.0]), -2.0);
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalGaussian<T: Float> {
    pub mean: Vec<T>,
    pub var: Vec<T>,
}

impl<T: Float> DiagonalGaussian<T> {
    pub fn new(mean: Vec<T>, var: Vec<T>) -> Result<Self, ConfigError> {
        let GaussianPosterior { mu, var } = GaussianPosterior::from_params(mean, var)?;
        Ok(Self { mean: mu, var })
    }

    /// Zero mean, unit variance in every dimension.
    pub fn standard(ndim: usize) -> Self {
        Self {
            mean: vec![T::zero(); ndim],
            var: vec![T::one(); ndim],
        }
    }
}

impl<T: Float> Target<T> for DiagonalGaussian<T> {
    fn log_density(&self, state: &[T]) -> T {
        let quad = state
            .iter()
            .zip(&self.mean)
            .zip(&self.var)
            .fold(T::zero(), |acc, ((&x, &m), &v)| acc + (x - m) * (x - m) / v);
        -cast::<T>(0.5) * quad
    }

    fn ndim(&self) -> Option<usize> {
        Some(self.mean.len())
    }
}

/**
Adapts a plain function or closure into a [`Target`].

```rust
use mh_sampler::distributions::{FnTarget, Target};

let target = FnTarget::new(|x: &[f64]| -0.5 * x[0] * x[0]).with_ndim(1);
assert_eq!(target.log_density(&[1.0]), -0.5);
assert_eq!(target.ndim(), Some(1));
```
*/
#[derive(Debug, Clone, Copy)]
pub struct FnTarget<F> {
    f: F,
    ndim: Option<usize>,
}

impl<F> FnTarget<F> {
    pub fn new(f: F) -> Self {
        Self { f, ndim: None }
    }

    pub fn with_ndim(mut self, ndim: usize) -> Self {
        self.ndim = Some(ndim);
        self
    }
}

impl<T: Float, F: Fn(&[T]) -> T> Target<T> for FnTarget<F> {
    fn log_density(&self, state: &[T]) -> T {
        (self.f)(state)
    }

    fn ndim(&self) -> Option<usize> {
        self.ndim
    }
}

/**
An isotropic Gaussian random walk: `candidate = current + Normal(0, sigma²)` in every
coordinate. Symmetric, so the ratio factor is always `1`.

```rust
use mh_sampler::distributions::{IsotropicGaussian, Proposal};
use mh_sampler::rng::RandomSource;

let proposal = IsotropicGaussian::new(0.5).unwrap();
let (candidate, factor) = proposal.propose(&[1.0, 2.0, 3.0], &mut RandomSource::new(0));
assert_eq!(candidate.len(), 3);
assert_eq!(factor, 1.0);
```
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IsotropicGaussian<T: Float> {
    pub sigma: T,
}

impl<T: Float> IsotropicGaussian<T> {
    /// Creates a random walk with step size `sigma`, which must be finite and positive.
    pub fn new(sigma: T) -> Result<Self, ConfigError> {
        if !(sigma.is_finite() && sigma > T::zero()) {
            return Err(ConfigError::InvalidParameter {
                name: "sigma",
                value: sigma.to_f64().unwrap_or(f64::NAN),
            });
        }
        Ok(Self { sigma })
    }
}

impl<T: Float> Proposal<T> for IsotropicGaussian<T>
where
    StandardNormal: Distribution<T>,
{
    fn propose(&self, current: &[T], rng: &mut RandomSource) -> (Vec<T>, T) {
        let candidate = current
            .iter()
            .map(|&x| x + rng.normal(T::zero(), self.sigma))
            .collect();
        (candidate, T::one())
    }
}

/**
A multiplicative log-normal random walk for strictly positive states:
`candidate_i = current_i * exp(Normal(0, sigma²))`.

The walk is symmetric in log space but not in the original coordinates; the ratio
factor is `Π candidate_i / current_i`.

```rust
use mh_sampler::distributions::{LogNormalWalk, Proposal};
use mh_sampler::rng::RandomSource;

let proposal = LogNormalWalk::new(0.3).unwrap();
let (candidate, factor) = proposal.propose(&[2.0_f64], &mut RandomSource::new(1));
assert!(candidate[0] > 0.0);
assert!((factor - candidate[0] / 2.0).abs() < 1e-12);
```
*/
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogNormalWalk<T: Float> {
    pub sigma: T,
}

impl<T: Float> LogNormalWalk<T> {
    pub fn new(sigma: T) -> Result<Self, ConfigError> {
        let IsotropicGaussian { sigma } = IsotropicGaussian::new(sigma)?;
        Ok(Self { sigma })
    }
}

impl<T: Float> Proposal<T> for LogNormalWalk<T>
where
    StandardNormal: Distribution<T>,
{
    fn propose(&self, current: &[T], rng: &mut RandomSource) -> (Vec<T>, T) {
        let mut factor = T::one();
        let candidate = current
            .iter()
            .map(|&x| {
                let ratio = rng.normal(T::zero(), self.sigma).exp();
                factor = factor * ratio;
                x * ratio
            })
            .collect();
        (candidate, factor)
    }
}
