//! Per-run configuration for the sampler.

use num_traits::Float;

use crate::error::ConfigError;

/// Seed used when none is set explicitly.
pub const DEFAULT_SEED: u64 = 42;

/**
Everything a single Metropolis–Hastings run needs besides the target and proposal.

A configuration is a plain value: build it once, validate it, and hand it to the
sampler. The dimensionality of the run is `initial_location.len()`.

```rust
use mh_sampler::config::RunConfig;

let config = RunConfig::new(vec![0.0, 0.0], 1_000).set_seed(7);
assert_eq!(config.ndim(), 2);
assert_eq!(config.seed, 7);
assert!(config.validate(Some(2), None).is_ok());
assert!(config.clone().set_warm_up(10).validate(None, None).is_err());
```
*/
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig<T: Float> {
    /// Where the chain starts.
    pub initial_location: Vec<T>,
    /// Number of recorded iterations, including the initial state.
    pub iterations: usize,
    /// Number of discarded warm-up iterations. Only 0 is supported.
    pub warm_up: usize,
    pub seed: u64,
}

impl<T: Float> RunConfig<T> {
    pub fn new(initial_location: Vec<T>, iterations: usize) -> Self {
        Self {
            initial_location,
            iterations,
            warm_up: 0,
            seed: DEFAULT_SEED,
        }
    }

    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Requests a warm-up phase. Any value other than 0 fails validation.
    pub fn set_warm_up(mut self, warm_up: usize) -> Self {
        self.warm_up = warm_up;
        self
    }

    pub fn ndim(&self) -> usize {
        self.initial_location.len()
    }

    /**
    Checks the configuration against the dimensionality reported by the target and the
    proposal (`None` means the component accepts any dimension).

    Warm-up is checked first, so a run requesting it always fails with
    [`ConfigError::WarmUpNotImplemented`] regardless of the other settings.
    */
    pub fn validate(
        &self,
        target_ndim: Option<usize>,
        proposal_ndim: Option<usize>,
    ) -> Result<(), ConfigError> {
        if self.warm_up != 0 {
            return Err(ConfigError::WarmUpNotImplemented {
                requested: self.warm_up,
            });
        }
        if self.iterations < 1 {
            return Err(ConfigError::NoIterations);
        }
        if self.initial_location.is_empty() {
            return Err(ConfigError::EmptyState);
        }
        let expected = self.ndim();
        for (component, ndim) in [("target", target_ndim), ("proposal", proposal_ndim)] {
            if let Some(found) = ndim.filter(|&n| n != expected) {
                return Err(ConfigError::DimensionMismatch {
                    expected,
                    found,
                    component,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunConfig::new(vec![1.0f64], 10);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.warm_up, 0);
        assert_eq!(config.ndim(), 1);
        assert_eq!(config.validate(None, None), Ok(()));
    }

    #[test]
    fn warm_up_is_rejected_first() {
        let config = RunConfig::new(Vec::<f64>::new(), 0).set_warm_up(3);
        assert_eq!(
            config.validate(Some(5), Some(5)),
            Err(ConfigError::WarmUpNotImplemented { requested: 3 })
        );
    }

    #[test]
    fn zero_iterations_rejected() {
        let config = RunConfig::new(vec![0.0f64], 0);
        assert_eq!(config.validate(None, None), Err(ConfigError::NoIterations));
    }

    #[test]
    fn empty_state_rejected() {
        let config = RunConfig::new(Vec::<f64>::new(), 5);
        assert_eq!(config.validate(None, None), Err(ConfigError::EmptyState));
    }

    #[test]
    fn dimension_mismatch_names_component() {
        let config = RunConfig::new(vec![0.0f64, 0.0], 5);
        assert_eq!(
            config.validate(Some(3), None),
            Err(ConfigError::DimensionMismatch {
                expected: 2,
                found: 3,
                component: "target",
            })
        );
        assert_eq!(
            config.validate(Some(2), Some(1)),
            Err(ConfigError::DimensionMismatch {
                expected: 2,
                found: 1,
                component: "proposal",
            })
        );
    }
}
