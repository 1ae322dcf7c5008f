/*!
# mh-sampler

A compact Metropolis–Hastings MCMC engine. Plug in any [`Target`](distributions::Target)
log-density and [`Proposal`](distributions::Proposal) mechanism, pick a seed, and get
back a [`ChainRecord`](chain::ChainRecord) of accepted states, candidate states,
log-densities and the running acceptance rate.

```rust
use mh_sampler::distributions::{GaussianPosterior, IsotropicGaussian};
use mh_sampler::run_sampler;

let target = GaussianPosterior::<f64>::from_seed(2, 12345).unwrap();
let proposal = IsotropicGaussian::new(1.0).unwrap();
let output = run_sampler(target, proposal, vec![0.0, 0.0], 25, 0, 42).unwrap();

assert_eq!(output.accepted_states()[0], output.candidate_states()[0]);
assert!(output.warm_up_states().is_empty());
```
*/

pub mod chain;
pub mod config;
pub mod core;
pub mod distributions;
pub mod error;
pub mod io;
pub mod metropolis_hastings;
pub mod rng;
pub mod stats;

pub use chain::{ChainRecord, SamplerOutput, Transition};
pub use config::RunConfig;
pub use error::{ConfigError, Result, SamplerError};
pub use metropolis_hastings::{run_sampler, MetropolisHastings};
pub use rng::RandomSource;
