//! A small MCMC demo: samples a randomly drawn 2D Gaussian posterior with
//! Metropolis-Hastings and prints summary statistics of the chains.
//!
//! Set `RUST_LOG=debug` to see per-chain start and completion events.

use mh_sampler::config::RunConfig;
use mh_sampler::distributions::{GaussianPosterior, IsotropicGaussian};
use mh_sampler::metropolis_hastings::MetropolisHastings;
use mh_sampler::stats::{max_rhat, ChainSummary};
use std::error::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore the error if a subscriber is already installed (e.g. under `cargo test`).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Main entry point: draws the target posterior, runs several chains in parallel and
/// reports their means, variances, acceptance rates and R-hat.
fn main() -> Result<(), Box<dyn Error>> {
    const ITERATIONS: usize = 10_000;
    const BURNIN: usize = 1_000;
    const N_CHAINS: usize = 4;
    const POSTERIOR_SEED: u64 = 12345;
    const SEED: u64 = 42;

    init_logging();

    let target = GaussianPosterior::<f64>::from_seed(2, POSTERIOR_SEED)?;
    info!(mu = ?target.mu, var = ?target.var, "drew target posterior");

    let proposal = IsotropicGaussian::new(1.0)?;
    let config = RunConfig::new(vec![0.0, 0.0], ITERATIONS).set_seed(SEED);
    let mh = MetropolisHastings::new(target, proposal, config)?;

    let chains = mh.run_chains_with_progress(N_CHAINS)?;

    for (i, chain) in chains.chains().iter().enumerate() {
        let summary = ChainSummary::from_record(chain, BURNIN)?;
        println!(
            "Chain {i}: acceptance rate {:.3}, mean ({:.3}, {:.3}), variance ({:.3}, {:.3})",
            summary.acceptance_rate,
            summary.mean[0],
            summary.mean[1],
            summary.variance[0],
            summary.variance[1],
        );
    }
    println!("True mean: ({:.3}, {:.3})", mh.target.mu[0], mh.target.mu[1]);
    println!("True variance: ({:.3}, {:.3})", mh.target.var[0], mh.target.var[1]);
    // A chain stuck on one state has zero within-chain variance and no defined R-hat.
    match max_rhat(&chains, BURNIN) {
        Ok(r) => println!("Max R-hat after burn-in: {r:.4}"),
        Err(err) => println!("R-hat unavailable: {err}"),
    }

    #[cfg(feature = "csv")]
    {
        mh_sampler::io::csv::save_csv_chains(&chains, "chains.csv")?;
        println!("Saved chains to chains.csv");
    }

    Ok(())
}

#[test]
fn test_main() {
    main().expect("Expected main to not return an error.");
}
