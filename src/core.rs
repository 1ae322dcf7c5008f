//! Drivers shared by every Markov chain: running to completion, with an external stop
//! signal, with a progress bar, and running several independent chains in parallel.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

use crate::chain::Transition;
use crate::error::Result;

pub trait MarkovChain<T> {
    /// Does one iteration of the chain. Returns `None` once the chain is done.
    fn step(&mut self) -> Result<Option<Transition>>;

    /// The state the chain currently occupies.
    fn current_state(&self) -> &[T];

    /// Whether the configured number of iterations has been recorded.
    fn is_done(&self) -> bool;

    /// Number of iterations still to run.
    fn remaining(&self) -> usize;
}

pub fn run_chain<T, M>(chain: &mut M) -> Result<()>
where
    M: MarkovChain<T>,
{
    while chain.step()?.is_some() {}
    Ok(())
}

/// Runs `chain` until it is done or `stop` is raised, checking `stop` once per
/// iteration. Returns whether the chain completed.
pub fn run_chain_until<T, M>(chain: &mut M, stop: &AtomicBool) -> Result<bool>
where
    M: MarkovChain<T>,
{
    while !chain.is_done() {
        if stop.load(Ordering::Relaxed) {
            warn!(remaining = chain.remaining(), "stop signal received, ending chain early");
            return Ok(false);
        }
        chain.step()?;
    }
    Ok(true)
}

pub fn run_chain_with_progress<T, M>(chain: &mut M, pb: &ProgressBar) -> Result<()>
where
    M: MarkovChain<T>,
{
    pb.set_length(chain.remaining() as u64);
    while chain.step()?.is_some() {
        pb.inc(1);
    }
    Ok(())
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/**
Runs independent chains in parallel and hands them back, in their original order,
once every one of them has finished.

Chains share nothing while running; each owns its random source and record. The
first error from any chain is returned.
*/
pub fn run_chains<T, M>(chains: Vec<M>) -> Result<Vec<M>>
where
    M: MarkovChain<T> + Send,
{
    chains
        .into_par_iter()
        .map(|mut chain| {
            run_chain(&mut chain)?;
            Ok(chain)
        })
        .collect()
}

/// Like [`run_chains`], with one progress bar per chain.
pub fn run_chains_with_progress<T, M>(chains: Vec<M>) -> Result<Vec<M>>
where
    M: MarkovChain<T> + Send,
{
    let multi = MultiProgress::new();
    let style = progress_style();

    chains
        .into_par_iter()
        .enumerate()
        .map(|(i, mut chain)| {
            let pb = multi.add(ProgressBar::new(chain.remaining() as u64));
            pb.set_prefix(format!("Chain {i}"));
            pb.set_style(style.clone());

            run_chain_with_progress(&mut chain, &pb)?;

            pb.finish_with_message("Done!");
            Ok(chain)
        })
        .collect()
}

/// A progress bar for a single chain, styled like the multi-chain bars.
pub fn single_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_prefix("Chain 0");
    pb.set_style(progress_style());
    pb
}
