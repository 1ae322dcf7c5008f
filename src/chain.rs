/*!
The record of a Metropolis–Hastings run.

A [`ChainRecord`] keeps three aligned sequences, one entry per iteration:

- `accepted_states()[i]`: the state the chain occupies after iteration `i`,
- `candidate_states()[i]`: the state proposed at iteration `i`, accepted or not,
- `log_densities()[i]`: the target log-density of `accepted_states()[i]`,

plus the running number of accepted proposals, from which the acceptance rate is
derived. Entry 0 is the initial location in both state sequences; no proposal is
made there. For `i > 0` the accepted state is either the candidate (accepted) or the
previous accepted state (rejected).
*/

use ndarray::Array2;
use num_traits::Float;

/// How the chain moved at a given iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Iteration 0: the chain sits at its initial location.
    Initial,
    Accepted,
    Rejected,
}

/// One iteration of a [`ChainRecord`], borrowed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step<'a, T> {
    pub index: usize,
    pub accepted_state: &'a [T],
    pub candidate_state: &'a [T],
    pub log_density: T,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChainRecord<T> {
    accepted: Vec<Vec<T>>,
    candidates: Vec<Vec<T>>,
    log_density: Vec<T>,
    // Number of accepted proposals up to and including each iteration.
    accepted_counts: Vec<usize>,
}

impl<T: Float> ChainRecord<T> {
    /// Starts a record at `initial_location`, whose log-density is `log_density`.
    pub(crate) fn start(initial_location: Vec<T>, log_density: T, capacity: usize) -> Self {
        let mut accepted = Vec::with_capacity(capacity);
        let mut candidates = Vec::with_capacity(capacity);
        let mut densities = Vec::with_capacity(capacity);
        let mut counts = Vec::with_capacity(capacity);
        candidates.push(initial_location.clone());
        accepted.push(initial_location);
        densities.push(log_density);
        counts.push(0);
        Self {
            accepted,
            candidates,
            log_density: densities,
            accepted_counts: counts,
        }
    }

    pub(crate) fn push_accepted(&mut self, candidate: Vec<T>, log_density: T) {
        self.accepted.push(candidate.clone());
        self.candidates.push(candidate);
        let count = self.accepted_count() + 1;
        self.log_density.push(log_density);
        self.accepted_counts.push(count);
    }

    pub(crate) fn push_rejected(&mut self, candidate: Vec<T>) {
        let previous = self.current_state().to_vec();
        let lp = self.current_log_density();
        let count = self.accepted_count();
        self.accepted.push(previous);
        self.candidates.push(candidate);
        self.log_density.push(lp);
        self.accepted_counts.push(count);
    }

    /// Number of recorded iterations, including the initial state.
    pub fn len(&self) -> usize {
        self.accepted.len()
    }

    /// Whether the record holds no iterations.
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty()
    }

    pub fn ndim(&self) -> usize {
        self.accepted[0].len()
    }

    pub fn accepted_states(&self) -> &[Vec<T>] {
        &self.accepted
    }

    pub fn candidate_states(&self) -> &[Vec<T>] {
        &self.candidates
    }

    pub fn log_densities(&self) -> &[T] {
        &self.log_density
    }

    pub fn initial_state(&self) -> &[T] {
        &self.accepted[0]
    }

    /// The state after the last recorded iteration.
    pub fn current_state(&self) -> &[T] {
        &self.accepted[self.accepted.len() - 1]
    }

    pub fn current_log_density(&self) -> T {
        self.log_density[self.log_density.len() - 1]
    }

    /// Total number of accepted proposals.
    pub fn accepted_count(&self) -> usize {
        self.accepted_counts[self.accepted_counts.len() - 1]
    }

    /// Number of proposals accepted in iterations `1..=i`.
    pub fn accepted_count_at(&self, i: usize) -> Option<usize> {
        self.accepted_counts.get(i).copied()
    }

    /// `accepted_count_at(i) / i`, and 0 at `i == 0` where no proposal was made.
    pub fn acceptance_rate_at(&self, i: usize) -> Option<f64> {
        let count = self.accepted_count_at(i)?;
        Some(if i == 0 { 0.0 } else { count as f64 / i as f64 })
    }

    /// The running acceptance rate at every iteration.
    pub fn acceptance_rates(&self) -> Vec<f64> {
        (0..self.len())
            .filter_map(|i| self.acceptance_rate_at(i))
            .collect()
    }

    /// Acceptance rate over the whole run.
    pub fn acceptance_rate(&self) -> f64 {
        self.acceptance_rate_at(self.len() - 1).unwrap_or(0.0)
    }

    pub fn transition(&self, i: usize) -> Option<Transition> {
        if i == 0 {
            return Some(Transition::Initial);
        }
        let now = self.accepted_count_at(i)?;
        let before = self.accepted_count_at(i - 1)?;
        Some(if now > before {
            Transition::Accepted
        } else {
            Transition::Rejected
        })
    }

    pub fn step(&self, i: usize) -> Option<Step<'_, T>> {
        Some(Step {
            index: i,
            accepted_state: self.accepted.get(i)?,
            candidate_state: self.candidates.get(i)?,
            log_density: *self.log_density.get(i)?,
            transition: self.transition(i)?,
        })
    }

    /// Iterates over every recorded iteration in order.
    pub fn steps(&self) -> impl Iterator<Item = Step<'_, T>> + '_ {
        (0..self.len()).filter_map(move |i| self.step(i))
    }

    /// Accepted states as an `iterations × ndim` array.
    pub fn to_array(&self) -> Array2<T> {
        let ndim = self.ndim();
        Array2::from_shape_fn((self.len(), ndim), |(i, j)| self.accepted[i][j])
    }

    /// Accepted states from iteration `start` on, as an array.
    pub fn tail_array(&self, start: usize) -> Array2<T> {
        let ndim = self.ndim();
        let start = start.min(self.len());
        Array2::from_shape_fn((self.len() - start, ndim), |(i, j)| {
            self.accepted[start + i][j]
        })
    }
}

/**
What a complete run hands back: the chain record plus the warm-up states.

The warm-up sequence is always empty, since requesting warm-up is rejected before
sampling starts.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerOutput<T> {
    pub chain: ChainRecord<T>,
    pub warm_up: Vec<Vec<T>>,
}

impl<T: Float> SamplerOutput<T> {
    pub fn accepted_states(&self) -> &[Vec<T>] {
        self.chain.accepted_states()
    }

    pub fn warm_up_states(&self) -> &[Vec<T>] {
        &self.warm_up
    }

    pub fn candidate_states(&self) -> &[Vec<T>] {
        self.chain.candidate_states()
    }

    pub fn into_chain(self) -> ChainRecord<T> {
        self.chain
    }
}

/**
The records of several independent chains, gathered after all of them finished.

Chains are never merged while sampling: each run returns its own [`ChainRecord`] and
[`MultiChainRecord::merge`] collects them afterwards.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct MultiChainRecord<T> {
    chains: Vec<ChainRecord<T>>,
}

impl<T: Float> MultiChainRecord<T> {
    pub fn merge(chains: impl IntoIterator<Item = ChainRecord<T>>) -> Self {
        Self {
            chains: chains.into_iter().collect(),
        }
    }

    pub fn n_chains(&self) -> usize {
        self.chains.len()
    }

    pub fn chains(&self) -> &[ChainRecord<T>] {
        &self.chains
    }

    pub fn into_chains(self) -> Vec<ChainRecord<T>> {
        self.chains
    }

    /// Final acceptance rate of every chain.
    pub fn acceptance_rates(&self) -> Vec<f64> {
        self.chains.iter().map(|c| c.acceptance_rate()).collect()
    }

    /// Accepted states from iteration `start` on, of all chains stacked row-wise.
    pub fn pooled_tail(&self, start: usize) -> Array2<T> {
        let ndim = self.chains.first().map_or(0, |c| c.ndim());
        let rows: Vec<&Vec<T>> = self
            .chains
            .iter()
            .flat_map(|c| c.accepted_states().iter().skip(start))
            .collect();
        Array2::from_shape_fn((rows.len(), ndim), |(i, j)| rows[i][j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ChainRecord<f64> {
        let mut record = ChainRecord::start(vec![0.0, 0.0], -1.0, 4);
        record.push_accepted(vec![1.0, 0.5], -0.5);
        record.push_rejected(vec![9.0, 9.0]);
        record.push_accepted(vec![2.0, 1.0], -0.25);
        record
    }

    #[test]
    fn initial_entry() {
        let record = ChainRecord::start(vec![3.0f64], -2.0, 1);
        assert_eq!(record.len(), 1);
        assert!(!record.is_empty());
        assert_eq!(record.accepted_states()[0], vec![3.0]);
        assert_eq!(record.candidate_states()[0], vec![3.0]);
        assert_eq!(record.log_densities(), &[-2.0]);
        assert_eq!(record.transition(0), Some(Transition::Initial));
        assert_eq!(record.acceptance_rate(), 0.0);
    }

    #[test]
    fn rejected_step_repeats_previous_state() {
        let record = sample_record();
        assert_eq!(record.accepted_states()[2], vec![1.0, 0.5]);
        assert_eq!(record.candidate_states()[2], vec![9.0, 9.0]);
        assert_eq!(record.log_densities()[2], -0.5);
        assert_eq!(record.transition(2), Some(Transition::Rejected));
        assert_eq!(record.transition(3), Some(Transition::Accepted));
        assert_eq!(record.transition(4), None);
    }

    #[test]
    fn acceptance_bookkeeping() {
        let record = sample_record();
        assert_eq!(record.accepted_count(), 2);
        assert_eq!(record.acceptance_rates(), vec![0.0, 1.0, 0.5, 2.0 / 3.0]);
        assert_eq!(record.acceptance_rate_at(10), None);
        assert_eq!(record.acceptance_rate(), 2.0 / 3.0);
    }

    #[test]
    fn steps_follow_record() {
        let record = sample_record();
        let steps: Vec<_> = record.steps().collect();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[1].accepted_state, steps[1].candidate_state);
        assert_ne!(steps[2].accepted_state, steps[2].candidate_state);
        assert_eq!(steps[3].index, 3);
        assert_eq!(steps[3].log_density, -0.25);
    }

    #[test]
    fn array_views() {
        let record = sample_record();
        let arr = record.to_array();
        assert_eq!(arr.shape(), &[4, 2]);
        assert_eq!(arr[[3, 0]], 2.0);
        let tail = record.tail_array(2);
        assert_eq!(tail.shape(), &[2, 2]);
        assert_eq!(tail[[0, 1]], 0.5);
        assert_eq!(record.tail_array(100).shape(), &[0, 2]);
    }

    #[test]
    fn output_accessors() {
        let output = SamplerOutput {
            chain: sample_record(),
            warm_up: Vec::new(),
        };
        assert_eq!(output.accepted_states().len(), 4);
        assert_eq!(output.candidate_states().len(), 4);
        assert!(output.warm_up_states().is_empty());
        assert_eq!(output.into_chain().len(), 4);
    }

    #[test]
    fn multi_chain_pooling() {
        let mut other = ChainRecord::start(vec![5.0, 5.0], 0.0, 2);
        other.push_rejected(vec![6.0, 6.0]);
        let multi = MultiChainRecord::merge(vec![sample_record(), other]);
        assert_eq!(multi.n_chains(), 2);
        assert_eq!(multi.acceptance_rates(), vec![2.0 / 3.0, 0.0]);

        let pooled = multi.pooled_tail(1);
        assert_eq!(pooled.shape(), &[4, 2]);
        assert_eq!(pooled.row(0).to_vec(), vec![1.0, 0.5]);
        assert_eq!(pooled.row(3).to_vec(), vec![5.0, 5.0]);
        assert_eq!(multi.into_chains().len(), 2);
    }
}
