/*!
# Saving Chain Records to CSV

Writes chain records in a flat, per-iteration layout that an external plotting or
animation tool can read without knowing anything about this crate. Enable via the
`csv` feature.
*/

use num_traits::Float;
use std::error::Error;
use std::fmt::Display;
use std::fs::File;
use std::io::Write;

use csv::Writer;

use crate::chain::{ChainRecord, MultiChainRecord, Transition};

fn header(ndim: usize) -> Vec<String> {
    let mut header: Vec<String> = vec!["chain".to_string(), "iteration".to_string()];
    header.extend((0..ndim).map(|i| format!("accepted_{}", i)));
    header.extend((0..ndim).map(|i| format!("candidate_{}", i)));
    header.push("log_density".to_string());
    header.push("transition".to_string());
    header.push("acceptance_rate".to_string());
    header
}

fn transition_label(t: Transition) -> &'static str {
    match t {
        Transition::Initial => "initial",
        Transition::Accepted => "accepted",
        Transition::Rejected => "rejected",
    }
}

fn write_rows<T, W>(wtr: &mut Writer<W>, chain_idx: usize, chain: &ChainRecord<T>) -> csv::Result<()>
where
    T: Float + Display,
    W: Write,
{
    for step in chain.steps() {
        let mut row = vec![chain_idx.to_string(), step.index.to_string()];
        row.extend(step.accepted_state.iter().map(|v| v.to_string()));
        row.extend(step.candidate_state.iter().map(|v| v.to_string()));
        row.push(step.log_density.to_string());
        row.push(transition_label(step.transition).to_string());
        row.push(chain.acceptance_rate_at(step.index).unwrap_or(0.0).to_string());
        wtr.write_record(&row)?;
    }
    Ok(())
}

/**
Saves one chain record as CSV.

Columns: `chain`, `iteration`, `accepted_0..`, `candidate_0..`, `log_density`,
`transition` (`initial`, `accepted` or `rejected`) and the running `acceptance_rate`.

# Examples

```rust
use mh_sampler::distributions::{DiagonalGaussian, IsotropicGaussian};
use mh_sampler::io::csv::save_csv;
use mh_sampler::run_sampler;

let proposal = IsotropicGaussian::new(1.0).unwrap();
let output = run_sampler(DiagonalGaussian::standard(2), proposal, vec![0.0, 0.0], 10, 0, 1)?;
save_csv(&output.chain, "/tmp/chain.csv")?;
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/
pub fn save_csv<T: Float + Display>(chain: &ChainRecord<T>, filename: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    wtr.write_record(header(chain.ndim()))?;
    write_rows(&mut wtr, 0, chain)?;
    wtr.flush()?;
    Ok(())
}

/// Saves every chain of a multi-chain run into one CSV file, in the layout of [`save_csv`].
pub fn save_csv_chains<T: Float + Display>(
    chains: &MultiChainRecord<T>,
    filename: &str,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    let ndim = chains.chains().first().map_or(0, |c| c.ndim());
    wtr.write_record(header(ndim))?;
    for (chain_idx, chain) in chains.chains().iter().enumerate() {
        write_rows(&mut wtr, chain_idx, chain)?;
    }
    wtr.flush()?;
    Ok(())
}
