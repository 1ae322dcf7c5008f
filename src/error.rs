//! Error types returned by the sampler.
//!
//! Configuration problems are reported through [`ConfigError`] before any sampling
//! starts. Contract violations by a plugged-in target or proposal are reported through
//! [`SamplerError`] at the iteration where they are detected.

use thiserror::Error;

/// A run configuration that cannot be sampled.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("warm-up is not implemented yet (requested {requested} warm-up iterations, must be 0)")]
    WarmUpNotImplemented { requested: usize },

    #[error("iterations must be at least 1")]
    NoIterations,

    #[error("initial location must have at least one dimension")]
    EmptyState,

    #[error("dimension mismatch: initial location has {expected} dimensions but the {component} has {found}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        component: &'static str,
    },

    #[error("invalid value {value} for parameter `{name}`")]
    InvalidParameter { name: &'static str, value: f64 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The target returned NaN or an infinity. Out-of-support points must use a
    /// finite sentinel instead.
    #[error("target log-density is not finite at iteration {iteration}: {value}")]
    NonFiniteLogDensity { iteration: usize, value: f64 },

    /// The proposal returned a candidate of the wrong length.
    #[error("proposal returned a {found}-dimensional candidate at iteration {iteration}, expected {expected}")]
    CandidateDimension {
        iteration: usize,
        expected: usize,
        found: usize,
    },

    /// The proposal returned a negative or NaN ratio factor.
    #[error("proposal ratio factor is invalid at iteration {iteration}: {value}")]
    InvalidProposalFactor { iteration: usize, value: f64 },
}

pub type Result<T> = std::result::Result<T, SamplerError>;
