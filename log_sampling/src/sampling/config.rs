use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{error::SamplingError, indexing::IndexConfig, sequence_guided::DEFAULT_BATCH_SIZE};

///
/// Available sampling strategies
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplingAlgorithm {
    /// Feature-guided sampling over a partitioning of the log (`feature`)
    Feature,
    /// Sequence-guided sampling in batches (`behavioural`)
    Behavioural,
    /// Uniform random baseline (`Random`)
    Random,
    /// Longest trace variants baseline (`Longest`)
    Longest,
}

impl SamplingAlgorithm {
    /// All algorithms
    pub fn all() -> &'static [Self] {
        &[
            SamplingAlgorithm::Feature,
            SamplingAlgorithm::Behavioural,
            SamplingAlgorithm::Random,
            SamplingAlgorithm::Longest,
        ]
    }
}

impl Display for SamplingAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SamplingAlgorithm::Feature => "feature",
            SamplingAlgorithm::Behavioural => "behavioural",
            SamplingAlgorithm::Random => "Random",
            SamplingAlgorithm::Longest => "Longest",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SamplingAlgorithm {
    type Err = SamplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "feature" => Ok(SamplingAlgorithm::Feature),
            "behavioural" | "behavioral" => Ok(SamplingAlgorithm::Behavioural),
            "random" => Ok(SamplingAlgorithm::Random),
            "longest" => Ok(SamplingAlgorithm::Longest),
            _ => Err(SamplingError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

///
/// Options for one sampling run
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sampling strategy
    pub algorithm: SamplingAlgorithm,
    /// Maximal number of traces in the sample
    pub sample_size: usize,
    /// Features used to partition the log (feature-guided sampling only)
    pub index: IndexConfig,
    /// Traces per batch (sequence-guided sampling only)
    pub batch_size: usize,
    /// Seed of the random baseline (seeded from the operating system if `None`)
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            algorithm: SamplingAlgorithm::Feature,
            sample_size: 100,
            index: IndexConfig::All,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: None,
        }
    }
}

impl SamplingConfig {
    /// Default options for `algorithm` and `sample_size`
    pub fn new(algorithm: SamplingAlgorithm, sample_size: usize) -> Self {
        Self {
            algorithm,
            sample_size,
            ..Default::default()
        }
    }
}
