use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use rayon::prelude::*;
use tracing::debug;

use crate::core::event_data::case_centric::EventLog;

use super::{
    error::SamplingError,
    indexing::{FeatureIndex, FeatureVector, IndexConfig},
};

///
/// Group of traces sharing one [`FeatureVector`]
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Shared feature vector
    pub vector: FeatureVector,
    /// Member trace indices, in log order (never empty)
    pub trace_indices: Vec<usize>,
}

impl Partition {
    /// Number of member traces
    pub fn size(&self) -> usize {
        self.trace_indices.len()
    }
}

///
/// Exhaustive, disjoint grouping of all traces of an [`EventLog`]
///
/// Partitions are ordered by the first occurrence of their vector in the log.
#[derive(Debug, Clone)]
pub struct Partitioning {
    /// Partitions
    pub partitions: Vec<Partition>,
    /// Number of traces of the partitioned log
    pub trace_count: usize,
    /// Time spent computing feature vectors
    pub indexing_time: Duration,
    /// Time spent grouping traces by vector
    pub partitioning_time: Duration,
}

impl Partitioning {
    /// Sizes of all partitions, in partition order
    pub fn sizes(&self) -> Vec<usize> {
        self.partitions.iter().map(Partition::size).collect()
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Whether there are no partitions (i.e., the log was empty)
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

///
/// Partitions an event log by the [`FeatureVector`]s of its traces
///
#[derive(Debug, Clone, Default)]
pub struct FeatureBasedPartitioning {
    config: IndexConfig,
}

impl FeatureBasedPartitioning {
    /// Partitioning by the features in `config`
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    ///
    /// Partition `log`
    ///
    /// Feature vectors are computed in parallel, grouping is a single pass over the log.
    pub fn partition(&self, log: &EventLog) -> Result<Partitioning, SamplingError> {
        let indexing_start = Instant::now();
        let index = FeatureIndex::resolve(log, &self.config)?;
        let vectors: Vec<FeatureVector> = log
            .traces
            .par_iter()
            .map(|trace| index.vector(log, trace))
            .collect();
        let indexing_time = indexing_start.elapsed();

        let partitioning_start = Instant::now();
        let mut partition_pos: HashMap<FeatureVector, usize> = HashMap::new();
        let mut partitions: Vec<Partition> = Vec::new();
        for (trace_index, vector) in vectors.into_iter().enumerate() {
            match partition_pos.get(&vector) {
                Some(&pos) => partitions[pos].trace_indices.push(trace_index),
                None => {
                    partition_pos.insert(vector.clone(), partitions.len());
                    partitions.push(Partition {
                        vector,
                        trace_indices: vec![trace_index],
                    });
                }
            }
        }
        let partitioning_time = partitioning_start.elapsed();
        debug!(
            features = index.features().len(),
            partitions = partitions.len(),
            "Partitioned {} traces",
            log.traces.len()
        );

        Ok(Partitioning {
            partitions,
            trace_count: log.traces.len(),
            indexing_time,
            partitioning_time,
        })
    }
}
