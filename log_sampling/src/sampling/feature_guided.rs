//! Feature-guided sampling
//!
//! Traces are drawn from the partitions of a [`Partitioning`], steered by the alignment costs
//! observed so far. After every pick, each partition `p` with remaining members is scored as
//!
//! ```text
//! score(p) = boost(last_cost) / (size(p) * (taken(p) + 1))
//! boost(None) = 1,  boost(c) = 1 + ln(1 + c)  for c > 0
//! ```
//!
//! so small partitions go first and partitions with deviating traces are revisited.
//! Partitions whose last sampled trace fit the model (cost 0) drop below all others and are
//! only revisited by remaining size. Ties go to the partition occurring first in the log.
use std::{cmp::Reverse, time::Instant};

use ordered_float::OrderedFloat;
use tracing::{debug, info};

use crate::core::{
    event_data::case_centric::{EventLog, TraceSignature},
    process_models::case_centric::petri_net::{Marking, PetriNet},
};

use super::{
    alignment_cache::AlignmentCache,
    check_sample_size,
    error::SamplingError,
    partitioning::{Partition, Partitioning},
    sample::{Sample, SampleBuilder, SamplingTimes},
    LogSampler,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Conforming,
    Open,
}

type Priority = (Tier, OrderedFloat<f64>, usize, Reverse<usize>);

#[derive(Debug)]
struct PartitionState {
    size: usize,
    /// Unselected members with their signatures, in log order
    unselected: Vec<(usize, TraceSignature)>,
    taken: usize,
    last_cost: Option<f64>,
}

impl PartitionState {
    fn new(partition: &Partition, log: &EventLog) -> Self {
        Self {
            size: partition.size(),
            unselected: partition
                .trace_indices
                .iter()
                .filter_map(|&i| log.traces.get(i).map(|t| (i, t.signature())))
                .collect(),
            taken: 0,
            last_cost: None,
        }
    }

    fn priority(&self, position: usize) -> Priority {
        let boost = match self.last_cost {
            None => 1.0,
            Some(cost) if cost > 0.0 => 1.0 + cost.ln_1p(),
            Some(_) => {
                return (
                    Tier::Conforming,
                    OrderedFloat(0.0),
                    self.unselected.len(),
                    Reverse(position),
                )
            }
        };
        let score = boost / (self.size as f64 * (self.taken + 1) as f64);
        (Tier::Open, OrderedFloat(score), 0, Reverse(position))
    }

    /// Remove and return the first member with a signature not yet sampled, else the first member
    fn take_representative(&mut self, builder: &SampleBuilder) -> Option<usize> {
        let pos = self
            .unselected
            .iter()
            .position(|(_, signature)| !builder.contains_signature(signature))
            .unwrap_or(0);
        if pos < self.unselected.len() {
            Some(self.unselected.remove(pos).0)
        } else {
            None
        }
    }
}

///
/// Samples traces partition by partition, guided by alignment feedback
///
/// See the [module documentation](self) for the priority rule.
#[derive(Debug, Clone, Copy)]
pub struct FeatureGuidedSampler<'p> {
    partitioning: &'p Partitioning,
}

impl<'p> FeatureGuidedSampler<'p> {
    /// Sampler drawing from `partitioning`
    pub fn new(partitioning: &'p Partitioning) -> Self {
        Self { partitioning }
    }
}

impl LogSampler for FeatureGuidedSampler<'_> {
    fn construct_sample(
        &mut self,
        log: &EventLog,
        net: &PetriNet,
        initial_marking: &Marking,
        final_marking: &Marking,
        cache: &AlignmentCache,
        sample_size: usize,
    ) -> Result<Sample, SamplingError> {
        check_sample_size(sample_size)?;
        if self.partitioning.trace_count != log.traces.len() {
            return Err(SamplingError::PartitioningMismatch {
                expected: log.traces.len(),
                found: self.partitioning.trace_count,
            });
        }
        let start = Instant::now();
        let stats_before = cache.stats();

        let mut states: Vec<PartitionState> = self
            .partitioning
            .partitions
            .iter()
            .map(|partition| PartitionState::new(partition, log))
            .collect();
        let mut builder = SampleBuilder::new(sample_size);

        while !builder.is_full() {
            let Some(pos) = states
                .iter()
                .enumerate()
                .filter(|(_, state)| !state.unselected.is_empty())
                .max_by_key(|(pos, state)| state.priority(*pos))
                .map(|(pos, _)| pos)
            else {
                debug!("All partitions exhausted");
                break;
            };
            let state = &mut states[pos];
            let Some(trace_index) = state.take_representative(&builder) else {
                break;
            };
            let trace = log
                .traces
                .get(trace_index)
                .ok_or(SamplingError::PartitioningMismatch {
                    expected: log.traces.len(),
                    found: self.partitioning.trace_count,
                })?;
            let alignment = cache.get_or_compute(trace, net, initial_marking, final_marking)?;
            state.taken += 1;
            state.last_cost = Some(alignment.cost);
            debug!(
                partition = pos,
                trace = trace_index,
                cost = alignment.cost,
                "Picked trace {}",
                trace.signature()
            );
            builder.push(trace_index, trace, alignment);
        }

        let stats = cache.stats().since(&stats_before);
        let sampling = start.elapsed();
        let times = SamplingTimes {
            indexing: self.partitioning.indexing_time,
            partitioning: self.partitioning.partitioning_time,
            sampling,
            alignment: stats.oracle_time,
            total: self.partitioning.indexing_time + self.partitioning.partitioning_time + sampling,
        };
        info!(
            partitions = self.partitioning.len(),
            oracle_calls = stats.oracle_calls,
            "Feature-guided sample of {} traces",
            builder.len()
        );
        Ok(builder.finish(times, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sampling::{
            indexing::{Feature, FeatureVector, IndexConfig},
            partitioning::FeatureBasedPartitioning,
        },
        test_utils::{event_log_from_variants, simple_net, CountingOracle},
    };

    fn state(size: usize, taken: usize, last_cost: Option<f64>) -> PartitionState {
        PartitionState {
            size,
            unselected: (0..size - taken)
                .map(|i| (i, TraceSignature::default()))
                .collect(),
            taken,
            last_cost,
        }
    }

    #[test]
    fn smaller_partitions_first() {
        assert!(state(2, 0, None).priority(1) > state(8, 0, None).priority(0));
        // Ties go to the earlier partition
        assert!(state(4, 0, None).priority(0) > state(4, 0, None).priority(1));
    }

    #[test]
    fn deviations_promote_conformance_demotes() {
        // After one deviating pick, a partition outranks an untouched one of the same size
        assert!(state(8, 1, Some(3.0)).priority(1) > state(8, 0, None).priority(0));
        // Higher costs boost more
        assert!(state(8, 1, Some(3.0)).priority(1) > state(8, 1, Some(1.0)).priority(0));
        // A fitting partition falls behind even a much larger untouched one
        assert!(state(100, 0, None).priority(1) > state(2, 1, Some(0.0)).priority(0));
        // Among conforming partitions, larger remainders go first
        assert!(state(8, 1, Some(0.0)).priority(1) > state(4, 1, Some(0.0)).priority(0));
    }

    #[test]
    fn representatives_prefer_unseen_signatures() {
        let log = event_log_from_variants(&[(&["a"], 2), (&["b"], 1)]);
        let mut builder = SampleBuilder::new(3);
        builder.push(
            0,
            &log.traces[0],
            std::sync::Arc::new(crate::conformance::alignment::AlignmentResult::default()),
        );
        let partition = Partition {
            vector: FeatureVector(vec![]),
            trace_indices: vec![1, 2],
        };
        let mut state = PartitionState::new(&partition, &log);
        assert_eq!(state.take_representative(&builder), Some(2));
        assert_eq!(state.take_representative(&builder), Some(1));
        assert_eq!(state.take_representative(&builder), None);
    }

    #[test]
    fn deviating_partition_is_revisited() {
        // Two fitting traces, then three deviating ones with distinct signatures
        let log = event_log_from_variants(&[
            (&["a", "b"], 2),
            (&["a", "x"], 1),
            (&["a", "x", "x"], 1),
            (&["x", "a"], 1),
        ]);
        let (net, im, fm) = simple_net(&["a", "b"]);
        let config = IndexConfig::Selected(vec![Feature::Activity("x".into())]);
        let partitioning = FeatureBasedPartitioning::new(config)
            .partition(&log)
            .unwrap();
        assert_eq!(partitioning.sizes(), vec![2, 3]);
        let cache = AlignmentCache::with_oracle(CountingOracle::deviating_on(&["x"]));
        let sample = FeatureGuidedSampler::new(&partitioning)
            .construct_sample(&log, &net, &im, &fm, &cache, 4)
            .unwrap();
        // The smaller partition goes first; once it fits, the deviating one takes over
        assert_eq!(sample.trace_indices(), vec![0, 2, 3, 4]);
        let deviating = sample
            .traces
            .iter()
            .filter(|t| !t.alignment.is_fitting())
            .count();
        assert_eq!(deviating, 3);
    }

    #[test]
    fn covers_more_traces_than_partitions() {
        let log = event_log_from_variants(&[(&["a", "b"], 3), (&["a", "c"], 2)]);
        let (net, im, fm) = simple_net(&["a", "b"]);
        let partitioning = FeatureBasedPartitioning::new(IndexConfig::All)
            .partition(&log)
            .unwrap();
        let cache = AlignmentCache::with_oracle(CountingOracle::fitting());
        let sample = FeatureGuidedSampler::new(&partitioning)
            .construct_sample(&log, &net, &im, &fm, &cache, 4)
            .unwrap();
        assert_eq!(sample.len(), 4);
        assert_eq!(sample.stats.oracle_calls, 2);

        let sample = FeatureGuidedSampler::new(&partitioning)
            .construct_sample(&log, &net, &im, &fm, &cache, 10)
            .unwrap();
        assert_eq!(sample.len(), 5);
        assert_eq!(sample.stats.oracle_calls, 0);
    }

    #[test]
    fn rejects_foreign_partitioning() {
        let log = event_log_from_variants(&[(&["a"], 3)]);
        let other = event_log_from_variants(&[(&["a"], 2)]);
        let (net, im, fm) = simple_net(&["a"]);
        let partitioning = FeatureBasedPartitioning::default()
            .partition(&other)
            .unwrap();
        let cache = AlignmentCache::with_oracle(CountingOracle::fitting());
        let res = FeatureGuidedSampler::new(&partitioning)
            .construct_sample(&log, &net, &im, &fm, &cache, 1);
        assert!(matches!(
            res,
            Err(SamplingError::PartitioningMismatch {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn empty_partitioning_gives_empty_sample() {
        let log = EventLog::new();
        let (net, im, fm) = simple_net(&[]);
        let partitioning = FeatureBasedPartitioning::default().partition(&log).unwrap();
        let cache = AlignmentCache::with_oracle(CountingOracle::fitting());
        let sample = FeatureGuidedSampler::new(&partitioning)
            .construct_sample(&log, &net, &im, &fm, &cache, 3)
            .unwrap();
        assert!(sample.is_empty());
    }
}
