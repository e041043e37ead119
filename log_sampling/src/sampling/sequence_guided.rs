use std::{cmp::Reverse, collections::HashSet, time::Instant};

use itertools::Itertools;
use tracing::{debug, info};

use crate::core::{
    event_data::case_centric::{EventLog, Trace, TraceSignature},
    process_models::case_centric::petri_net::{Marking, PetriNet},
};

use super::{
    alignment_cache::AlignmentCache,
    check_sample_size,
    error::SamplingError,
    sample::{Sample, SampleBuilder, SamplingTimes},
    LogSampler,
};

/// Default number of traces per batch
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Behavior covered by the sample so far
#[derive(Debug, Default)]
struct Coverage {
    df_pairs: HashSet<(String, String)>,
    deviating: HashSet<String>,
}

impl Coverage {
    /// Uncovered directly-follows pairs plus activities known to deviate
    fn novelty(&self, trace: &Trace) -> usize {
        let new_pairs = trace
            .activities()
            .tuple_windows()
            .unique()
            .filter(|(a, b)| !self.df_pairs.contains(&(a.to_string(), b.to_string())))
            .count();
        let deviating = trace
            .activities()
            .unique()
            .filter(|a| self.deviating.contains(*a))
            .count();
        new_pairs + deviating
    }

    fn record<'a>(&mut self, trace: &Trace, deviating: impl Iterator<Item = &'a str>) {
        self.df_pairs.extend(
            trace
                .activities()
                .tuple_windows()
                .map(|(a, b): (&str, &str)| (a.to_string(), b.to_string())),
        );
        self.deviating.extend(deviating.map(str::to_string));
    }
}

///
/// Samples traces batch by batch, picking one trace per unseen behavior
///
/// The log is consumed in log order in batches of `batch_size` traces. Within a batch, the
/// first trace of every [`TraceSignature`] not yet in the sample is a candidate. If a batch
/// offers more candidates than there is room left, candidates covering more unseen
/// directly-follows pairs and more activities already seen deviating are preferred.
#[derive(Debug, Clone, Copy)]
pub struct SequenceGuidedSampler {
    batch_size: usize,
}

impl Default for SequenceGuidedSampler {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl SequenceGuidedSampler {
    /// Sampler consuming `batch_size` traces per step
    pub fn new(batch_size: usize) -> Result<Self, SamplingError> {
        if batch_size == 0 {
            return Err(SamplingError::InvalidBatchSize);
        }
        Ok(Self { batch_size })
    }

    /// Number of traces per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl LogSampler for SequenceGuidedSampler {
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
        let start = Instant::now();
        let stats_before = cache.stats();
        let mut builder = SampleBuilder::new(sample_size);
        let mut coverage = Coverage::default();
        let mut batches = 0usize;

        for (batch_no, batch) in log.traces.chunks(self.batch_size).enumerate() {
            if builder.is_full() {
                break;
            }
            batches += 1;
            let offset = batch_no * self.batch_size;
            let mut batch_signatures: HashSet<TraceSignature> = HashSet::new();
            let mut candidates: Vec<usize> = Vec::new();
            for (i, trace) in batch.iter().enumerate() {
                let signature = trace.signature();
                if !builder.contains_signature(&signature) && batch_signatures.insert(signature) {
                    candidates.push(offset + i);
                }
            }
            if candidates.len() > builder.remaining() {
                // Stable sort: equally novel candidates keep log order
                candidates.sort_by_cached_key(|&i| Reverse(coverage.novelty(&log.traces[i])));
                candidates.truncate(builder.remaining());
            }
            if candidates.is_empty() {
                continue;
            }

            let traces: Vec<&Trace> = candidates.iter().map(|&i| &log.traces[i]).collect();
            let alignments = cache.resolve_all(&traces, net, initial_marking, final_marking)?;
            for ((trace_index, trace), alignment) in candidates.iter().zip(traces).zip(alignments) {
                coverage.record(trace, alignment.deviating_activities());
                debug!(
                    batch = batch_no,
                    trace = trace_index,
                    cost = alignment.cost,
                    "Picked trace {}",
                    trace.signature()
                );
                builder.push(*trace_index, trace, alignment);
            }
        }

        let stats = cache.stats().since(&stats_before);
        let sampling = start.elapsed();
        let times = SamplingTimes {
            sampling,
            alignment: stats.oracle_time,
            total: sampling,
            ..Default::default()
        };
        info!(
            batches,
            oracle_calls = stats.oracle_calls,
            "Sequence-guided sample of {} traces",
            builder.len()
        );
        Ok(builder.finish(times, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conformance::alignment::{AlignmentMove, AlignmentResult},
        test_utils::{event_log_from_variants, simple_net, CountingOracle},
    };

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(matches!(
            SequenceGuidedSampler::new(0),
            Err(SamplingError::InvalidBatchSize)
        ));
        assert_eq!(SequenceGuidedSampler::default().batch_size(), 5);
    }

    #[test]
    fn one_trace_per_signature() {
        // Batches: [ab, ab, ab] [ac, ac, ab] [b]
        let log = event_log_from_variants(&[
            (&["a", "b"], 3),
            (&["a", "c"], 2),
            (&["a", "b"], 1),
            (&["b"], 1),
        ]);
        let (net, im, fm) = simple_net(&["a", "b", "c"]);
        let cache = AlignmentCache::with_oracle(CountingOracle::fitting());
        let sample = SequenceGuidedSampler::new(3)
            .unwrap()
            .construct_sample(&log, &net, &im, &fm, &cache, 10)
            .unwrap();
        assert_eq!(sample.trace_indices(), vec![0, 3, 6]);
        assert_eq!(sample.stats.oracle_calls, 3);
    }

    #[test]
    fn stops_at_target_size() {
        let log = event_log_from_variants(&[(&["a"], 1), (&["b"], 1), (&["c"], 1), (&["d"], 1)]);
        let (net, im, fm) = simple_net(&["a", "b", "c", "d"]);
        let oracle = CountingOracle::fitting();
        let calls = oracle.calls();
        let cache = AlignmentCache::with_oracle(oracle);
        let sample = SequenceGuidedSampler::new(2)
            .unwrap()
            .construct_sample(&log, &net, &im, &fm, &cache, 3)
            .unwrap();
        assert_eq!(sample.trace_indices(), vec![0, 1, 2]);
        // The last trace is never aligned
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn known_deviations_win_when_budget_is_short() {
        // Batches: [a x] [b] | [c] [x]
        let log = event_log_from_variants(&[
            (&["a", "x"], 1),
            (&["b"], 1),
            (&["c"], 1),
            (&["x"], 1),
        ]);
        let (net, im, fm) = simple_net(&["a", "b", "c"]);
        let cache = AlignmentCache::with_oracle(CountingOracle::new(|activities| {
            let moves = activities
                .iter()
                .filter(|a| **a == "x")
                .map(|a| AlignmentMove::LogMove(a.to_string()))
                .collect::<Vec<_>>();
            Ok(AlignmentResult::new(moves.len() as f64, moves))
        }));
        let sample = SequenceGuidedSampler::new(2)
            .unwrap()
            .construct_sample(&log, &net, &im, &fm, &cache, 3)
            .unwrap();
        assert_eq!(sample.trace_indices(), vec![0, 1, 3]);
    }

    #[test]
    fn novelty_counts_uncovered_pairs_and_deviating_activities() {
        let log = event_log_from_variants(&[(&["a", "b", "c"], 1), (&["a", "b", "x"], 1)]);
        let mut coverage = Coverage::default();
        assert_eq!(coverage.novelty(&log.traces[0]), 2);
        let alignment = AlignmentResult::new(1.0, vec![AlignmentMove::LogMove("x".into())]);
        coverage.record(&log.traces[0], alignment.deviating_activities());
        assert_eq!(coverage.novelty(&log.traces[0]), 0);
        coverage.record(&log.traces[1], alignment.deviating_activities());
        // (b, x) is covered now, x is a known deviation
        assert_eq!(coverage.novelty(&log.traces[1]), 1);
    }

    #[test]
    fn deviating_batches_are_ranked_by_novelty() {
        // One batch, budget 2: [a b], [c d], [a b x] have novelty 1, 1, 2
        let log = event_log_from_variants(&[
            (&["a", "b"], 1),
            (&["c", "d"], 1),
            (&["a", "b", "x"], 1),
        ]);
        let (net, im, fm) = simple_net(&["a", "b", "c", "d"]);
        let cache = AlignmentCache::with_oracle(CountingOracle::fitting());
        let sample = SequenceGuidedSampler::new(3)
            .unwrap()
            .construct_sample(&log, &net, &im, &fm, &cache, 2)
            .unwrap();
        assert_eq!(sample.trace_indices(), vec![2, 0]);
    }
}
