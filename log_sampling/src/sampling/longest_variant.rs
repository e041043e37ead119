use std::{cmp::Reverse, time::Instant};

use tracing::info;

use crate::core::{
    event_data::case_centric::{EventLog, Trace},
    process_models::case_centric::petri_net::{Marking, PetriNet},
};

use super::{
    alignment_cache::AlignmentCache,
    check_sample_size,
    error::SamplingError,
    sample::{Sample, SampleBuilder, SamplingTimes},
    LogSampler,
};

///
/// Baseline selecting the representatives of the longest trace variants
///
/// Variants are ranked by their number of events; equally long variants keep the order of
/// their first occurrence. Each variant contributes its first trace.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongestVariantSampler;

impl LogSampler for LongestVariantSampler {
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

        let mut variants = log.variants();
        variants.sort_by_key(|v| Reverse(v.event_count));
        let picks: Vec<usize> = variants
            .iter()
            .take(sample_size)
            .map(|v| v.representative())
            .collect();
        let traces: Vec<&Trace> = picks.iter().map(|&i| &log.traces[i]).collect();
        let alignments = cache.resolve_all(&traces, net, initial_marking, final_marking)?;

        let mut builder = SampleBuilder::new(sample_size);
        for ((trace_index, trace), alignment) in picks.into_iter().zip(traces).zip(alignments) {
            builder.push(trace_index, trace, alignment);
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
            variants = variants.len(),
            oracle_calls = stats.oracle_calls,
            "Longest-variant sample of {} traces",
            builder.len()
        );
        Ok(builder.finish(times, stats))
    }
}
