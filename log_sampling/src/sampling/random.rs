use std::time::Instant;

use rand::{rngs::StdRng, SeedableRng};
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
/// Baseline drawing traces uniformly at random, without replacement
///
/// Selection ignores alignment feedback, but every selected trace is still aligned through
/// the [`AlignmentCache`].
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    /// Sampler seeded with `seed`, or from the operating system if `None`
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }
}

impl LogSampler for RandomSampler {
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

        let amount = sample_size.min(log.traces.len());
        let picks: Vec<usize> = if amount == 0 {
            Vec::new()
        } else {
            rand::seq::index::sample(&mut self.rng, log.traces.len(), amount).into_vec()
        };
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
            oracle_calls = stats.oracle_calls,
            "Random sample of {} traces",
            builder.len()
        );
        Ok(builder.finish(times, stats))
    }
}
