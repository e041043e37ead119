//! Guided trace sampling
//!
//! Selects a small set of traces from an event log for alignment-based conformance checking.
//! Four strategies implement [`LogSampler`]:
//!
//! - [`FeatureGuidedSampler`]: draws from a [`Partitioning`] of the log, steered by alignment costs
//! - [`SequenceGuidedSampler`]: walks the log in batches, one trace per unseen behavior
//! - [`RandomSampler`]: uniform baseline
//! - [`LongestVariantSampler`]: longest trace variants baseline
//!
//! All of them resolve alignments through a shared [`AlignmentCache`], so every distinct
//! trace variant is aligned at most once. [`construct_sample`] runs one strategy as configured
//! by a [`SamplingConfig`].
use std::{collections::HashSet, path::Path, time::Instant};

use itertools::Itertools;
use tracing::{info, warn};

use crate::core::{
    event_data::case_centric::{
        xes::{import_xes_file, XESImportOptions},
        EventLog,
    },
    process_models::case_centric::petri_net::{Marking, PetriNet},
};

pub mod alignment_cache;
pub mod config;
pub mod error;
pub mod feature_guided;
pub mod indexing;
pub mod longest_variant;
pub mod partitioning;
pub mod random;
pub mod sample;
pub mod sequence_guided;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use alignment_cache::{AlignmentCache, CacheStats};
#[doc(inline)]
pub use config::{SamplingAlgorithm, SamplingConfig};
#[doc(inline)]
pub use error::{ErrorKind, SamplingError};
#[doc(inline)]
pub use feature_guided::FeatureGuidedSampler;
#[doc(inline)]
pub use indexing::{Feature, FeatureIndex, FeatureValue, FeatureVector, IndexConfig};
#[doc(inline)]
pub use longest_variant::LongestVariantSampler;
#[doc(inline)]
pub use partitioning::{FeatureBasedPartitioning, Partition, Partitioning};
#[doc(inline)]
pub use random::RandomSampler;
#[doc(inline)]
pub use sample::{Sample, SampledTrace, SamplingTimes};
#[doc(inline)]
pub use sequence_guided::SequenceGuidedSampler;

///
/// A trace sampling strategy
///
pub trait LogSampler {
    ///
    /// Select at most `sample_size` distinct traces of `log`
    ///
    /// Alignments of selected traces against `net` are resolved through `cache`.
    /// Fails with [`SamplingError::InvalidSampleSize`] if `sample_size` is zero.
    fn construct_sample(
        &mut self,
        log: &EventLog,
        net: &PetriNet,
        initial_marking: &Marking,
        final_marking: &Marking,
        cache: &AlignmentCache,
        sample_size: usize,
    ) -> Result<Sample, SamplingError>;
}

pub(crate) fn check_sample_size(sample_size: usize) -> Result<(), SamplingError> {
    if sample_size == 0 {
        return Err(SamplingError::InvalidSampleSize(0));
    }
    Ok(())
}

///
/// Load an event log (XES, optionally gzipped) and a Petri net (PNML)
///
/// Returns the log, the net, its initial marking and its first final marking.
pub fn load_inputs<P, Q>(
    log_path: P,
    model_path: Q,
) -> Result<(EventLog, PetriNet, Marking, Marking), SamplingError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    info!("Loading event log {}", log_path.as_ref().display());
    let log = import_xes_file(log_path, XESImportOptions::default())?;
    info!("Loading model {}", model_path.as_ref().display());
    let net = PetriNet::import_pnml(model_path)?;
    let (initial_marking, final_marking) = net
        .initial_and_final_marking()
        .map(|(im, fm)| (im.clone(), fm.clone()))
        .ok_or(SamplingError::MissingMarking)?;
    let labels: HashSet<&str> = net.visible_labels().into_iter().collect();
    let unmodelled: Vec<&str> = log
        .traces
        .iter()
        .flat_map(|t| t.activities())
        .filter(|a| !labels.contains(a))
        .unique()
        .collect();
    if !unmodelled.is_empty() {
        warn!(
            "{} activities of the log have no visible transition in the model: {:?}",
            unmodelled.len(),
            unmodelled
        );
    }
    info!(
        places = net.places.len(),
        transitions = net.transitions.len(),
        "Loaded {} traces",
        log.traces.len()
    );
    Ok((log, net, initial_marking, final_marking))
}

///
/// Construct a sample of `log` as configured by `config`
///
/// For feature-guided sampling, the log is partitioned first; the sample's times include
/// indexing and partitioning. `times.total` covers the whole call.
pub fn construct_sample(
    config: &SamplingConfig,
    log: &EventLog,
    net: &PetriNet,
    initial_marking: &Marking,
    final_marking: &Marking,
    cache: &AlignmentCache,
) -> Result<Sample, SamplingError> {
    check_sample_size(config.sample_size)?;
    let start = Instant::now();
    let size = config.sample_size;
    let mut sample = match config.algorithm {
        SamplingAlgorithm::Feature => {
            let partitioning = FeatureBasedPartitioning::new(config.index.clone()).partition(log)?;
            info!(
                partitions = partitioning.len(),
                "Partitioned log in {:.3}s",
                (partitioning.indexing_time + partitioning.partitioning_time).as_secs_f64()
            );
            FeatureGuidedSampler::new(&partitioning).construct_sample(
                log,
                net,
                initial_marking,
                final_marking,
                cache,
                size,
            )?
        }
        SamplingAlgorithm::Behavioural => SequenceGuidedSampler::new(config.batch_size)?
            .construct_sample(log, net, initial_marking, final_marking, cache, size)?,
        SamplingAlgorithm::Random => RandomSampler::new(config.seed).construct_sample(
            log,
            net,
            initial_marking,
            final_marking,
            cache,
            size,
        )?,
        SamplingAlgorithm::Longest => LongestVariantSampler.construct_sample(
            log,
            net,
            initial_marking,
            final_marking,
            cache,
            size,
        )?,
    };
    sample.times.total = start.elapsed();
    info!(
        algorithm = %config.algorithm,
        fitting = sample.fitting_count(),
        "Sampled {} of {} traces",
        sample.len(),
        log.traces.len()
    );
    Ok(sample)
}
