use std::{collections::HashSet, fmt::Display, sync::Arc, time::Duration};

use crate::{
    conformance::alignment::AlignmentResult,
    core::event_data::case_centric::{Trace, TraceSignature},
};

use super::alignment_cache::CacheStats;

///
/// Elapsed time per sampling phase
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplingTimes {
    /// Computing feature vectors
    pub indexing: Duration,
    /// Grouping traces into partitions
    pub partitioning: Duration,
    /// The selection loop (including alignment lookups)
    pub sampling: Duration,
    /// Time spent inside the alignment oracle
    pub alignment: Duration,
    /// Whole run
    pub total: Duration,
}

impl Display for SamplingTimes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "indexing: {:.3}s, partitioning: {:.3}s, sampling: {:.3}s, alignment: {:.3}s, total: {:.3}s",
            self.indexing.as_secs_f64(),
            self.partitioning.as_secs_f64(),
            self.sampling.as_secs_f64(),
            self.alignment.as_secs_f64(),
            self.total.as_secs_f64(),
        )
    }
}

///
/// A selected trace together with its alignment
///
#[derive(Debug, Clone)]
pub struct SampledTrace {
    /// Position of the trace in the event log
    pub trace_index: usize,
    /// The trace itself
    pub trace: Trace,
    /// Alignment of the trace against the process model
    pub alignment: Arc<AlignmentResult>,
}

///
/// Result of a sampling run
///
/// Never contains the same trace twice.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    /// Selected traces, in selection order
    pub traces: Vec<SampledTrace>,
    /// Phase timings
    pub times: SamplingTimes,
    /// Cache hits and oracle calls caused by this run
    pub stats: CacheStats,
}

impl Sample {
    /// Number of selected traces
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Whether no trace was selected
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    /// Log positions of the selected traces, in selection order
    pub fn trace_indices(&self) -> Vec<usize> {
        self.traces.iter().map(|t| t.trace_index).collect()
    }

    /// Number of selected traces that fit the model
    pub fn fitting_count(&self) -> usize {
        self.traces
            .iter()
            .filter(|t| t.alignment.is_fitting())
            .count()
    }

    /// Sum of the alignment costs of all selected traces
    pub fn total_cost(&self) -> f64 {
        self.traces.iter().map(|t| t.alignment.cost).sum()
    }
}

/// Accumulates a [`Sample`] while rejecting duplicate traces
#[derive(Debug)]
pub(crate) struct SampleBuilder {
    target_size: usize,
    traces: Vec<SampledTrace>,
    selected: HashSet<usize>,
    signatures: HashSet<TraceSignature>,
}

impl SampleBuilder {
    pub(crate) fn new(target_size: usize) -> Self {
        Self {
            target_size,
            traces: Vec::with_capacity(target_size),
            selected: HashSet::new(),
            signatures: HashSet::new(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.traces.len()
    }

    pub(crate) fn is_full(&self) -> bool {
        self.traces.len() >= self.target_size
    }

    pub(crate) fn remaining(&self) -> usize {
        self.target_size.saturating_sub(self.traces.len())
    }

    pub(crate) fn contains_signature(&self, signature: &TraceSignature) -> bool {
        self.signatures.contains(signature)
    }

    /// Add a trace; returns `false` (and ignores it) if it was already selected or the sample is full
    pub(crate) fn push(
        &mut self,
        trace_index: usize,
        trace: &Trace,
        alignment: Arc<AlignmentResult>,
    ) -> bool {
        if self.is_full() || !self.selected.insert(trace_index) {
            return false;
        }
        self.signatures.insert(trace.signature());
        self.traces.push(SampledTrace {
            trace_index,
            trace: trace.clone(),
            alignment,
        });
        true
    }

    pub(crate) fn finish(self, times: SamplingTimes, stats: CacheStats) -> Sample {
        Sample {
            traces: self.traces,
            times,
            stats,
        }
    }
}
