use std::{
    collections::HashMap,
    path::Path,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    conformance::alignment::{AlignmentOracle, AlignmentResult},
    core::{
        event_data::case_centric::{EventLog, Trace, TraceSignature},
        process_models::case_centric::petri_net::{Marking, PetriNet},
    },
};

use super::error::SamplingError;

type Slot = Arc<Mutex<Option<Arc<AlignmentResult>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum AlignmentSource {
    Oracle(Box<dyn AlignmentOracle>),
    Preloaded,
}

///
/// Counters of an [`AlignmentCache`]
///
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered without calling the oracle
    pub hits: usize,
    /// Oracle invocations
    pub oracle_calls: usize,
    /// Time spent inside the oracle
    pub oracle_time: Duration,
}

impl CacheStats {
    /// Counters accumulated after `earlier` was taken
    pub fn since(&self, earlier: &CacheStats) -> CacheStats {
        CacheStats {
            hits: self.hits.saturating_sub(earlier.hits),
            oracle_calls: self.oracle_calls.saturating_sub(earlier.oracle_calls),
            oracle_time: self.oracle_time.saturating_sub(earlier.oracle_time),
        }
    }
}

///
/// Memoizes [`AlignmentResult`]s by [`TraceSignature`]
///
/// The cache either wraps a live [`AlignmentOracle`], which is called at most once per signature,
/// or is preloaded with precomputed alignments, in which case a lookup for an unknown signature
/// is a [`SamplingError::PreloadMiss`].
///
/// Lookups may run concurrently: every signature owns a slot with its own lock, so a second
/// caller for the same signature waits for the first oracle call and reuses its result.
/// Failed oracle calls leave the slot empty.
pub struct AlignmentCache {
    slots: Mutex<HashMap<TraceSignature, Slot>>,
    source: AlignmentSource,
    hits: AtomicUsize,
    oracle_calls: AtomicUsize,
    oracle_nanos: AtomicU64,
}

impl std::fmt::Debug for AlignmentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignmentCache")
            .field("preloaded", &self.is_preloaded())
            .field("signatures", &lock(&self.slots).len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl AlignmentCache {
    fn with_source(source: AlignmentSource, slots: HashMap<TraceSignature, Slot>) -> Self {
        Self {
            slots: Mutex::new(slots),
            source,
            hits: AtomicUsize::new(0),
            oracle_calls: AtomicUsize::new(0),
            oracle_nanos: AtomicU64::new(0),
        }
    }

    /// Empty cache computing missing alignments with `oracle`
    pub fn with_oracle<O: AlignmentOracle + 'static>(oracle: O) -> Self {
        Self::with_boxed_oracle(Box::new(oracle))
    }

    /// Empty cache computing missing alignments with a boxed `oracle`
    pub fn with_boxed_oracle(oracle: Box<dyn AlignmentOracle>) -> Self {
        Self::with_source(AlignmentSource::Oracle(oracle), HashMap::new())
    }

    ///
    /// Cache answering only from the given entries
    ///
    /// For repeated signatures, the first entry wins.
    pub fn preloaded<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (TraceSignature, AlignmentResult)>,
    {
        let mut slots: HashMap<TraceSignature, Slot> = HashMap::new();
        for (signature, alignment) in entries {
            slots
                .entry(signature)
                .or_insert_with(|| Arc::new(Mutex::new(Some(Arc::new(alignment)))));
        }
        Self::with_source(AlignmentSource::Preloaded, slots)
    }

    ///
    /// Cache preloaded with one alignment per trace of `log`, in log order
    ///
    pub fn from_trace_alignments(
        log: &EventLog,
        alignments: Vec<AlignmentResult>,
    ) -> Result<Self, SamplingError> {
        if alignments.len() != log.traces.len() {
            return Err(SamplingError::PreloadCountMismatch {
                expected: log.traces.len(),
                found: alignments.len(),
            });
        }
        Ok(Self::preloaded(log.signatures().into_iter().zip(alignments)))
    }

    ///
    /// Load preloaded alignments from a JSON file
    ///
    /// The file holds a JSON array of [`AlignmentResult`]s, one per trace of `log`, in log order.
    pub fn load_preloaded<P: AsRef<Path>>(path: P, log: &EventLog) -> Result<Self, SamplingError> {
        let text = std::fs::read_to_string(path).map_err(SamplingError::PreloadIO)?;
        let alignments: Vec<AlignmentResult> =
            serde_json::from_str(&text).map_err(SamplingError::PreloadFormat)?;
        let cache = Self::from_trace_alignments(log, alignments)?;
        info!(
            "Loaded alignments for {} distinct trace variants",
            lock(&cache.slots).len()
        );
        Ok(cache)
    }

    /// Whether this cache answers only from preloaded alignments
    pub fn is_preloaded(&self) -> bool {
        matches!(self.source, AlignmentSource::Preloaded)
    }

    /// Whether an alignment for `signature` is stored
    pub fn contains(&self, signature: &TraceSignature) -> bool {
        let slot = lock(&self.slots).get(signature).cloned();
        match slot {
            Some(slot) => {
                let stored = lock(&slot);
                stored.is_some()
            }
            None => false,
        }
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            oracle_calls: self.oracle_calls.load(Ordering::Relaxed),
            oracle_time: Duration::from_nanos(self.oracle_nanos.load(Ordering::Relaxed)),
        }
    }

    ///
    /// Look up the alignment of `trace`, calling the oracle on a miss
    ///
    pub fn get_or_compute(
        &self,
        trace: &Trace,
        net: &PetriNet,
        initial_marking: &Marking,
        final_marking: &Marking,
    ) -> Result<Arc<AlignmentResult>, SamplingError> {
        let signature = trace.signature();
        let oracle = match &self.source {
            AlignmentSource::Oracle(oracle) => oracle,
            AlignmentSource::Preloaded => {
                let slot = lock(&self.slots).get(&signature).cloned();
                let alignment = match slot {
                    Some(slot) => {
                        let stored = lock(&slot);
                        stored.clone()
                    }
                    None => None,
                };
                return match alignment {
                    Some(alignment) => {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        Ok(alignment)
                    }
                    None => Err(SamplingError::PreloadMiss(signature)),
                };
            }
        };

        let slot = lock(&self.slots)
            .entry(signature.clone())
            .or_default()
            .clone();
        let mut stored = lock(&slot);
        if let Some(alignment) = stored.as_ref() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(alignment.clone());
        }

        let start = Instant::now();
        let result = oracle.align(trace, net, initial_marking, final_marking);
        let elapsed = start.elapsed();
        self.oracle_calls.fetch_add(1, Ordering::Relaxed);
        self.oracle_nanos.fetch_add(
            u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );

        let alignment = Arc::new(
            result.map_err(|source| SamplingError::OracleFailure {
                signature: signature.clone(),
                source,
            })?,
        );
        debug!(
            cost = alignment.cost,
            "Aligned {} in {:.3}s",
            signature,
            elapsed.as_secs_f64()
        );
        *stored = Some(alignment.clone());
        Ok(alignment)
    }

    ///
    /// Resolve the alignments of several traces in parallel
    ///
    /// Results are in the order of `traces`. Each distinct signature is aligned at most once,
    /// and only one task per signature is spawned, so an oracle running its own rayon jobs never
    /// waits on a slot held by the same worker thread.
    pub fn resolve_all(
        &self,
        traces: &[&Trace],
        net: &PetriNet,
        initial_marking: &Marking,
        final_marking: &Marking,
    ) -> Result<Vec<Arc<AlignmentResult>>, SamplingError> {
        let mut first_pos: HashMap<TraceSignature, usize> = HashMap::new();
        let mut distinct: Vec<&Trace> = Vec::new();
        let positions: Vec<usize> = traces
            .iter()
            .map(|&trace| {
                *first_pos.entry(trace.signature()).or_insert_with(|| {
                    distinct.push(trace);
                    distinct.len() - 1
                })
            })
            .collect();
        self.hits
            .fetch_add(traces.len() - distinct.len(), Ordering::Relaxed);

        let resolved: Vec<Arc<AlignmentResult>> = distinct
            .par_iter()
            .map(|trace| self.get_or_compute(trace, net, initial_marking, final_marking))
            .collect::<Result<_, _>>()?;
        Ok(positions
            .into_iter()
            .map(|pos| resolved[pos].clone())
            .collect())
    }
}
