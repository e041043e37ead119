use std::io::Write;

use super::*;
use crate::{
    conformance::alignment::AlignmentResult,
    test_utils::{
        event_log_from_variants, pnml_for_labels, simple_net, xes_from_variants, CountingOracle,
    },
};

fn all_configs(sample_size: usize) -> Vec<SamplingConfig> {
    SamplingAlgorithm::all()
        .iter()
        .map(|algorithm| SamplingConfig {
            seed: Some(7),
            ..SamplingConfig::new(*algorithm, sample_size)
        })
        .collect()
}

#[test]
fn longest_picks_longest_variants() {
    // 10 traces in 3 variants of length 5, 3 and 2
    let log = event_log_from_variants(&[
        (&["a", "b"], 4),
        (&["a", "b", "c", "d", "e"], 3),
        (&["a", "c", "e"], 3),
    ]);
    let (net, im, fm) = simple_net(&["a", "b", "c", "d", "e"]);
    let cache = AlignmentCache::with_oracle(CountingOracle::fitting());
    let config = SamplingConfig::new(SamplingAlgorithm::Longest, 2);
    let sample = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap();
    assert_eq!(sample.trace_indices(), vec![4, 7]);
    assert_eq!(sample.traces[0].trace.events.len(), 5);
    assert_eq!(sample.traces[1].trace.events.len(), 3);

    // Deterministic
    let again = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap();
    assert_eq!(again.trace_indices(), sample.trace_indices());
}

#[test]
fn feature_guided_includes_deviating_partition() {
    // Partition of 8 fitting traces and one of 2 deviating traces
    let log = event_log_from_variants(&[(&["a", "b"], 8), (&["a", "x"], 2)]);
    let (net, im, fm) = simple_net(&["a", "b"]);
    let cache = AlignmentCache::with_oracle(CountingOracle::deviating_on(&["x"]));
    let config = SamplingConfig {
        index: IndexConfig::Selected(vec![Feature::Activity("x".into())]),
        ..SamplingConfig::new(SamplingAlgorithm::Feature, 2)
    };
    let sample = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap();
    assert_eq!(sample.len(), 2);
    assert!(sample.trace_indices().iter().any(|&i| i >= 8));
    assert!(sample.traces.iter().any(|t| !t.alignment.is_fitting()));
}

#[test]
fn feature_guided_revisits_deviating_partitions() {
    // A fitting partition of 2 traces and a deviating one of 3
    let log = event_log_from_variants(&[(&["a", "b"], 2), (&["a", "x"], 3)]);
    let (net, im, fm) = simple_net(&["a", "b"]);
    let cache = AlignmentCache::with_oracle(CountingOracle::deviating_on(&["x"]));
    let config = SamplingConfig {
        index: IndexConfig::Selected(vec![Feature::Activity("x".into())]),
        ..SamplingConfig::new(SamplingAlgorithm::Feature, 4)
    };
    let sample = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap();
    assert_eq!(sample.trace_indices(), vec![0, 2, 3, 4]);
    let deviating = sample
        .traces
        .iter()
        .filter(|t| !t.alignment.is_fitting())
        .count();
    assert_eq!(deviating, 3);
    // One deviating variant, aligned once
    assert_eq!(sample.stats.oracle_calls, 2);
}

#[test]
fn preloaded_alignments_avoid_oracle_calls() {
    let log = event_log_from_variants(&[(&["a", "b"], 3), (&["a", "c"], 2), (&["b"], 2)]);
    let (net, im, fm) = simple_net(&["a", "b", "c"]);
    let alignments = log
        .traces
        .iter()
        .map(|t| AlignmentResult::new(t.events.len() as f64 - 1.0, vec![]))
        .collect();
    let cache = AlignmentCache::from_trace_alignments(&log, alignments).unwrap();
    for config in all_configs(4) {
        let sample = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap();
        assert_eq!(sample.stats.oracle_calls, 0, "{}", config.algorithm);
        assert!(!sample.is_empty());
    }
    assert_eq!(cache.stats().oracle_calls, 0);
}

#[test]
fn oracle_calls_match_distinct_signatures() {
    let log = event_log_from_variants(&[
        (&["a", "b"], 5),
        (&["a", "c"], 5),
        (&["a", "b", "c"], 5),
        (&["c"], 5),
    ]);
    let (net, im, fm) = simple_net(&["a", "b", "c"]);
    for config in all_configs(12) {
        let oracle = CountingOracle::fitting();
        let calls = oracle.calls();
        let cache = AlignmentCache::with_oracle(oracle);
        let sample = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap();
        let distinct: std::collections::HashSet<_> =
            sample.traces.iter().map(|t| t.trace.signature()).collect();
        assert_eq!(calls.get(), distinct.len(), "{}", config.algorithm);
        assert_eq!(sample.stats.oracle_calls, distinct.len());
    }
}

#[test]
fn shared_cache_across_strategies() {
    let log = event_log_from_variants(&[(&["a", "b"], 3), (&["a", "c"], 3)]);
    let (net, im, fm) = simple_net(&["a", "b", "c"]);
    let oracle = CountingOracle::fitting();
    let calls = oracle.calls();
    let cache = AlignmentCache::with_oracle(oracle);
    for config in all_configs(6) {
        construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap();
    }
    assert_eq!(calls.get(), 2);
}

#[test]
fn invalid_configurations() {
    let log = event_log_from_variants(&[(&["a"], 3)]);
    let (net, im, fm) = simple_net(&["a"]);
    let cache = AlignmentCache::with_oracle(CountingOracle::fitting());

    let config = SamplingConfig::new(SamplingAlgorithm::Random, 0);
    let err = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let config = SamplingConfig {
        batch_size: 0,
        ..SamplingConfig::new(SamplingAlgorithm::Behavioural, 2)
    };
    let err = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap_err();
    assert!(matches!(err, SamplingError::InvalidBatchSize));

    let config = SamplingConfig {
        index: IndexConfig::Selected(vec![Feature::Activity("zzz".into())]),
        ..SamplingConfig::new(SamplingAlgorithm::Feature, 2)
    };
    let err = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn empty_log_gives_empty_samples() {
    let log = EventLog::new();
    let (net, im, fm) = simple_net(&["a"]);
    let cache = AlignmentCache::with_oracle(CountingOracle::fitting());
    for config in all_configs(3) {
        let sample = construct_sample(&config, &log, &net, &im, &fm, &cache).unwrap();
        assert!(sample.is_empty());
    }
}

#[test]
fn load_inputs_from_files() {
    let mut xes = tempfile::Builder::new().suffix(".xes").tempfile().unwrap();
    xes.write_all(xes_from_variants(&[(&["a", "b"], 2), (&["b"], 1)]).as_bytes())
        .unwrap();
    let mut pnml = tempfile::Builder::new().suffix(".pnml").tempfile().unwrap();
    pnml.write_all(pnml_for_labels(&["a", "b"]).as_bytes())
        .unwrap();

    let (log, net, im, fm) = load_inputs(xes.path(), pnml.path()).unwrap();
    assert_eq!(log.traces.len(), 3);
    assert_eq!(log.traces[0].signature().as_str(), " >> a >> b");
    assert_eq!(net.transitions.len(), 2);
    assert_eq!(im.len(), 1);
    assert_eq!(fm.len(), 1);
}

#[test]
fn load_inputs_requires_markings() {
    let mut xes = tempfile::Builder::new().suffix(".xes").tempfile().unwrap();
    xes.write_all(xes_from_variants(&[(&["a"], 1)]).as_bytes())
        .unwrap();
    let mut pnml = tempfile::Builder::new().suffix(".pnml").tempfile().unwrap();
    pnml.write_all(br#"<pnml><net id="n"><place id="p"/></net></pnml>"#)
        .unwrap();
    let err = load_inputs(xes.path(), pnml.path()).unwrap_err();
    assert!(matches!(err, SamplingError::MissingMarking));
    assert_eq!(err.kind(), ErrorKind::InputFormat);

    let err = load_inputs(pnml.path(), pnml.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InputFormat);
}
