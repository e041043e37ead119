//! Command line interface for guided event log sampling
//!
//! ```text
//! log-sampling <ALGORITHM> <SAMPLE_SIZE> <LOG_FILE> <MODEL_FILE> [-index_file FILE] [--oracle-cmd PROGRAM]
//! ```
use std::{ffi::OsString, path::PathBuf, process::ExitCode, time::Instant};

use anyhow::Context;
use clap::Parser;
use log_sampling::{
    construct_sample, load_inputs,
    sampling::{indexing::IndexConfig, sequence_guided::DEFAULT_BATCH_SIZE, ErrorKind, Sample},
    AlignmentCache, CommandOracle, SamplingAlgorithm, SamplingConfig, SamplingError,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Options that are also accepted with a single leading dash
const SINGLE_DASH_OPTIONS: &[&str] = &["index_file", "alignments"];

#[derive(Parser, Debug)]
#[command(name = "log-sampling")]
#[command(version)]
#[command(about = "Guided trace sampling for alignment-based conformance checking")]
#[command(long_about = None)]
struct Cli {
    /// The sampling strategy to use [feature, behavioural, Random, Longest]
    algorithm: String,

    /// The size of the final sample
    #[arg(allow_negative_numbers = true)]
    sample_size: i64,

    /// The XES event log from which to sample (optionally .gz)
    log_file: PathBuf,

    /// The PNML model used for conformance checking
    model_file: PathBuf,

    /// File listing the features considered during indexing. If none is supplied, all features are considered
    #[arg(long = "index_file", value_name = "FILE")]
    index_file: Option<PathBuf>,

    /// Precomputed alignments (JSON array, one per trace in log order)
    #[arg(long = "alignments", value_name = "FILE", hide = true)]
    alignments: Option<PathBuf>,

    /// Number of traces per batch for behavioural sampling
    #[arg(long = "batch-size", value_name = "SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Seed for random sampling
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,

    /// External aligner computing alignments (JSON request on stdin, JSON result on stdout)
    #[arg(long = "oracle-cmd", value_name = "PROGRAM")]
    oracle_cmd: Option<PathBuf>,

    /// Argument passed to the external aligner (repeatable)
    #[arg(long = "oracle-arg", value_name = "ARG", allow_hyphen_values = true)]
    oracle_args: Vec<String>,
}

/// Rewrite `-index_file` and `-alignments` to their double-dash form
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let single_dash = arg.to_str().is_some_and(|s| {
                SINGLE_DASH_OPTIONS.iter().any(|option| {
                    s.strip_prefix('-')
                        .and_then(|rest| rest.strip_prefix(option))
                        .is_some_and(|tail| tail.is_empty() || tail.starts_with('='))
                })
            });
            if single_dash {
                let mut normalized = OsString::from("-");
                normalized.push(&arg);
                normalized
            } else {
                arg
            }
        })
        .collect()
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref().map(SamplingError::kind) {
        Some(ErrorKind::Configuration) => 2,
        Some(ErrorKind::InputFormat) => 3,
        Some(ErrorKind::CacheConsistency) => 4,
        Some(ErrorKind::Oracle) => 5,
        None => 1,
    }
}

fn sampling_config(cli: &Cli) -> anyhow::Result<SamplingConfig> {
    let algorithm: SamplingAlgorithm = cli.algorithm.parse()?;
    let sample_size = usize::try_from(cli.sample_size)
        .ok()
        .filter(|size| *size > 0)
        .ok_or(SamplingError::InvalidSampleSize(cli.sample_size))?;
    let index = match &cli.index_file {
        Some(path) => IndexConfig::from_file(path)?,
        None => IndexConfig::All,
    };
    Ok(SamplingConfig {
        algorithm,
        sample_size,
        index,
        batch_size: cli.batch_size,
        seed: cli.seed,
    })
}

fn print_sample(sample: &Sample) {
    for sampled in &sample.traces {
        println!(
            "{}\t{}\t{}\t{}",
            sampled.trace_index,
            sampled.trace.case_id().unwrap_or_default(),
            sampled.alignment.cost,
            sampled.trace.signature()
        );
    }
    println!(
        "Fitting traces: {}/{}, oracle calls: {}, cache hits: {}",
        sample.fitting_count(),
        sample.len(),
        sample.stats.oracle_calls,
        sample.stats.hits
    );
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = sampling_config(cli)?;
    if cli.alignments.is_none() && cli.oracle_cmd.is_none() {
        return Err(SamplingError::NoAlignmentSource.into());
    }

    let (log, net, initial_marking, final_marking) = load_inputs(&cli.log_file, &cli.model_file)
        .with_context(|| {
            format!(
                "Could not load {} and {}",
                cli.log_file.display(),
                cli.model_file.display()
            )
        })?;

    let cache = match (&cli.alignments, &cli.oracle_cmd) {
        (Some(path), _) => {
            info!("Loading precomputed alignments from {}", path.display());
            AlignmentCache::load_preloaded(path, &log)
                .with_context(|| format!("Could not use alignments {}", path.display()))?
        }
        (None, Some(program)) => AlignmentCache::with_oracle(
            CommandOracle::new(program).with_args(cli.oracle_args.iter().cloned()),
        ),
        (None, None) => return Err(SamplingError::NoAlignmentSource.into()),
    };

    let start = Instant::now();
    let sample = construct_sample(&config, &log, &net, &initial_marking, &final_marking, &cache)?;
    println!(
        "Sampling done. Total time elapsed: {:.3}",
        start.elapsed().as_secs_f64()
    );
    println!("Times: {}", sample.times);
    print_sample(&sample);
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::CommandFactory;
    use log_sampling::test_utils::{pnml_for_labels, xes_from_variants};
    use tempfile::NamedTempFile;

    use super::*;

    /// Temporary XES log with 3 traces and a PNML model for `a` and `b`
    fn input_files() -> (NamedTempFile, NamedTempFile) {
        let mut xes = tempfile::Builder::new().suffix(".xes").tempfile().unwrap();
        xes.write_all(xes_from_variants(&[(&["a", "b"], 2), (&["a", "c"], 1)]).as_bytes())
            .unwrap();
        let mut pnml = tempfile::Builder::new().suffix(".pnml").tempfile().unwrap();
        pnml.write_all(pnml_for_labels(&["a", "b"]).as_bytes())
            .unwrap();
        (xes, pnml)
    }

    fn alignments_file(costs: &[f64]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let entries: Vec<String> = costs
            .iter()
            .map(|cost| format!(r#"{{"cost": {cost:?}}}"#))
            .collect();
        write!(file, "[{}]", entries.join(",")).unwrap();
        file
    }

    fn path_arg(file: &NamedTempFile) -> &str {
        file.path().to_str().unwrap()
    }

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(normalize_args(args.iter().map(OsString::from))).unwrap()
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn single_dash_options() {
        let cli = parse(&[
            "log-sampling",
            "feature",
            "10",
            "log.xes",
            "model.pnml",
            "-index_file",
            "index.txt",
            "-alignments=aligned.json",
        ]);
        assert_eq!(cli.index_file, Some(PathBuf::from("index.txt")));
        assert_eq!(cli.alignments, Some(PathBuf::from("aligned.json")));
        assert_eq!(cli.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn oracle_options() {
        let cli = parse(&[
            "log-sampling",
            "Random",
            "5",
            "log.xes",
            "model.pnml",
            "--seed",
            "3",
            "--oracle-cmd",
            "aligner",
            "--oracle-arg",
            "--fast",
            "--oracle-arg",
            "-v",
        ]);
        assert_eq!(cli.seed, Some(3));
        assert_eq!(cli.oracle_cmd, Some(PathBuf::from("aligner")));
        assert_eq!(cli.oracle_args, vec!["--fast", "-v"]);
        let config = sampling_config(&cli).unwrap();
        assert_eq!(config.algorithm, SamplingAlgorithm::Random);
        assert_eq!(config.sample_size, 5);
    }

    #[test]
    fn configuration_errors_exit_with_2() {
        let cli = parse(&["log-sampling", "stratified", "5", "log.xes", "model.pnml"]);
        let err = run(&cli).unwrap_err();
        assert_eq!(exit_code(&err), 2);

        let cli = parse(&["log-sampling", "feature", "-3", "log.xes", "model.pnml"]);
        let err = run(&cli).unwrap_err();
        assert_eq!(exit_code(&err), 2);

        // No alignment source, checked before any input is read
        let cli = parse(&[
            "log-sampling",
            "Longest",
            "3",
            "missing.xes",
            "missing.pnml",
        ]);
        let err = run(&cli).unwrap_err();
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn missing_inputs_exit_with_3() {
        let cli = parse(&[
            "log-sampling",
            "Longest",
            "3",
            "/nonexistent/log.xes",
            "/nonexistent/model.pnml",
            "--oracle-cmd",
            "aligner",
        ]);
        let err = run(&cli).unwrap_err();
        assert_eq!(exit_code(&err), 3);
    }

    #[test]
    fn preloaded_alignments_end_to_end() {
        let (xes, pnml) = input_files();
        let alignments = alignments_file(&[0.0, 0.0, 1.0]);
        for algorithm in ["feature", "behavioural", "Random", "Longest"] {
            let cli = parse(&[
                "log-sampling",
                algorithm,
                "2",
                path_arg(&xes),
                path_arg(&pnml),
                "-alignments",
                path_arg(&alignments),
            ]);
            run(&cli).unwrap();
        }
    }

    #[test]
    fn preload_count_mismatch_exits_with_4() {
        let (xes, pnml) = input_files();
        let alignments = alignments_file(&[0.0, 1.0]);
        let cli = parse(&[
            "log-sampling",
            "feature",
            "2",
            path_arg(&xes),
            path_arg(&pnml),
            "-alignments",
            path_arg(&alignments),
        ]);
        let err = run(&cli).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SamplingError>(),
            Some(SamplingError::PreloadCountMismatch {
                expected: 3,
                found: 2
            })
        ));
        assert_eq!(exit_code(&err), 4);
    }

    #[test]
    fn oracle_failure_exits_with_5() {
        let (xes, pnml) = input_files();
        let cli = parse(&[
            "log-sampling",
            "Longest",
            "1",
            path_arg(&xes),
            path_arg(&pnml),
            "--oracle-cmd",
            "/nonexistent/aligner",
        ]);
        let err = run(&cli).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SamplingError>(),
            Some(SamplingError::OracleFailure { .. })
        ));
        assert_eq!(exit_code(&err), 5);
    }
}
