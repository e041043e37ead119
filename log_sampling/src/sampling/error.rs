use std::path::PathBuf;

use crate::{
    conformance::alignment::OracleError,
    core::{
        event_data::case_centric::{xes::XESParseError, TraceSignature},
        process_models::case_centric::petri_net::pnml::PNMLParseError,
    },
};

///
/// Coarse classification of a [`SamplingError`]
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid user input: unknown feature, unsupported algorithm, invalid sizes, missing alignment source
    Configuration,
    /// Event log, process model or preload file could not be read
    InputFormat,
    /// Preloaded alignments do not cover the log
    CacheConsistency,
    /// The alignment oracle failed
    Oracle,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration error",
            ErrorKind::InputFormat => "input format error",
            ErrorKind::CacheConsistency => "cache consistency error",
            ErrorKind::Oracle => "oracle failure",
        };
        write!(f, "{name}")
    }
}

///
/// Errors that can occur while constructing a sample
///
#[derive(Debug)]
pub enum SamplingError {
    /// Index configuration names a feature with an unknown prefix
    UnknownFeature(String),
    /// Index configuration names a feature that does not occur in the log
    UnavailableFeature(String),
    /// Sampling algorithm name is not recognized
    UnsupportedAlgorithm(String),
    /// Requested sample size is not positive
    InvalidSampleSize(i64),
    /// Batch size of the sequence-guided sampler is zero
    InvalidBatchSize,
    /// Partitioning was built over a different log
    PartitioningMismatch {
        /// Number of traces in the log
        expected: usize,
        /// Number of traces covered by the partitioning
        found: usize,
    },
    /// Neither preloaded alignments nor an oracle are configured
    NoAlignmentSource,
    /// Index configuration file could not be read
    IndexFile {
        /// Path of the index file
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },
    /// Event log could not be parsed
    XESParse(XESParseError),
    /// Process model could not be parsed
    PNMLParse(PNMLParseError),
    /// Process model has no initial or no final marking
    MissingMarking,
    /// Preloaded alignment file could not be read
    PreloadIO(std::io::Error),
    /// Preloaded alignment file is not a JSON array of alignments
    PreloadFormat(serde_json::Error),
    /// Preloaded alignments do not match the number of traces
    PreloadCountMismatch {
        /// Number of traces in the log
        expected: usize,
        /// Number of preloaded alignments
        found: usize,
    },
    /// A trace was requested from a preloaded cache that does not contain its signature
    PreloadMiss(TraceSignature),
    /// The oracle failed to align a trace
    OracleFailure {
        /// Signature of the trace that was aligned
        signature: TraceSignature,
        /// Underlying oracle error
        source: OracleError,
    },
}

impl SamplingError {
    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SamplingError::UnknownFeature(_)
            | SamplingError::UnavailableFeature(_)
            | SamplingError::UnsupportedAlgorithm(_)
            | SamplingError::InvalidSampleSize(_)
            | SamplingError::InvalidBatchSize
            | SamplingError::PartitioningMismatch { .. }
            | SamplingError::NoAlignmentSource
            | SamplingError::IndexFile { .. } => ErrorKind::Configuration,
            SamplingError::XESParse(_)
            | SamplingError::PNMLParse(_)
            | SamplingError::MissingMarking
            | SamplingError::PreloadIO(_)
            | SamplingError::PreloadFormat(_) => ErrorKind::InputFormat,
            SamplingError::PreloadCountMismatch { .. } | SamplingError::PreloadMiss(_) => {
                ErrorKind::CacheConsistency
            }
            SamplingError::OracleFailure { .. } => ErrorKind::Oracle,
        }
    }
}

impl std::fmt::Display for SamplingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplingError::UnknownFeature(name) => write!(f, "Unknown feature '{name}'"),
            SamplingError::UnavailableFeature(name) => {
                write!(f, "Feature '{name}' does not occur in the event log")
            }
            SamplingError::UnsupportedAlgorithm(name) => {
                write!(f, "Algorithm {name} is not supported.")
            }
            SamplingError::InvalidSampleSize(size) => {
                write!(f, "Sample size must be positive, got {size}")
            }
            SamplingError::InvalidBatchSize => write!(f, "Batch size must be positive"),
            SamplingError::PartitioningMismatch { expected, found } => write!(
                f,
                "Partitioning covers {found} traces, but the event log has {expected}"
            ),
            SamplingError::NoAlignmentSource => write!(
                f,
                "No alignment source: provide preloaded alignments or an alignment oracle"
            ),
            SamplingError::IndexFile { path, source } => {
                write!(f, "Could not read index file {}: {source}", path.display())
            }
            SamplingError::XESParse(e) => write!(f, "{e}"),
            SamplingError::PNMLParse(e) => write!(f, "{e}"),
            SamplingError::MissingMarking => {
                write!(f, "Process model lacks an initial or a final marking")
            }
            SamplingError::PreloadIO(e) => write!(f, "Could not read preloaded alignments: {e}"),
            SamplingError::PreloadFormat(e) => {
                write!(f, "Preloaded alignments are malformed: {e}")
            }
            SamplingError::PreloadCountMismatch { expected, found } => write!(
                f,
                "Found {found} preloaded alignments for {expected} traces"
            ),
            SamplingError::PreloadMiss(signature) => {
                write!(f, "No preloaded alignment for trace {signature}")
            }
            SamplingError::OracleFailure { signature, source } => {
                write!(f, "Alignment of trace {signature} failed: {source}")
            }
        }
    }
}

impl std::error::Error for SamplingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SamplingError::IndexFile { source, .. } => Some(source),
            SamplingError::XESParse(e) => Some(e),
            SamplingError::PNMLParse(e) => Some(e),
            SamplingError::PreloadIO(e) => Some(e),
            SamplingError::PreloadFormat(e) => Some(e),
            SamplingError::OracleFailure { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<XESParseError> for SamplingError {
    fn from(e: XESParseError) -> Self {
        Self::XESParse(e)
    }
}

impl From<PNMLParseError> for SamplingError {
    fn from(e: PNMLParseError) -> Self {
        Self::PNMLParse(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            SamplingError::UnsupportedAlgorithm("foo".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(SamplingError::MissingMarking.kind(), ErrorKind::InputFormat);
        assert_eq!(
            SamplingError::PreloadCountMismatch {
                expected: 3,
                found: 2
            }
            .kind(),
            ErrorKind::CacheConsistency
        );
        assert_eq!(
            SamplingError::OracleFailure {
                signature: TraceSignature::default(),
                source: OracleError::Unalignable("no path".into()),
            }
            .kind(),
            ErrorKind::Oracle
        );
    }

    #[test]
    fn display_names_offending_entry() {
        let e = SamplingError::UnknownFeature("colour:red".into());
        assert!(e.to_string().contains("colour:red"));
        let e = SamplingError::PreloadMiss(TraceSignature::from_activities(["a"]));
        assert!(e.to_string().contains(" >> a"));
    }
}
