use std::{
    io::Write,
    path::PathBuf,
    process::{Command, ExitStatus, Stdio},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{
    event_data::case_centric::Trace,
    process_models::case_centric::petri_net::{Marking, PetriNet},
};

///
/// One step of an alignment between a trace and a process model
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "activity")]
pub enum AlignmentMove {
    /// Log and model agree on the activity
    Synchronous(String),
    /// Activity observed in the log but not allowed by the model
    LogMove(String),
    /// Activity required by the model but missing in the log
    ModelMove(String),
    /// Silent (invisible) model transition
    SilentMove,
}

///
/// Answer of an [`AlignmentOracle`] for one trace
///
/// A `cost` of `0.0` means the trace fits the model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Alignment cost
    pub cost: f64,
    /// Move sequence (may be omitted by oracles that only report costs)
    #[serde(default)]
    pub moves: Vec<AlignmentMove>,
}

impl AlignmentResult {
    /// Create a new alignment result
    pub fn new(cost: f64, moves: Vec<AlignmentMove>) -> Self {
        Self { cost, moves }
    }

    /// Whether the aligned trace fits the model perfectly
    pub fn is_fitting(&self) -> bool {
        self.cost <= 0.0
    }

    /// Labels of all log and model moves, in alignment order
    pub fn deviating_activities(&self) -> impl Iterator<Item = &str> + '_ {
        self.moves.iter().filter_map(|m| match m {
            AlignmentMove::LogMove(a) | AlignmentMove::ModelMove(a) => Some(a.as_str()),
            _ => None,
        })
    }
}

///
/// Error reported by an [`AlignmentOracle`]
///
#[derive(Debug)]
pub enum OracleError {
    /// Spawning or talking to the oracle failed
    Io(std::io::Error),
    /// The request could not be encoded
    Encode(serde_json::Error),
    /// The oracle process exited unsuccessfully
    Status {
        /// Exit status of the oracle process
        status: ExitStatus,
        /// Captured standard error output
        stderr: String,
    },
    /// The oracle answered with something that is not an [`AlignmentResult`]
    InvalidResponse(serde_json::Error),
    /// The oracle could not align the trace
    Unalignable(String),
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Io(e) => write!(f, "Could not run alignment oracle: {e}"),
            OracleError::Encode(e) => write!(f, "Could not encode alignment request: {e}"),
            OracleError::Status { status, stderr } => {
                write!(f, "Alignment oracle exited with {status}")?;
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
            OracleError::InvalidResponse(e) => {
                write!(f, "Alignment oracle returned invalid output: {e}")
            }
            OracleError::Unalignable(reason) => write!(f, "Trace could not be aligned: {reason}"),
        }
    }
}

impl std::error::Error for OracleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OracleError::Io(e) => Some(e),
            OracleError::Encode(e) | OracleError::InvalidResponse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for OracleError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

///
/// Capability to compute the optimal alignment of a trace against a Petri net
///
/// Implementations must be deterministic for a given activity sequence and model,
/// as results are cached by [`crate::core::event_data::case_centric::TraceSignature`].
/// Calls may run on rayon worker threads; an implementation may spawn its own rayon jobs.
pub trait AlignmentOracle: Send + Sync {
    /// Align `trace` against `net`, starting in `initial_marking` and ending in `final_marking`
    fn align(
        &self,
        trace: &Trace,
        net: &PetriNet,
        initial_marking: &Marking,
        final_marking: &Marking,
    ) -> Result<AlignmentResult, OracleError>;
}

#[derive(Debug, Serialize)]
struct MarkedPlace {
    place: Uuid,
    tokens: u64,
}

fn marking_entries(marking: &Marking) -> Vec<MarkedPlace> {
    let mut entries: Vec<MarkedPlace> = marking
        .iter()
        .map(|(place, tokens)| MarkedPlace {
            place: place.0,
            tokens: *tokens,
        })
        .collect();
    entries.sort_by_key(|e| e.place);
    entries
}

#[derive(Debug, Serialize)]
struct AlignmentRequest<'a> {
    activities: Vec<&'a str>,
    net: &'a PetriNet,
    initial_marking: Vec<MarkedPlace>,
    final_marking: Vec<MarkedPlace>,
}

///
/// [`AlignmentOracle`] delegating to an external aligner process
///
/// For every call, the program is spawned with the configured arguments and receives a JSON
/// request on standard input:
///
/// ```json
/// {"activities": ["a", "b"], "net": { ... }, "initial_marking": [{"place": "<uuid>", "tokens": 1}], "final_marking": [ ... ]}
/// ```
///
/// It must print a single [`AlignmentResult`] as JSON (e.g., `{"cost": 1.0, "moves": [{"type": "LogMove", "activity": "b"}]}`)
/// and exit successfully.
#[derive(Debug, Clone)]
pub struct CommandOracle {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandOracle {
    /// Oracle running `program` without arguments
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Set the arguments passed to the program
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

impl AlignmentOracle for CommandOracle {
    fn align(
        &self,
        trace: &Trace,
        net: &PetriNet,
        initial_marking: &Marking,
        final_marking: &Marking,
    ) -> Result<AlignmentResult, OracleError> {
        let request = serde_json::to_vec(&AlignmentRequest {
            activities: trace.activities().collect(),
            net,
            initial_marking: marking_entries(initial_marking),
            final_marking: marking_entries(final_marking),
        })
        .map_err(OracleError::Encode)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            OracleError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "stdin of alignment oracle not captured",
            ))
        })?;
        // Feed stdin from a separate thread, so a chatty oracle can not block on a full stdout pipe
        let writer = std::thread::spawn(move || stdin.write_all(&request));
        let output = child.wait_with_output()?;
        let written = writer.join().unwrap_or_else(|_| {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "alignment request writer panicked",
            ))
        });

        if !output.status.success() {
            return Err(OracleError::Status {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }
        // Oracles may answer without consuming the whole request
        match written {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e.into()),
            _ => {}
        }
        serde_json::from_slice(&output.stdout).map_err(OracleError::InvalidResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{event_log_from_variants, simple_net};

    #[test]
    fn deviating_activities_are_log_and_model_moves() {
        let res = AlignmentResult::new(
            2.0,
            vec![
                AlignmentMove::Synchronous("a".into()),
                AlignmentMove::LogMove("x".into()),
                AlignmentMove::SilentMove,
                AlignmentMove::ModelMove("b".into()),
            ],
        );
        assert!(!res.is_fitting());
        assert_eq!(res.deviating_activities().collect::<Vec<_>>(), vec!["x", "b"]);
        assert!(AlignmentResult::default().is_fitting());
    }

    #[test]
    fn alignment_result_json() {
        let res: AlignmentResult = serde_json::from_str(
            r#"{"cost": 1.0, "moves": [{"type": "LogMove", "activity": "b"}, {"type": "SilentMove"}]}"#,
        )
        .unwrap();
        assert_eq!(res.cost, 1.0);
        assert_eq!(
            res.moves,
            vec![AlignmentMove::LogMove("b".into()), AlignmentMove::SilentMove]
        );
        let cost_only: AlignmentResult = serde_json::from_str(r#"{"cost": 0.0}"#).unwrap();
        assert!(cost_only.moves.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn command_oracle_reads_stdout() {
        let log = event_log_from_variants(&[(&["a", "b"], 1)]);
        let (net, im, fm) = simple_net(&["a", "b"]);
        let oracle = CommandOracle::new("sh").with_args([
            "-c",
            r#"case "$(cat)" in *'"activities":["a","b"]'*) echo '{"cost": 3.0}';; *) exit 1;; esac"#,
        ]);
        let res = oracle.align(&log.traces[0], &net, &im, &fm).unwrap();
        assert_eq!(res.cost, 3.0);
    }

    #[cfg(unix)]
    #[test]
    fn command_oracle_failures() {
        let log = event_log_from_variants(&[(&["a"], 1)]);
        let (net, im, fm) = simple_net(&["a"]);

        let failing = CommandOracle::new("sh").with_args(["-c", "cat > /dev/null; exit 3"]);
        assert!(matches!(
            failing.align(&log.traces[0], &net, &im, &fm),
            Err(OracleError::Status { .. })
        ));

        let garbage = CommandOracle::new("sh").with_args(["-c", "cat > /dev/null; echo nope"]);
        assert!(matches!(
            garbage.align(&log.traces[0], &net, &im, &fm),
            Err(OracleError::InvalidResponse(_))
        ));

        let missing = CommandOracle::new("/nonexistent/aligner");
        assert!(matches!(
            missing.align(&log.traces[0], &net, &im, &fm),
            Err(OracleError::Io(_))
        ));
    }
}
