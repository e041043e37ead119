#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]
#![doc = include_str!("../README.md")]

///
/// Core data structures: event logs and Petri nets, including XES/PNML import
///
pub mod core;

///
/// Conformance checking: alignments and alignment oracles
///
pub mod conformance;

///
/// Guided trace sampling: indexing, partitioning, alignment cache and samplers
///
pub mod sampling;

#[doc(hidden)]
pub mod test_utils;

#[doc(inline)]
pub use crate::core::{EventLog, PetriNet};

#[doc(inline)]
pub use crate::core::event_data::case_centric::xes::{import_xes_file, XESImportOptions};

#[doc(inline)]
pub use crate::core::process_models::case_centric::petri_net::pnml::import_pnml_from_path;

#[doc(inline)]
pub use conformance::alignment::{AlignmentOracle, AlignmentResult, CommandOracle};

#[doc(inline)]
pub use sampling::{
    construct_sample, load_inputs, AlignmentCache, LogSampler, Sample, SamplingAlgorithm,
    SamplingConfig, SamplingError,
};
