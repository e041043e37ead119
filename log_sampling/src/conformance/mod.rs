//! Conformance Checking
//!
//! Conformance checking techniques typically compare the behavior of a process model with
//! event data. This crate does not compute alignments itself: it consumes them through the
//! [`alignment::AlignmentOracle`] capability.
pub mod alignment;
#[doc(inline)]
pub use alignment::*;
