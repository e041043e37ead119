//! Core modules for process mining
//!
//! Case-centric event logs (XES) and Petri nets (PNML), the two inputs of every sampling run.

pub use chrono;
pub mod event_data;

pub mod process_models;

pub use event_data::case_centric::EventLog;
pub use process_models::case_centric::petri_net::PetriNet;
