//! PNML File Format for Petri nets
pub(crate) mod import_pnml;

#[doc(inline)]
pub use import_pnml::*;
