//! Well-known XES attribute keys

/// Common identifying field for event identities (i.e., activities)
///
/// _Note_: While the concept XES extension is the de-facto standard for identifying activity names,
/// some XES files might not use `concept:name` or have events without a `concept:name` attribute.
/// Such events are treated as having an empty activity label.
pub const ACTIVITY_NAME: &str = "concept:name";
/// Common identifying field for trace identities (i.e., case IDs)
///
/// See also [`ACTIVITY_NAME`]
pub const TRACE_ID_NAME: &str = "concept:name";
/// Separator placed in front of every activity label when building a [`super::TraceSignature`]
pub const SIGNATURE_SEPARATOR: &str = " >> ";
