use chrono::{DateTime, FixedOffset};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use super::constants::{ACTIVITY_NAME, SIGNATURE_SEPARATOR, TRACE_ID_NAME};

///
/// Possible attribute values according to the XES Standard
///
/// Tip: If you know the expected `AttributeValue` type, make use of the `try_as_xxx` functions (e.g., [`AttributeValue::try_as_string`])
///
/// ```rust
/// use log_sampling::core::event_data::case_centric::AttributeValue;
/// let v = AttributeValue::Int(42);
///
/// let i = v.try_as_int().unwrap();
/// assert_eq!(*i,42);
/// ````
///
/// [`AttributeValue`] implements [`Display`] and thus `to_string()`.
/// For container/list attribute values, a debug representation String is returned.
/// For None attribute vaues, the String `"None"` is returned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "content")]
pub enum AttributeValue {
    /// String values
    String(String),
    /// `DateTime` values
    Date(DateTime<FixedOffset>),
    /// Integer values
    Int(i64),
    /// Float values
    Float(f64),
    /// Boolean values
    Boolean(bool),
    /// IDs (UUIDs)
    ID(Uuid),
    /// List of other Attributes (where order matters; might contain multiple child attributes with the same key)
    List(Vec<Attribute>),
    /// Container of other Attributes (where order does not matter)
    Container(Attributes),
    /// Used to represent invalid values (e.g., `DateTime` which could not be parsed)
    None(),
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::String(s) => write!(f, "{s}"),
            AttributeValue::Date(date_time) => write!(f, "{date_time}"),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Float(x) => write!(f, "{x}"),
            AttributeValue::Boolean(b) => write!(f, "{b}"),
            AttributeValue::ID(uuid) => write!(f, "{uuid}"),
            AttributeValue::List(attributes) => write!(f, "{attributes:?}"),
            AttributeValue::Container(attributes) => write!(f, "{attributes:?}"),
            AttributeValue::None() => write!(f, "None"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            AttributeValue::String(value) => value.hash(state),
            AttributeValue::Date(value) => value.hash(state),
            AttributeValue::Int(value) => value.hash(state),
            AttributeValue::Float(value) => OrderedFloat::from(*value).hash(state),
            AttributeValue::Boolean(value) => value.hash(state),
            AttributeValue::ID(value) => value.hash(state),
            AttributeValue::List(value) => value.hash(state),
            AttributeValue::Container(value) => value.hash(state),
            AttributeValue::None() => {}
        }
    }
}

impl Eq for AttributeValue {}

impl AttributeValue {
    ///
    /// Try to get attribute value as String
    ///
    /// Returns `Some()` of inner value if value is of variant [`AttributeValue::String`] and `None` otherwise
    ///
    pub fn try_as_string(&self) -> Option<&String> {
        match self {
            AttributeValue::String(v) => Some(v),
            _ => None,
        }
    }
    ///
    /// Try to get attribute value as int
    ///
    pub fn try_as_int(&self) -> Option<&i64> {
        match self {
            AttributeValue::Int(v) => Some(v),
            _ => None,
        }
    }
    ///
    /// Try to get attribute value as date
    ///
    pub fn try_as_date(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            AttributeValue::Date(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
///
/// Attribute made up of the key and value
///
pub struct Attribute {
    /// Attribute key
    pub key: String,
    /// Attribute value
    pub value: AttributeValue,
    /// Child attributes (nested)
    pub own_attributes: Option<Attributes>,
}

impl Attribute {
    ///
    /// Helper to create a new attribute
    ///
    pub fn new(key: String, attribute_val: AttributeValue) -> Self {
        Self {
            key,
            value: attribute_val,
            own_attributes: None,
        }
    }
}

///
/// Attributes are [`Vec`]s of [`Attribute`]s
///
/// See the [`XESEditableAttribute`] trait for convenient functions to add or look up attributes by keys.
pub type Attributes = Vec<Attribute>;

///
/// Trait to easily add and look up attributes
///
pub trait XESEditableAttribute {
    ///
    /// Add a new attribute (with key and value)
    ///
    /// Note: Does _not_ check if attribute was already present.
    ///
    fn add_to_attributes(&mut self, key: String, value: AttributeValue);
    ///
    /// Add a new attribute
    ///
    fn add_attribute(&mut self, attr: Attribute);
    ///
    /// Get an attribute by key
    ///
    /// _Complexity_: Does linear lookup (i.e., in O(n)).
    fn get_by_key(&self, key: &str) -> Option<&Attribute>;
    ///
    /// Get an attribute by key or the default value provided by global attributes
    ///
    fn get_by_key_or_global<'a>(
        &'a self,
        key: &str,
        global_attrs: &'a Option<Attributes>,
    ) -> Option<&'a Attribute>;
}

impl XESEditableAttribute for Attributes {
    fn add_to_attributes(&mut self, key: String, value: AttributeValue) {
        self.push(Attribute::new(key, value));
    }

    fn add_attribute(&mut self, a: Attribute) {
        self.push(a);
    }

    fn get_by_key(&self, key: &str) -> Option<&Attribute> {
        self.iter().find(|attr| attr.key == key)
    }

    fn get_by_key_or_global<'a>(
        &'a self,
        key: &str,
        global_attrs: &'a Option<Attributes>,
    ) -> Option<&'a Attribute> {
        self.get_by_key(key)
            .or_else(|| global_attrs.as_ref().and_then(|g| g.get_by_key(key)))
    }
}

///
/// An event consists of multiple (event) attributes ([Attributes])
///
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Hash, Eq)]
pub struct Event {
    /// Event attributes
    pub attributes: Attributes,
}

impl Event {
    /// Create a new event with the provided activity
    ///
    /// Implicitly assumes usage of the concept XES extension (i.e., uses [`ACTIVITY_NAME`] as key)
    pub fn new(activity: String) -> Self {
        Event {
            attributes: vec![Attribute::new(
                ACTIVITY_NAME.to_string(),
                AttributeValue::String(activity),
            )],
        }
    }

    /// Activity label of this event
    ///
    /// Returns `None` if the event has no [`ACTIVITY_NAME`] attribute of type string
    pub fn activity(&self) -> Option<&str> {
        self.attributes
            .get_by_key(ACTIVITY_NAME)
            .and_then(|a| a.value.try_as_string())
            .map(String::as_str)
    }
}

///
/// Behavioral identity of a [`Trace`]: its activity labels, each prefixed by [`SIGNATURE_SEPARATOR`]
///
/// Traces with identical label sequences share one signature, even if their other attributes differ.
/// Alignments are cached under this key, so this equivalence is a deliberate approximation.
/// Labels that themselves contain [`SIGNATURE_SEPARATOR`] can make distinct sequences collide
/// (`<"a >> b">` and `<a, b>`), and cannot be named in `df:` index features.
///
/// ```rust
/// use log_sampling::core::event_data::case_centric::{Event, Trace};
/// let trace = Trace {
///     attributes: Vec::new(),
///     events: vec![Event::new("a".into()), Event::new("b".into())],
/// };
/// assert_eq!(trace.signature().as_str(), " >> a >> b");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceSignature(String);

impl TraceSignature {
    /// Build a signature from a sequence of activity labels
    pub fn from_activities<'a, I>(activities: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut s = String::new();
        for act in activities {
            s.push_str(SIGNATURE_SEPARATOR);
            s.push_str(act);
        }
        TraceSignature(s)
    }

    /// Underlying string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TraceSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            write!(f, "<empty trace>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

///
/// A trace consists of a list of events and trace attributes (See also [`Event`] and [`Attributes`])
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Trace {
    /// Trace-level attributes
    pub attributes: Attributes,
    /// Events contained in trace
    pub events: Vec<Event>,
}

impl Trace {
    /// Initializes a new trace with no attributes and events
    pub fn new() -> Self {
        Self::default()
    }

    /// Activity labels of all events, in order
    ///
    /// Events without an activity label yield an empty string.
    pub fn activities(&self) -> impl Iterator<Item = &str> + '_ {
        self.events.iter().map(|e| e.activity().unwrap_or_default())
    }

    /// Compute the [`TraceSignature`] of this trace
    pub fn signature(&self) -> TraceSignature {
        TraceSignature::from_activities(self.activities())
    }

    /// Case identifier (i.e., the [`TRACE_ID_NAME`] trace attribute), if present
    pub fn case_id(&self) -> Option<String> {
        self.attributes
            .get_by_key(TRACE_ID_NAME)
            .map(|a| a.value.to_string())
    }
}

///
/// All traces of an [`EventLog`] sharing one [`TraceSignature`]
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceVariant {
    /// Shared signature
    pub signature: TraceSignature,
    /// Number of events of each member trace
    pub event_count: usize,
    /// Indices of member traces in log order (never empty)
    pub trace_indices: Vec<usize>,
}

impl TraceVariant {
    /// Index of the first trace of this variant in the log
    pub fn representative(&self) -> usize {
        self.trace_indices[0]
    }
}

///
/// Event log consisting of a list of [`Trace`]s and log [`Attributes`]
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventLog {
    /// Top-level attributes
    pub attributes: Attributes,
    /// Traces contained in log
    pub traces: Vec<Trace>,
    /// XES Extensions
    pub extensions: Option<Vec<EventLogExtension>>,
    /// XES Event classifiers
    pub classifiers: Option<Vec<EventLogClassifier>>,
    /// Global trace attributes
    pub global_trace_attrs: Option<Attributes>,
    ///  Global event attributes
    pub global_event_attrs: Option<Attributes>,
}

impl EventLog {
    /// Initializes a new event log with no attributes and an empty trace list
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Get a trace attribute value using a key
    ///
    /// Uses global trace attributes of the event log (if any) as fallback
    ///
    pub fn get_trace_attribute<'a>(&'a self, trace: &'a Trace, key: &str) -> Option<&'a Attribute> {
        trace
            .attributes
            .get_by_key_or_global(key, &self.global_trace_attrs)
    }

    /// Signatures of all traces, in log order
    pub fn signatures(&self) -> Vec<TraceSignature> {
        self.traces.iter().map(Trace::signature).collect()
    }

    ///
    /// Group the traces into [`TraceVariant`]s
    ///
    /// Variants are returned in the order of their first occurrence in the log.
    ///
    pub fn variants(&self) -> Vec<TraceVariant> {
        let mut variant_pos: HashMap<TraceSignature, usize> = HashMap::new();
        let mut variants: Vec<TraceVariant> = Vec::new();
        for (index, trace) in self.traces.iter().enumerate() {
            let signature = trace.signature();
            match variant_pos.get(&signature) {
                Some(&pos) => variants[pos].trace_indices.push(index),
                None => {
                    variant_pos.insert(signature.clone(), variants.len());
                    variants.push(TraceVariant {
                        signature,
                        event_count: trace.events.len(),
                        trace_indices: vec![index],
                    });
                }
            }
        }
        variants
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
/// An XES Extension
pub struct EventLogExtension {
    /// Extension name
    pub name: String,
    /// Prefix of attributes defined by the extension
    pub prefix: String,
    /// URI pointing to XESEXT of the XES extension
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Event classifier
///
/// Enables classifying events by a set of attributes to consider for the _class identity_
pub struct EventLogClassifier {
    /// Name of the classifier
    pub name: String,
    /// List of attribute keys to consider for the _class identity_
    pub keys: Vec<String>,
}
