//! Trace indexing
//!
//! Maps every [`Trace`] to a [`FeatureVector`] under a configurable set of [`Feature`]s.
//!
//! Feature names used in index files:
//!
//! | Name               | Value                                         |
//! |--------------------|-----------------------------------------------|
//! | `activity:<label>` | whether `label` occurs in the trace           |
//! | `df:<a> >> <b>`    | whether `a` is directly followed by `b`       |
//! | `length`           | number of events                              |
//! | `trace:<key>`      | trace attribute `key` as text (or absent)     |
//!
//! `df:` names cannot express labels containing `" >> "`; such names are rejected as ambiguous.
use std::{
    collections::{BTreeSet, HashSet},
    fmt::Display,
    path::Path,
    str::FromStr,
};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::core::event_data::case_centric::{constants::SIGNATURE_SEPARATOR, EventLog, Trace};

use super::error::SamplingError;

const ACTIVITY_PREFIX: &str = "activity:";
const DF_PREFIX: &str = "df:";
const TRACE_ATTRIBUTE_PREFIX: &str = "trace:";
const LENGTH_FEATURE: &str = "length";

///
/// A named property of a trace
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Feature {
    /// Whether the activity occurs in the trace
    Activity(String),
    /// Whether the first activity is directly followed by the second one
    DirectlyFollows(String, String),
    /// Number of events
    TraceLength,
    /// Value of a trace attribute
    TraceAttribute(String),
}

impl FromStr for Feature {
    type Err = SamplingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LENGTH_FEATURE {
            Ok(Feature::TraceLength)
        } else if let Some(activity) = s.strip_prefix(ACTIVITY_PREFIX) {
            Ok(Feature::Activity(activity.to_string()))
        } else if let Some(pair) = s.strip_prefix(DF_PREFIX) {
            match pair.split_once(SIGNATURE_SEPARATOR) {
                Some((a, b)) if !b.contains(SIGNATURE_SEPARATOR) => {
                    Ok(Feature::DirectlyFollows(a.to_string(), b.to_string()))
                }
                _ => Err(SamplingError::UnknownFeature(s.to_string())),
            }
        } else if let Some(key) = s.strip_prefix(TRACE_ATTRIBUTE_PREFIX) {
            Ok(Feature::TraceAttribute(key.to_string()))
        } else {
            Err(SamplingError::UnknownFeature(s.to_string()))
        }
    }
}

impl TryFrom<String> for Feature {
    type Error = SamplingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Feature> for String {
    fn from(value: Feature) -> Self {
        value.to_string()
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::Activity(a) => write!(f, "{ACTIVITY_PREFIX}{a}"),
            Feature::DirectlyFollows(a, b) => write!(f, "{DF_PREFIX}{a}{SIGNATURE_SEPARATOR}{b}"),
            Feature::TraceLength => write!(f, "{LENGTH_FEATURE}"),
            Feature::TraceAttribute(key) => write!(f, "{TRACE_ATTRIBUTE_PREFIX}{key}"),
        }
    }
}

///
/// Value of one [`Feature`] for one trace
///
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureValue {
    /// Boolean feature
    Flag(bool),
    /// Counting feature
    Count(u64),
    /// Categorical feature (`None` if absent)
    Category(Option<String>),
}

/// Feature values of a trace, in the order of the configured features
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureVector(pub Vec<FeatureValue>);

///
/// Which features to index traces by
///
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexConfig {
    /// Every activity and directly-follows feature occurring in the log
    #[default]
    All,
    /// Explicitly selected features, in this order
    Selected(Vec<Feature>),
}

impl IndexConfig {
    ///
    /// Parse an index configuration from text
    ///
    /// One feature name per line. Blank lines and lines starting with `#` are skipped,
    /// repeated features only keep their first position.
    pub fn parse(text: &str) -> Result<Self, SamplingError> {
        let features: Vec<Feature> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(Feature::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IndexConfig::Selected(features.into_iter().unique().collect()))
    }

    /// Read an index configuration file (see [`IndexConfig::parse`])
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SamplingError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SamplingError::IndexFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }
}

/// Activities, directly-follows pairs and trace attribute keys occurring in a log
#[derive(Debug, Default)]
struct LogVocabulary<'a> {
    activities: BTreeSet<&'a str>,
    df_pairs: BTreeSet<(&'a str, &'a str)>,
    trace_keys: HashSet<&'a str>,
}

impl<'a> LogVocabulary<'a> {
    fn of(log: &'a EventLog) -> Self {
        let mut vocabulary = LogVocabulary::default();
        for trace in &log.traces {
            vocabulary.activities.extend(trace.activities());
            vocabulary
                .df_pairs
                .extend(trace.activities().tuple_windows::<(_, _)>());
            vocabulary
                .trace_keys
                .extend(trace.attributes.iter().map(|a| a.key.as_str()));
        }
        if let Some(globals) = &log.global_trace_attrs {
            vocabulary
                .trace_keys
                .extend(globals.iter().map(|a| a.key.as_str()));
        }
        vocabulary
    }

    fn contains(&self, feature: &Feature) -> bool {
        match feature {
            Feature::Activity(a) => self.activities.contains(a.as_str()),
            Feature::DirectlyFollows(a, b) => self.df_pairs.contains(&(a.as_str(), b.as_str())),
            Feature::TraceLength => true,
            Feature::TraceAttribute(key) => self.trace_keys.contains(key.as_str()),
        }
    }

    fn all_features(&self) -> Vec<Feature> {
        self.activities
            .iter()
            .map(|a| Feature::Activity(a.to_string()))
            .chain(
                self.df_pairs
                    .iter()
                    .map(|(a, b)| Feature::DirectlyFollows(a.to_string(), b.to_string())),
            )
            .collect()
    }
}

///
/// Resolved list of features, validated against one [`EventLog`]
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureIndex {
    features: Vec<Feature>,
}

impl FeatureIndex {
    ///
    /// Resolve `config` against `log`
    ///
    /// Fails with [`SamplingError::UnavailableFeature`] if a selected feature never occurs in the log.
    pub fn resolve(log: &EventLog, config: &IndexConfig) -> Result<Self, SamplingError> {
        let vocabulary = LogVocabulary::of(log);
        let features = match config {
            IndexConfig::All => vocabulary.all_features(),
            IndexConfig::Selected(features) => {
                if let Some(missing) = features.iter().find(|f| !vocabulary.contains(f)) {
                    return Err(SamplingError::UnavailableFeature(missing.to_string()));
                }
                features.clone()
            }
        };
        Ok(Self { features })
    }

    /// Features in vector order
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    ///
    /// Compute the [`FeatureVector`] of `trace`
    ///
    /// `log` is only consulted for global trace attributes.
    pub fn vector(&self, log: &EventLog, trace: &Trace) -> FeatureVector {
        let activities: HashSet<&str> = trace.activities().collect();
        let df_pairs: HashSet<(&str, &str)> = trace.activities().tuple_windows().collect();
        FeatureVector(
            self.features
                .iter()
                .map(|feature| match feature {
                    Feature::Activity(a) => FeatureValue::Flag(activities.contains(a.as_str())),
                    Feature::DirectlyFollows(a, b) => {
                        FeatureValue::Flag(df_pairs.contains(&(a.as_str(), b.as_str())))
                    }
                    Feature::TraceLength => FeatureValue::Count(trace.events.len() as u64),
                    Feature::TraceAttribute(key) => FeatureValue::Category(
                        log.get_trace_attribute(trace, key)
                            .map(|attr| attr.value.to_string()),
                    ),
                })
                .collect(),
        )
    }
}
