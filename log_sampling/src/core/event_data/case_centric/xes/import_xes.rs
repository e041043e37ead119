use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use flate2::bufread::GzDecoder;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event as XMLEvent};
use quick_xml::Error as QuickXMLError;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::core::event_data::case_centric::{
    Attribute, AttributeValue, Attributes, Event, EventLog, EventLogClassifier,
    EventLogExtension, Trace, XESEditableAttribute,
};

///
/// Error encountered while parsing XES
///
#[derive(Debug)]
pub enum XESParseError {
    /// An Attribute was encountered outside an open `<log>` tag
    AttributeOutsideLog,
    /// There is not top-level `<log>`
    NoTopLevelLog,
    /// Parsing error: Expected to have a previously constructed trace available
    MissingLastTrace,
    /// Parsing error: Expected to have a previously constructed event available
    MissingLastEvent,
    /// IO errror
    IOError(std::io::Error),
    /// XML error (e.g., incorrect XML format )
    XMLParsingError(QuickXMLError),
    /// Missing key on XML element (with expected key included)
    MissingKey(&'static str),
    /// Invalid value of XML attribute with key (with key included)
    InvalidKeyValue(&'static str),
}

impl std::fmt::Display for XESParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            XESParseError::IOError(e) => write!(f, "Failed to read XES: {e}"),
            XESParseError::XMLParsingError(e) => write!(f, "Failed to parse XES: {e}"),
            other => write!(f, "Failed to parse XES: {other:?}"),
        }
    }
}

impl std::error::Error for XESParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            XESParseError::IOError(e) => Some(e),
            XESParseError::XMLParsingError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for XESParseError {
    fn from(e: std::io::Error) -> Self {
        Self::IOError(e)
    }
}

impl From<QuickXMLError> for XESParseError {
    fn from(e: QuickXMLError) -> Self {
        Self::XMLParsingError(e)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
///
/// Options for XES Import
///
pub struct XESImportOptions {
    /// If Some: Ignore all event attributes, except attributes with keys in the provided allowlist
    ///
    /// Sampling only needs activity labels, so large logs can be loaded with
    /// `Some(HashSet::from(["concept:name".to_string()]))` to save memory.
    /// Does not effect global event attributes.
    pub ignore_event_attributes_except: Option<HashSet<String>>,
    /// Optional date format to use when parsing `DateTimes` (first trying [`chrono::DateTime`] then falling back to [`chrono::NaiveDateTime`] with UTC timezone).
    ///
    /// Will fall back to default formats (e.g., rfc3339) if parsing fails using passed `date_format`
    pub date_format: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
///
/// Current Parsing Mode (i.e., which tag is currently open / being parsed)
///
enum Mode {
    Log,
    Trace,
    Event,
    GlobalTraceAttributes,
    GlobalEventAttributes,
    None,
}

struct XESParser<'o> {
    options: &'o XESImportOptions,
    log: EventLog,
    mode: Mode,
    encountered_log: bool,
    current_trace: Option<Trace>,
    /// Nested attributes whose closing tag was not yet encountered (innermost last)
    open_attributes: Vec<Attribute>,
    global_trace_attrs: Attributes,
    global_event_attrs: Attributes,
    extensions: Vec<EventLogExtension>,
    classifiers: Vec<EventLogClassifier>,
}

fn is_attribute_tag(name: &[u8]) -> bool {
    matches!(
        name,
        b"string" | b"date" | b"int" | b"float" | b"boolean" | b"id" | b"list" | b"container"
    )
}

impl<'o> XESParser<'o> {
    fn new(options: &'o XESImportOptions) -> Self {
        Self {
            options,
            log: EventLog::new(),
            mode: Mode::None,
            encountered_log: false,
            current_trace: None,
            open_attributes: Vec::new(),
            global_trace_attrs: Attributes::new(),
            global_event_attrs: Attributes::new(),
            extensions: Vec::new(),
            classifiers: Vec::new(),
        }
    }

    fn parse<R: BufRead>(mut self, reader: &mut Reader<R>) -> Result<EventLog, XESParseError> {
        reader.config_mut().trim_text(true);
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                XMLEvent::Start(t) => self.open_tag(&t, false)?,
                XMLEvent::Empty(t) => self.open_tag(&t, true)?,
                XMLEvent::End(t) => self.close_tag(t.name().as_ref())?,
                XMLEvent::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        if !self.encountered_log {
            return Err(XESParseError::NoTopLevelLog);
        }
        let mut log = self.log;
        log.extensions = Some(self.extensions);
        log.classifiers = Some(self.classifiers);
        if !self.global_trace_attrs.is_empty() {
            log.global_trace_attrs = Some(self.global_trace_attrs);
        }
        if !self.global_event_attrs.is_empty() {
            log.global_event_attrs = Some(self.global_event_attrs);
        }
        Ok(log)
    }

    fn open_tag(&mut self, t: &BytesStart<'_>, is_empty: bool) -> Result<(), XESParseError> {
        let name = t.name();
        let name = name.as_ref();
        if name == b"log" {
            self.encountered_log = true;
            self.mode = if is_empty { Mode::None } else { Mode::Log };
            return Ok(());
        }
        if !self.encountered_log {
            return Err(XESParseError::NoTopLevelLog);
        }
        match name {
            b"trace" => {
                self.mode = Mode::Trace;
                self.current_trace = Some(Trace::new());
                if is_empty {
                    self.close_tag(b"trace")?;
                }
            }
            b"event" => {
                let trace = self
                    .current_trace
                    .as_mut()
                    .ok_or(XESParseError::MissingLastTrace)?;
                trace.events.push(Event::default());
                self.mode = if is_empty { Mode::Trace } else { Mode::Event };
            }
            b"global" => {
                self.mode = match get_attribute_string(t, "scope").as_deref() {
                    Some("trace") => Mode::GlobalTraceAttributes,
                    Some("event") => Mode::GlobalEventAttributes,
                    Some(_) => return Err(XESParseError::InvalidKeyValue("scope")),
                    None => return Err(XESParseError::MissingKey("scope")),
                };
                if is_empty {
                    self.mode = Mode::Log;
                }
            }
            b"extension" => self.extensions.push(EventLogExtension {
                name: get_attribute_string(t, "name").unwrap_or_default(),
                prefix: get_attribute_string(t, "prefix").unwrap_or_default(),
                uri: get_attribute_string(t, "uri").unwrap_or_default(),
            }),
            b"classifier" => self.classifiers.push(EventLogClassifier {
                name: get_attribute_string(t, "name").unwrap_or_default(),
                keys: get_attribute_string(t, "keys")
                    .unwrap_or_default()
                    .split(' ')
                    .map(|s| s.to_string())
                    .collect(),
            }),
            n if is_attribute_tag(n) => {
                let key = get_attribute_string(t, "key").ok_or(XESParseError::MissingKey("key"))?;
                let value = parse_attribute_value_from_tag(t, self.options);
                let attr = Attribute::new(key, value);
                if is_empty {
                    self.attach_attribute(attr)?;
                } else {
                    self.open_attributes.push(attr);
                }
            }
            // E.g., the <values> wrapper of XES lists: children are attached to the open list
            _ => {}
        }
        Ok(())
    }

    fn close_tag(&mut self, name: &[u8]) -> Result<(), XESParseError> {
        match name {
            b"trace" => {
                let mut trace = self
                    .current_trace
                    .take()
                    .ok_or(XESParseError::MissingLastTrace)?;
                trace.events.shrink_to_fit();
                self.log.traces.push(trace);
                self.mode = Mode::Log;
            }
            b"event" => self.mode = Mode::Trace,
            b"global" => self.mode = Mode::Log,
            b"log" => self.mode = Mode::None,
            n if is_attribute_tag(n) => match self.open_attributes.pop() {
                Some(attr) => self.attach_attribute(attr)?,
                None => warn!("Closing attribute tag without open attribute"),
            },
            _ => {}
        }
        Ok(())
    }

    /// Attach a completely parsed attribute to the innermost open element
    fn attach_attribute(&mut self, attr: Attribute) -> Result<(), XESParseError> {
        if let Some(parent) = self.open_attributes.last_mut() {
            match &mut parent.value {
                AttributeValue::List(l) => l.push(attr),
                AttributeValue::Container(c) => c.push(attr),
                _ => parent
                    .own_attributes
                    .get_or_insert_with(Attributes::new)
                    .push(attr),
            }
            return Ok(());
        }
        match self.mode {
            Mode::Log => self.log.attributes.add_attribute(attr),
            Mode::Trace => self
                .current_trace
                .as_mut()
                .ok_or(XESParseError::MissingLastTrace)?
                .attributes
                .add_attribute(attr),
            Mode::Event => {
                let keep = self
                    .options
                    .ignore_event_attributes_except
                    .as_ref()
                    .map_or(true, |allowed| allowed.contains(&attr.key));
                if keep {
                    self.current_trace
                        .as_mut()
                        .ok_or(XESParseError::MissingLastTrace)?
                        .events
                        .last_mut()
                        .ok_or(XESParseError::MissingLastEvent)?
                        .attributes
                        .add_attribute(attr);
                }
            }
            Mode::GlobalTraceAttributes => self.global_trace_attrs.add_attribute(attr),
            Mode::GlobalEventAttributes => self.global_event_attrs.add_attribute(attr),
            Mode::None => return Err(XESParseError::AttributeOutsideLog),
        }
        Ok(())
    }
}

fn get_attribute_string(t: &BytesStart<'_>, key: &'static str) -> Option<String> {
    match t.try_get_attribute(key) {
        Ok(Some(attr)) => {
            let raw = String::from_utf8_lossy(&attr.value).to_string();
            Some(match unescape(&raw) {
                Ok(s) => s.into_owned(),
                Err(_) => raw,
            })
        }
        _ => None,
    }
}

fn parse_attribute_value_from_tag(
    t: &BytesStart<'_>,
    options: &XESImportOptions,
) -> AttributeValue {
    let value = get_attribute_string(t, "value").unwrap_or_default();
    match t.name().as_ref() {
        b"string" => AttributeValue::String(value),
        b"date" => match parse_date_from_str(&value, &options.date_format) {
            Some(dt) => AttributeValue::Date(dt),
            None => {
                warn!("Failed to parse date from {:?}", value);
                AttributeValue::None()
            }
        },
        b"int" => match value.parse::<i64>() {
            Ok(n) => AttributeValue::Int(n),
            Err(e) => {
                warn!("Could not parse integer {:?}: {}", value, e);
                AttributeValue::None()
            }
        },
        b"float" => match value.parse::<f64>() {
            Ok(n) => AttributeValue::Float(n),
            Err(e) => {
                warn!("Could not parse float {:?}: {}", value, e);
                AttributeValue::None()
            }
        },
        b"boolean" => match value.parse::<bool>() {
            Ok(b) => AttributeValue::Boolean(b),
            Err(e) => {
                warn!("Could not parse boolean {:?}: {}", value, e);
                AttributeValue::None()
            }
        },
        b"id" => match Uuid::from_str(&value) {
            Ok(id) => AttributeValue::ID(id),
            Err(e) => {
                warn!("Could not parse UUID {:?}: {}", value, e);
                AttributeValue::None()
            }
        },
        b"container" => AttributeValue::Container(Attributes::new()),
        b"list" => AttributeValue::List(Vec::new()),
        _ => AttributeValue::None(),
    }
}

fn parse_date_from_str(value: &str, date_format: &Option<String>) -> Option<DateTime<FixedOffset>> {
    if let Some(date_format) = date_format {
        if let Ok(dt) = DateTime::parse_from_str(value, date_format) {
            return Some(dt);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, date_format) {
            return Some(dt.and_utc().fixed_offset());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S:%f%:z") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc().fixed_offset());
    }
    None
}

/// Parse XES from the given reader
pub fn import_xes<T>(reader: T, options: XESImportOptions) -> Result<EventLog, XESParseError>
where
    T: BufRead,
{
    let mut xml_reader = Reader::from_reader(reader);
    XESParser::new(&options).parse(&mut xml_reader)
}

///
/// Import a XES [`EventLog`] from a file path
///
/// Paths ending in `.gz` are decompressed on the fly.
///
pub fn import_xes_file<P: AsRef<Path>>(
    path: P,
    options: XESImportOptions,
) -> Result<EventLog, XESParseError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if path.to_string_lossy().ends_with(".gz") {
        let dec = GzDecoder::new(BufReader::new(file));
        import_xes(BufReader::new(dec), options)
    } else {
        import_xes(BufReader::new(file), options)
    }
}

///
/// Import a XES [`EventLog`] directly from a string
///
pub fn import_xes_str(xes_str: &str, options: XESImportOptions) -> Result<EventLog, XESParseError> {
    import_xes(BufReader::new(xes_str.as_bytes()), options)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::{write::GzEncoder, Compression};

    use super::*;

    const SMALL_XES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<log xes.version="1.0" xmlns="http://www.xes-standard.org/">
    <extension name="Concept" prefix="concept" uri="http://www.xes-standard.org/concept.xesext"/>
    <global scope="event">
        <string key="concept:name" value="__INVALID__"/>
    </global>
    <classifier name="Activity" keys="concept:name"/>
    <string key="concept:name" value="small log"/>
    <trace>
        <string key="concept:name" value="case-1"/>
        <event>
            <string key="concept:name" value="register &amp; check"/>
            <date key="time:timestamp" value="2024-01-01T10:00:00.000+01:00"/>
            <int key="cost" value="12"/>
        </event>
        <event>
            <string key="concept:name" value="decide"/>
            <list key="reviewers">
                <values>
                    <string key="name" value="Ann"/>
                    <string key="name" value="Bo"/>
                </values>
            </list>
        </event>
    </trace>
    <trace>
        <string key="concept:name" value="case-2"/>
        <event>
            <string key="concept:name" value="decide"/>
            <boolean key="urgent" value="true"/>
        </event>
    </trace>
    <trace/>
</log>"#;

    #[test]
    fn imports_small_log() {
        let log = import_xes_str(SMALL_XES, XESImportOptions::default()).unwrap();
        assert_eq!(log.traces.len(), 3);
        assert_eq!(log.traces[0].case_id().as_deref(), Some("case-1"));
        assert_eq!(
            log.traces[0].activities().collect::<Vec<_>>(),
            vec!["register & check", "decide"]
        );
        assert!(log.traces[2].events.is_empty());
        assert_eq!(log.classifiers.as_ref().map(Vec::len), Some(1));
        assert_eq!(log.extensions.as_ref().map(Vec::len), Some(1));
        assert_eq!(log.global_event_attrs.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            log.attributes
                .get_by_key("concept:name")
                .map(|a| a.value.to_string()),
            Some("small log".to_string())
        );
        let first = &log.traces[0].events[0];
        assert_eq!(
            first
                .attributes
                .get_by_key("cost")
                .and_then(|a| a.value.try_as_int()),
            Some(&12)
        );
        assert!(first
            .attributes
            .get_by_key("time:timestamp")
            .and_then(|a| a.value.try_as_date())
            .is_some());
        let reviewers = log.traces[0].events[1]
            .attributes
            .get_by_key("reviewers")
            .unwrap();
        match &reviewers.value {
            AttributeValue::List(l) => assert_eq!(l.len(), 2),
            other => panic!("Expected list, got {other:?}"),
        }
    }

    #[test]
    fn event_attribute_allowlist() {
        let options = XESImportOptions {
            ignore_event_attributes_except: Some(HashSet::from(["concept:name".to_string()])),
            ..XESImportOptions::default()
        };
        let log = import_xes_str(SMALL_XES, options).unwrap();
        assert!(log
            .traces
            .iter()
            .flat_map(|t| t.events.iter())
            .all(|e| e.attributes.len() == 1));
        assert_eq!(log.traces[1].signature().as_str(), " >> decide");
    }

    #[test]
    fn imports_gzipped_file() {
        let file = tempfile::Builder::new()
            .suffix(".xes.gz")
            .tempfile()
            .unwrap();
        let mut enc = GzEncoder::new(file.as_file(), Compression::default());
        enc.write_all(SMALL_XES.as_bytes()).unwrap();
        enc.finish().unwrap();
        let log = import_xes_file(file.path(), XESImportOptions::default()).unwrap();
        assert_eq!(log.traces.len(), 3);
    }

    #[test]
    fn rejects_missing_log_tag() {
        let res = import_xes_str(
            r#"<trace><event><string key="concept:name" value="a"/></event></trace>"#,
            XESImportOptions::default(),
        );
        assert!(matches!(res, Err(XESParseError::NoTopLevelLog)));
    }

    #[test]
    fn rejects_malformed_xml() {
        let res = import_xes_str(
            "<log><trace><event></trace></log>",
            XESImportOptions::default(),
        );
        assert!(matches!(res, Err(XESParseError::XMLParsingError(_))));
    }
}
