use crate::core::process_models::case_centric::petri_net::{ArcType, Marking, PetriNet, PlaceID};
use quick_xml::{Error as QuickXMLError, Reader};
use std::{collections::HashMap, io::BufRead};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    None,
    Pnml,
    Net,
    Place,
    Transition,
    PlaceName,
    TransitionName,
    InitialMarking,
    FinalMarkings,
    FinalMarkingsMarking,
    FinalMarkingMarkingPlace,
    Arc,
    ArcInscription,
}

fn bytes_to_string(x: &[u8]) -> String {
    String::from_utf8_lossy(x).to_string()
}

///
/// Error encountered while parsing PNML
///
#[derive(Debug)]
pub enum PNMLParseError {
    /// IO error
    IOError(std::io::Error),
    /// XML error (e.g., incorrect XML format )
    XMLParsingError(QuickXMLError),
    /// Missing key on XML element (with expected key included)
    MissingKey(&'static str),
    /// Encountered no PNML tag (i.e., the parsed data was not a PNML file)
    NoPNMLTag,
}

impl std::fmt::Display for PNMLParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PNMLParseError::IOError(e) => write!(f, "Failed to read PNML: {e}"),
            PNMLParseError::XMLParsingError(e) => write!(f, "Failed to parse PNML: {e}"),
            PNMLParseError::MissingKey(key) => {
                write!(f, "Failed to parse PNML: missing attribute '{key}'")
            }
            PNMLParseError::NoPNMLTag => write!(f, "Failed to parse PNML: no <pnml> tag"),
        }
    }
}

impl std::error::Error for PNMLParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PNMLParseError::IOError(e) => Some(e),
            PNMLParseError::XMLParsingError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PNMLParseError {
    fn from(e: std::io::Error) -> Self {
        Self::IOError(e)
    }
}

impl From<QuickXMLError> for PNMLParseError {
    fn from(e: QuickXMLError) -> Self {
        Self::XMLParsingError(e)
    }
}

fn required_attribute(
    b: &quick_xml::events::BytesStart<'_>,
    key: &'static str,
) -> Result<String, PNMLParseError> {
    let attr = b
        .try_get_attribute(key)
        .unwrap_or_default()
        .ok_or(PNMLParseError::MissingKey(key))?;
    Ok(bytes_to_string(attr.value.as_ref()))
}

///
/// Import a PNML file from the given XML reader ([`quick_xml::Reader`])
///
/// Best-effort parser for the Petri nets commonly exchanged in process mining:
///
/// - Places, Transitions
/// - Silent transitions (`$invisible$` toolspecific tag)
/// - Basic arcs with weights
/// - A single initial marking
/// - Multiple final markings
///
/// Also see [`import_pnml_reader`], which takes a buffered reader implementing [`std::io::BufRead`] instead.
pub fn import_pnml<T>(reader: &mut Reader<T>) -> Result<PetriNet, PNMLParseError>
where
    T: BufRead,
{
    reader.config_mut().trim_text(true);
    reader.config_mut().expand_empty_elements = true;
    let mut buf: Vec<u8> = Vec::new();

    let mut current_mode: Mode = Mode::None;
    let mut encountered_pnml_tag = false;
    let mut pn = PetriNet::new();
    let mut initial_marking: Marking = HashMap::new();
    let mut final_markings: Vec<Marking> = vec![];

    let mut id_map: HashMap<String, Uuid> = HashMap::new();
    let mut current_id: Option<Uuid> = None;
    // Arcs are resolved after parsing, once all places and transitions are known
    let mut arcs: Vec<(String, String, u32)> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            quick_xml::events::Event::Start(b) => match b.name().as_ref() {
                b"pnml" => {
                    current_mode = Mode::Pnml;
                    encountered_pnml_tag = true;
                }
                b"net" => {
                    if current_mode != Mode::Pnml {
                        warn!("Encountered <net> outside of <pnml>");
                    }
                    current_mode = Mode::Net;
                }
                b"page" => {
                    if current_mode != Mode::Net {
                        warn!("Encountered <page> outside of <net>");
                    }
                    current_mode = Mode::Net;
                }
                b"place" => {
                    if current_mode == Mode::FinalMarkingsMarking {
                        let id_ref = required_attribute(&b, "idref")?;
                        current_mode = Mode::FinalMarkingMarkingPlace;
                        current_id = id_map.get(&id_ref).copied();
                    } else {
                        current_mode = Mode::Place;
                        let place_id = required_attribute(&b, "id")?;
                        let uuid = Uuid::new_v4();
                        current_id = Some(uuid);
                        id_map.insert(place_id, uuid);
                        pn.add_place(Some(uuid));
                    }
                }
                b"transition" => {
                    current_mode = Mode::Transition;
                    let trans_id = required_attribute(&b, "id")?;
                    let uuid = Uuid::new_v4();
                    current_id = Some(uuid);
                    id_map.insert(trans_id, uuid);
                    pn.add_transition(Some(String::new()), Some(uuid));
                }
                b"arc" => {
                    let source_id = required_attribute(&b, "source")?;
                    let target_id = required_attribute(&b, "target")?;
                    arcs.push((source_id, target_id, 1));
                    current_mode = Mode::Arc;
                }
                b"inscription" => {
                    if current_mode == Mode::Arc {
                        current_mode = Mode::ArcInscription;
                    }
                }
                b"toolspecific" => {
                    if let Some(attr) = b.try_get_attribute("activity").unwrap_or_default() {
                        if attr.value.as_ref() == b"$invisible$" {
                            match current_id.and_then(|id| pn.transitions.get_mut(&id)) {
                                Some(trans) => trans.label = None,
                                None => warn!("No current transition for <toolspecific>"),
                            }
                        }
                    }
                }
                b"initialMarking" => {
                    current_mode = Mode::InitialMarking;
                }
                b"finalmarkings" => current_mode = Mode::FinalMarkings,
                b"marking" => {
                    if current_mode == Mode::FinalMarkings {
                        current_mode = Mode::FinalMarkingsMarking;
                        final_markings.push(HashMap::new());
                    }
                }
                b"name" => match current_mode {
                    Mode::Place => current_mode = Mode::PlaceName,
                    Mode::Transition => current_mode = Mode::TransitionName,
                    _ => {}
                },
                _ => {}
            },
            quick_xml::events::Event::End(b) => match b.name().as_ref() {
                b"place" => {
                    current_mode = if current_mode == Mode::FinalMarkingMarkingPlace {
                        Mode::FinalMarkingsMarking
                    } else {
                        Mode::Net
                    };
                    current_id = None;
                }
                b"transition" => {
                    current_mode = Mode::Net;
                    current_id = None;
                }
                b"initialMarking" => current_mode = Mode::Place,
                b"finalmarkings" => current_mode = Mode::Net,
                b"marking" => current_mode = Mode::FinalMarkings,
                b"inscription" => {
                    if current_mode == Mode::ArcInscription {
                        current_mode = Mode::Arc
                    }
                }
                b"arc" => current_mode = Mode::Net,
                b"name" => match current_mode {
                    Mode::PlaceName => current_mode = Mode::Place,
                    Mode::TransitionName => current_mode = Mode::Transition,
                    _ => {}
                },
                _ => {}
            },
            quick_xml::events::Event::Text(t) => {
                let text = bytes_to_string(t.as_ref());
                match current_mode {
                    Mode::TransitionName => {
                        match current_id.and_then(|id| pn.transitions.get_mut(&id)) {
                            // Silent transitions keep their `None` label
                            Some(trans) if trans.label.is_some() => trans.label = Some(text),
                            Some(_) => {}
                            None => warn!("No current transition for <name>"),
                        }
                    }
                    Mode::InitialMarking => {
                        if let Some(place) = current_id.and_then(|id| pn.places.get(&id)) {
                            initial_marking.insert(place.into(), text.parse().unwrap_or_default());
                        }
                    }
                    Mode::FinalMarkingMarkingPlace => {
                        if let (Some(place_id), Some(fm)) = (current_id, final_markings.last_mut())
                        {
                            fm.insert(PlaceID(place_id), text.parse().unwrap_or_default());
                        }
                    }
                    Mode::ArcInscription => {
                        if let Some(arc) = arcs.last_mut() {
                            arc.2 = text.parse().unwrap_or(1);
                        }
                    }
                    _ => {}
                }
            }
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !encountered_pnml_tag {
        return Err(PNMLParseError::NoPNMLTag);
    }

    for (from, to, weight) in arcs {
        let (Some(from_uuid), Some(to_uuid)) = (id_map.get(&from), id_map.get(&to)) else {
            warn!("Skipping arc {from} -> {to} with unknown endpoint");
            continue;
        };
        let from_to = if let (Some(place), Some(trans)) =
            (pn.places.get(from_uuid), pn.transitions.get(to_uuid))
        {
            Some(ArcType::place_to_transition(place.into(), trans.into()))
        } else if let (Some(trans), Some(place)) =
            (pn.transitions.get(from_uuid), pn.places.get(to_uuid))
        {
            Some(ArcType::transition_to_place(trans.into(), place.into()))
        } else {
            None
        };
        match from_to {
            Some(from_to) => pn.add_arc(from_to, Some(weight)),
            None => warn!("Skipping arc {from} -> {to} between nodes of the same kind"),
        }
    }
    if !initial_marking.is_empty() {
        pn.initial_marking = Some(initial_marking);
    }
    if !final_markings.is_empty() {
        pn.final_markings = Some(final_markings);
    }
    Ok(pn)
}

///
/// Import a PNML file from the given standard buffered reader (implementing [`std::io::BufRead`])
///
pub fn import_pnml_reader<T>(std_reader: &mut T) -> Result<PetriNet, PNMLParseError>
where
    T: BufRead,
{
    let mut xml_reader = Reader::from_reader(std_reader);
    import_pnml(&mut xml_reader)
}

/// Import a PNML file from the given filepath
///
/// Also consider using [`PetriNet::import_pnml`] for convenience or [`import_pnml`] for more control over the reader.
pub fn import_pnml_from_path<P: AsRef<std::path::Path>>(
    path: P,
) -> Result<PetriNet, PNMLParseError> {
    import_pnml(&mut Reader::from_file(path)?)
}

/// Import a PNML model from a string
pub fn import_pnml_str(pnml: &str) -> Result<PetriNet, PNMLParseError> {
    import_pnml_reader(&mut pnml.as_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    const SEQUENTIAL_NET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<pnml>
  <net id="net1" type="http://www.pnml.org/version-2009/grammar/pnmlcoremodel">
    <page id="n0">
      <place id="source"><name><text>source</text></name>
        <initialMarking><text>1</text></initialMarking>
      </place>
      <place id="p1"><name><text>p1</text></name></place>
      <place id="sink"><name><text>sink</text></name></place>
      <transition id="t_a"><name><text>a</text></name></transition>
      <transition id="tau">
        <name><text>tau</text></name>
        <toolspecific tool="ProM" version="6.4" activity="$invisible$" localNodeID="x"/>
      </transition>
      <arc id="a1" source="source" target="t_a"/>
      <arc id="a2" source="t_a" target="p1">
        <inscription><text>2</text></inscription>
      </arc>
      <arc id="a3" source="p1" target="tau"/>
      <arc id="a4" source="tau" target="sink"/>
      <arc id="a5" source="p1" target="sink"/>
    </page>
    <finalmarkings>
      <marking>
        <place idref="sink"><text>1</text></place>
      </marking>
    </finalmarkings>
  </net>
</pnml>"#;

    #[test]
    fn test_pnml_import() {
        let pn = import_pnml_str(SEQUENTIAL_NET).unwrap();
        assert_eq!(pn.places.len(), 3);
        assert_eq!(pn.transitions.len(), 2);
        // place -> place arc is dropped
        assert_eq!(pn.arcs.len(), 4);
        assert!(pn.arcs.iter().any(|arc| arc.weight == 2));
        assert_eq!(pn.visible_labels(), vec!["a"]);
        let silent = pn.transitions.values().filter(|t| t.label.is_none());
        assert_eq!(silent.count(), 1);
        let (im, fm) = pn.initial_and_final_marking().unwrap();
        assert_eq!(im.values().sum::<u64>(), 1);
        assert_eq!(fm.values().sum::<u64>(), 1);
        assert_ne!(im.keys().next(), fm.keys().next());
    }

    #[test]
    fn test_pnml_without_markings() {
        let pn = import_pnml_str(
            r#"<pnml><net id="n"><place id="p"/><transition id="t"><name><text>x</text></name></transition></net></pnml>"#,
        )
        .unwrap();
        assert!(pn.initial_marking.is_none());
        assert!(pn.initial_and_final_marking().is_none());
    }

    #[test]
    fn test_invalid_pnml_import() {
        let res = import_pnml_str("<log><trace/></log>");
        assert!(matches!(res, Err(PNMLParseError::NoPNMLTag)));

        let res = import_pnml_str(r#"<pnml><net><place/></net></pnml>"#);
        assert!(matches!(res, Err(PNMLParseError::MissingKey("id"))));
    }
}
