use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
/// Place in a Petri net
pub struct Place {
    id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
/// Transition in a Petri net
pub struct Transition {
    /// Transition label (None if this transition is _invisible_)
    pub label: Option<String>,
    id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", content = "nodes")]
/// Arc type in a Petri net
pub enum ArcType {
    /// From Place to Transition
    PlaceTransition(Uuid, Uuid),
    /// From Transition to Place
    TransitionPlace(Uuid, Uuid),
}

impl ArcType {
    /// Create new from place to transition
    pub fn place_to_transition(from: PlaceID, to: TransitionID) -> ArcType {
        ArcType::PlaceTransition(from.0, to.0)
    }
    /// Create new from transition to place
    pub fn transition_to_place(from: TransitionID, to: PlaceID) -> ArcType {
        ArcType::TransitionPlace(from.0, to.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
/// Arc in a Petri net
///
/// Connecting a transition and a place (or the other way around)
pub struct Arc {
    /// Source and target of Arc
    pub from_to: ArcType,
    /// Weight (i.e., how many tokens this arc moves)
    pub weight: u32,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Eq, Hash)]
/// Place ID
pub struct PlaceID(pub Uuid);

impl From<&Place> for PlaceID {
    fn from(value: &Place) -> Self {
        PlaceID(value.id)
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
/// Transition ID
pub struct TransitionID(pub Uuid);

impl From<&Transition> for TransitionID {
    fn from(value: &Transition) -> Self {
        TransitionID(value.id)
    }
}

/// Marking of a Petri net: Assigning [`PlaceID`]s to a number of tokens
pub type Marking = HashMap<PlaceID, u64>;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
///
/// A Petri net of [`Place`]s and [`Transition`]s
///
/// Bipartite graph of [`Place`]s and [`Transition`]s with [`Arc`]s connecting them, as well as initial and final [`Marking`]s.
/// The sampling core treats it as opaque and only hands it to the alignment oracle.
pub struct PetriNet {
    /// Places
    pub places: HashMap<Uuid, Place>,
    /// Transitions
    pub transitions: HashMap<Uuid, Transition>,
    /// Arcs
    pub arcs: Vec<Arc>,
    /// Initial marking
    pub initial_marking: Option<Marking>,
    /// Final markings (any of them are accepted as a final marking)
    pub final_markings: Option<Vec<Marking>>,
}

impl PetriNet {
    /// Create new [`PetriNet`] with no places or transitions
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a place (with an optional passed UUID)
    ///
    /// If no ID is passed, a new UUID will be generated
    pub fn add_place(&mut self, place_id: Option<Uuid>) -> PlaceID {
        let place_id = place_id.unwrap_or_else(Uuid::new_v4);
        self.places.insert(place_id, Place { id: place_id });
        PlaceID(place_id)
    }

    /// Add a transition with an label (and with an optional passed UUID)
    ///
    /// If no ID is passed, a new UUID will be generated
    pub fn add_transition(
        &mut self,
        label: Option<String>,
        transition_id: Option<Uuid>,
    ) -> TransitionID {
        let transition_id = transition_id.unwrap_or_else(Uuid::new_v4);
        self.transitions.insert(
            transition_id,
            Transition {
                id: transition_id,
                label,
            },
        );
        TransitionID(transition_id)
    }

    /// Add an arc
    pub fn add_arc(&mut self, from_to: ArcType, weight: Option<u32>) {
        self.arcs.push(Arc {
            from_to,
            weight: weight.unwrap_or(1),
        });
    }

    /// Sorted, deduplicated labels of all visible transitions
    pub fn visible_labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self
            .transitions
            .values()
            .filter_map(|t| t.label.as_deref())
            .collect();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// The initial marking together with the first final marking
    ///
    /// Returns `None` if either of them is missing.
    pub fn initial_and_final_marking(&self) -> Option<(&Marking, &Marking)> {
        let initial = self.initial_marking.as_ref()?;
        let final_marking = self.final_markings.as_ref()?.first()?;
        Some((initial, final_marking))
    }

    /// Import Petri net from a PNML file
    pub fn import_pnml<P: AsRef<std::path::Path>>(
        path: P,
    ) -> Result<PetriNet, super::pnml::PNMLParseError> {
        super::pnml::import_pnml_from_path(path)
    }
}
