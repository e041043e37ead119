//! Helpers for tests: small event logs, Petri nets and mock alignment oracles
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use crate::{
    conformance::alignment::{AlignmentMove, AlignmentOracle, AlignmentResult, OracleError},
    core::{
        event_data::case_centric::{
            constants::TRACE_ID_NAME, Event, EventLog, Trace, XESEditableAttribute,
        },
        process_models::case_centric::petri_net::{ArcType, Marking, PetriNet},
    },
};

///
/// Event log with `count` traces per activity sequence, in the given order
///
/// Traces get consecutive case ids (`case_0`, `case_1`, ...).
pub fn event_log_from_variants(variants: &[(&[&str], usize)]) -> EventLog {
    let mut log = EventLog::new();
    for (activities, count) in variants {
        for _ in 0..*count {
            let mut trace = Trace::new();
            trace.attributes.add_to_attributes(
                TRACE_ID_NAME.to_string(),
                format!("case_{}", log.traces.len()).into(),
            );
            trace.events = activities
                .iter()
                .map(|a| Event::new(a.to_string()))
                .collect();
            log.traces.push(trace);
        }
    }
    log
}

///
/// XES document with `count` traces per activity sequence
///
pub fn xes_from_variants(variants: &[(&[&str], usize)]) -> String {
    let mut xes = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" ?>
<log xes.version="1.0" xmlns="http://www.xes-standard.org/">
"#,
    );
    let mut case = 0;
    for (activities, count) in variants {
        for _ in 0..*count {
            xes.push_str(&format!(
                "  <trace>\n    <string key=\"concept:name\" value=\"case_{case}\"/>\n"
            ));
            for activity in activities.iter() {
                xes.push_str(&format!(
                    "    <event><string key=\"concept:name\" value=\"{activity}\"/></event>\n"
                ));
            }
            xes.push_str("  </trace>\n");
            case += 1;
        }
    }
    xes.push_str("</log>\n");
    xes
}

/// PNML of a net with one transition per label, each moving a token from `source` to `sink`
pub fn pnml_for_labels(labels: &[&str]) -> String {
    let mut pnml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<pnml>
  <net id="net" type="http://www.pnml.org/version-2009/grammar/pnmlcoremodel">
    <page id="page">
      <place id="source"><initialMarking><text>1</text></initialMarking></place>
      <place id="sink"/>
"#,
    );
    for (i, label) in labels.iter().enumerate() {
        pnml.push_str(&format!(
            "      <transition id=\"t{i}\"><name><text>{label}</text></name></transition>\n      <arc id=\"in{i}\" source=\"source\" target=\"t{i}\"/>\n      <arc id=\"out{i}\" source=\"t{i}\" target=\"sink\"/>\n"
        ));
    }
    pnml.push_str(
        r#"    </page>
    <finalmarkings><marking><place idref="sink"><text>1</text></place></marking></finalmarkings>
  </net>
</pnml>
"#,
    );
    pnml
}

///
/// Petri net with one transition per label between a source and a sink place
///
/// Returns the net, its initial marking (one token in the source) and its final marking (one token in the sink).
pub fn simple_net(labels: &[&str]) -> (PetriNet, Marking, Marking) {
    let mut net = PetriNet::new();
    let source = net.add_place(None);
    let sink = net.add_place(None);
    for label in labels {
        let t = net.add_transition(Some(label.to_string()), None);
        net.add_arc(ArcType::place_to_transition(source, t), None);
        net.add_arc(ArcType::transition_to_place(t, sink), None);
    }
    let initial_marking = Marking::from([(source, 1)]);
    let final_marking = Marking::from([(sink, 1)]);
    net.initial_marking = Some(initial_marking.clone());
    net.final_markings = Some(vec![final_marking.clone()]);
    (net, initial_marking, final_marking)
}

/// Shared view on the number of calls of a [`CountingOracle`]
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    /// Number of calls so far
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

type AlignFn = dyn Fn(&[&str]) -> Result<AlignmentResult, OracleError> + Send + Sync;

///
/// Mock [`AlignmentOracle`] computing results from the activity sequence and counting its calls
///
pub struct CountingOracle {
    align_fn: Box<AlignFn>,
    calls: CallCounter,
}

impl std::fmt::Debug for CountingOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingOracle")
            .field("calls", &self.calls.get())
            .finish()
    }
}

impl CountingOracle {
    /// Oracle answering with `align_fn`
    pub fn new<F>(align_fn: F) -> Self
    where
        F: Fn(&[&str]) -> Result<AlignmentResult, OracleError> + Send + Sync + 'static,
    {
        Self {
            align_fn: Box::new(align_fn),
            calls: CallCounter::default(),
        }
    }

    /// Oracle declaring every trace fitting
    pub fn fitting() -> Self {
        Self::new(|activities| {
            Ok(AlignmentResult::new(
                0.0,
                activities
                    .iter()
                    .map(|a| AlignmentMove::Synchronous(a.to_string()))
                    .collect(),
            ))
        })
    }

    /// Oracle treating every occurrence of one of `labels` as a log move of cost 1
    pub fn deviating_on(labels: &[&str]) -> Self {
        let deviating: HashSet<String> = labels.iter().map(|l| l.to_string()).collect();
        Self::new(move |activities| {
            let moves: Vec<AlignmentMove> = activities
                .iter()
                .map(|a| {
                    if deviating.contains(*a) {
                        AlignmentMove::LogMove(a.to_string())
                    } else {
                        AlignmentMove::Synchronous(a.to_string())
                    }
                })
                .collect();
            let cost = moves
                .iter()
                .filter(|m| matches!(m, AlignmentMove::LogMove(_)))
                .count();
            Ok(AlignmentResult::new(cost as f64, moves))
        })
    }

    /// Counter observing the calls of this oracle (also after it was moved into a cache)
    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }
}

impl AlignmentOracle for CountingOracle {
    fn align(
        &self,
        trace: &Trace,
        _net: &PetriNet,
        _initial_marking: &Marking,
        _final_marking: &Marking,
    ) -> Result<AlignmentResult, OracleError> {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        let activities: Vec<&str> = trace.activities().collect();
        (self.align_fn)(&activities)
    }
}
