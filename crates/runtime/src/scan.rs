//! Scan evaluator
//!
//! Walks a node list left to right, threading a single power-flow condition
//! through it. Every node is evaluated on every scan, even after the
//! condition has gone false, so timers, counters and edge detectors see every
//! transition.
//!
//! How each node combines with the incoming condition:
//!
//! | Node | Effect |
//! |------|--------|
//! | contacts, compares, on-delay timer | `acc && result` |
//! | off-delay timer | replaces `acc` |
//! | math, move, counters, reset | pass-through |
//! | branch | `acc && (left \|\| right)` |
//! | unknown or stray coil | pass-through |
//! | malformed | `false` |

use crate::elements;
use crate::image::ProcessImage;
use crate::program::{Branch, CoilKind, CoilSlot, Element, Node, NodeList, Wire};
use tracing::{trace, warn};

/// Fold a node list starting from `condition_in`.
///
/// Returns the final condition and the list's trailing coil, which is not
/// driven here. An empty list yields false; a list holding only a coil yields
/// `condition_in`.
pub fn evaluate<'a>(
    image: &mut ProcessImage,
    list: &'a NodeList,
    condition_in: bool,
) -> (bool, Option<&'a CoilSlot>) {
    if list.is_empty() {
        return (false, None);
    }
    let mut acc = condition_in;
    for node in &list.nodes {
        acc = evaluate_node(image, node, acc);
    }
    (acc, list.coil.as_ref())
}

fn evaluate_node(image: &mut ProcessImage, node: &Node, acc: bool) -> bool {
    match node {
        Node::Element(element) => apply(image, element, acc),
        Node::Branch(branch) => {
            let result = evaluate_branch(image, branch);
            acc && result
        }
        Node::Unknown(_) | Node::StrayCoil(_) => acc,
        Node::Malformed(reason) => {
            trace!(reason = reason.as_str(), "malformed node");
            false
        }
    }
}

fn apply(image: &mut ProcessImage, element: &Element, acc: bool) -> bool {
    match element {
        Element::NoContact(var) => {
            let result = elements::no_contact(image, var);
            trace!(var = var.as_str(), result, "NOContact");
            acc && result
        }
        Element::NcContact(var) => {
            let result = elements::nc_contact(image, var);
            trace!(var = var.as_str(), result, "NCContact");
            acc && result
        }
        Element::Compare { op, a, b } => {
            let result = elements::compare(image, *op, a, b);
            trace!(?op, a = a.as_str(), b = b.as_str(), result, "compare");
            acc && result
        }
        Element::Math { op, a, b, c } => {
            elements::math(image, *op, a, b, c, acc);
            acc
        }
        Element::Move { from, to } => {
            elements::move_value(image, from, to);
            acc
        }
        Element::CountUp(var) => {
            elements::count_up(image, var, acc);
            acc
        }
        Element::CountDown(var) => {
            elements::count_down(image, var, acc);
            acc
        }
        Element::OnDelayTimer(var) => {
            let q = elements::timer_on(image, var, acc);
            acc && q
        }
        Element::OffDelayTimer(var) => elements::timer_off(image, var, acc),
        Element::Reset(var) => {
            elements::reset(image, var, acc);
            acc
        }
    }
}

/// Evaluate both sides of a branch from `true` and OR them.
///
/// A side ending in a coil drives it with that side's condition, but only
/// while the condition is true.
pub fn evaluate_branch(image: &mut ProcessImage, branch: &Branch) -> bool {
    let (left, left_coil) = evaluate(image, &branch.left, true);
    let (right, right_coil) = evaluate(image, &branch.right, true);

    for (side, condition, coil) in [("Nodes1", left, left_coil), ("Nodes2", right, right_coil)] {
        if let Some(coil) = coil
            && condition
        {
            let target = match coil {
                CoilSlot::Ready(c) => c.target.as_str(),
                CoilSlot::Malformed(reason) => reason.as_str(),
            };
            if image.first_report(side, target) {
                warn!(coil = target, "unexpected coil in {}", side);
            }
            drive_coil(image, coil, condition);
        }
    }
    left || right
}

/// Drive a list's trailing coil with the list's final condition
pub fn drive_coil(image: &mut ProcessImage, coil: &CoilSlot, condition: bool) {
    let coil = match coil {
        CoilSlot::Ready(coil) => coil,
        CoilSlot::Malformed(reason) => {
            trace!(reason = reason.as_str(), "malformed coil skipped");
            return;
        }
    };
    let target = coil.target.as_str();
    trace!(coil = coil.kind.element_type(), target, condition, "drive");
    match coil.kind {
        CoilKind::Coil => elements::coil(image, target, condition),
        CoilKind::OneShotPositive => elements::one_shot_positive_coil(image, target, condition),
        CoilKind::Set => elements::set_coil(image, target, condition),
        CoilKind::Reset => elements::reset_coil(image, target, condition),
    }
}

/// One scan of a wire: evaluate from `true`, then drive the trailing coil
pub fn scan_wire(image: &mut ProcessImage, wire: &Wire) -> bool {
    let (condition, coil) = evaluate(image, &wire.nodes, true);
    if let Some(coil) = coil {
        drive_coil(image, coil, condition);
    }
    condition
}

#[cfg(test)]
mod tests {
    use super::*;
    use ladder_core::{ManualClock, MemoryIo, VariableStore};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn image(variables: Value) -> ProcessImage {
        let store = VariableStore::load(&variables, Arc::new(MemoryIo::new())).unwrap();
        ProcessImage::new(store, 64, 32, Arc::new(ManualClock::new()))
    }

    fn el(element_type: &str, values: &[&str]) -> Value {
        json!({"Type": "LadderElement", "ElementType": element_type, "ComboBoxValues": values})
    }

    fn list(items: Vec<Value>) -> NodeList {
        NodeList::parse(&items)
    }

    fn booleans(values: &[(&str, bool)]) -> Value {
        Value::Array(
            values
                .iter()
                .map(|(n, v)| json!({"Type": "Boolean", "Name": n, "Value": v}))
                .collect(),
        )
    }

    #[test]
    fn test_empty_list_is_false() {
        let mut img = image(json!([]));
        assert_eq!(evaluate(&mut img, &NodeList::default(), true), (false, None));
    }

    #[test]
    fn test_coil_only_list_passes_condition() {
        let mut img = image(json!([]));
        let l = list(vec![el("Coil", &["X"])]);
        let (cond, coil) = evaluate(&mut img, &l, true);
        assert!(cond);
        assert!(coil.is_some());
        assert!(!evaluate(&mut img, &l, false).0);
    }

    #[test]
    fn test_contacts_conjoin() {
        // NO passes on false, NC passes on true
        let mut img = image(booleans(&[("A", false), ("B", true), ("C", true)]));
        let l = list(vec![el("NOContact", &["A"]), el("NCContact", &["B"])]);
        assert!(evaluate(&mut img, &l, true).0);
        assert!(!evaluate(&mut img, &l, false).0);
        let l = list(vec![el("NOContact", &["A"]), el("NOContact", &["C"])]);
        assert!(!evaluate(&mut img, &l, true).0);
    }

    #[test]
    fn test_all_nodes_run_after_condition_drops() {
        let mut img = image(json!([
            {"Type": "Boolean", "Name": "Block", "Value": true},
            {"Type": "Number", "Name": "Src", "Value": 4},
            {"Type": "Number", "Name": "Dst", "Value": 0}
        ]));
        let l = list(vec![el("NOContact", &["Block"]), el("MoveMath", &["Src", "Dst"])]);
        assert!(!evaluate(&mut img, &l, true).0);
        assert_eq!(img.store.read_number("Dst"), 4.0);
    }

    #[test]
    fn test_off_delay_replaces_condition() {
        let mut img = image(json!([
            {"Type": "Boolean", "Name": "Block", "Value": true},
            {"Type": "Timer", "Name": "T", "PT": 100}
        ]));
        let l = list(vec![el("NOContact", &["Block"]), el("OffDelayTimer", &["T"])]);
        assert!(!evaluate(&mut img, &l, true).0);
        // with the input high first, the off-delay output holds
        let l2 = list(vec![el("OffDelayTimer", &["T"])]);
        assert!(evaluate(&mut img, &l2, true).0);
        assert!(evaluate(&mut img, &l, true).0);
    }

    #[test]
    fn test_unknown_and_stray_coil_pass_through() {
        let mut img = image(json!([]));
        let l = list(vec![el("PidLoop", &["A"]), el("Coil", &["X"]), el("Reset", &["Y"])]);
        assert!(evaluate(&mut img, &l, true).0);
        assert!(!evaluate(&mut img, &l, false).0);
    }

    #[test]
    fn test_malformed_forces_false_and_later_nodes_still_run() {
        let mut img = image(json!([{"Type": "Counter", "Name": "Cnt", "PV": 10}]));
        let l = list(vec![json!({"Type": "LadderElement"}), el("CountUp", &["Cnt"])]);
        assert!(!evaluate(&mut img, &l, true).0);
        // the counter saw a false condition; no count
        assert_eq!(img.store.read_number("Cnt.CV"), 0.0);
    }

    #[test]
    fn test_branch_is_or_of_sides() {
        let mut img = image(booleans(&[("T", true), ("F", false)]));
        // NC passes on true
        let branch = |l: &str, r: &str| {
            json!({"Type": "Branch",
                   "Nodes1": [el("NCContact", &[l])],
                   "Nodes2": [el("NCContact", &[r])]})
        };
        for (l, r, expected) in [
            ("T", "T", true),
            ("T", "F", true),
            ("F", "T", true),
            ("F", "F", false),
        ] {
            let nodes = list(vec![branch(l, r)]);
            assert_eq!(evaluate(&mut img, &nodes, true).0, expected, "{} {}", l, r);
            assert!(!evaluate(&mut img, &nodes, false).0);
        }
    }

    #[test]
    fn test_empty_branch_side_is_false() {
        let mut img = image(booleans(&[("T", true)]));
        let nodes = list(vec![json!({"Type": "Branch", "Nodes1": [], "Nodes2": []})]);
        assert!(!evaluate(&mut img, &nodes, true).0);
        let nodes = list(vec![json!({"Type": "Branch",
                                     "Nodes1": [],
                                     "Nodes2": [el("NCContact", &["T"])]})]);
        assert!(evaluate(&mut img, &nodes, true).0);
    }

    #[test]
    fn test_branch_coil_driven_only_when_true() {
        let mut img = image(booleans(&[("On", true), ("Off", false), ("X", false), ("Y", true)]));
        let nodes = list(vec![json!({"Type": "Branch",
            "Nodes1": [el("NCContact", &["On"]), el("Coil", &["X"])],
            "Nodes2": [el("NCContact", &["Off"]), el("Coil", &["Y"])]})]);
        assert!(evaluate(&mut img, &nodes, true).0);
        assert!(img.store.read_bool("X"));
        // false side leaves its coil untouched
        assert!(img.store.read_bool("Y"));
    }

    #[test]
    fn test_stop_run_rung() {
        let mut img = image(booleans(&[("Stop", false), ("Run", false)]));
        let wire = Wire {
            index: 0,
            nodes: list(vec![el("NOContact", &["Stop"]), el("Coil", &["Run"])]),
        };
        assert!(scan_wire(&mut img, &wire));
        assert!(img.store.read_bool("Run"));
        img.store.write_bool("Stop", true);
        assert!(!scan_wire(&mut img, &wire));
        assert!(!img.store.read_bool("Run"));
    }

    #[test]
    fn test_malformed_coil_is_skipped() {
        let mut img = image(booleans(&[("Run", false)]));
        let wire = Wire {
            index: 0,
            nodes: list(vec![
                el("NOContact", &["Nothing"]),
                json!({"Type": "LadderElement", "ElementType": "Coil", "ComboBoxValues": [1]}),
            ]),
        };
        assert!(scan_wire(&mut img, &wire));
        assert!(!img.store.read_bool("Run"));
    }
}
