//! Ladder program model
//!
//! A configuration's `Wires` array is parsed once into typed wires. Each wire
//! is a `NodeList`: ladder elements and branches folded left to right, plus an
//! optional trailing coil that receives the list's final condition.
//!
//! Parsing never rejects an individual node. Nodes that cannot be evaluated are
//! kept in place so the scan can apply their effect on power flow:
//!
//! - `Node::Malformed` forces the condition false (missing `Type`, unknown node
//!   type, missing `ElementType`/`ComboBoxValues`, too few operands, a branch
//!   without both node arrays)
//! - `Node::Unknown` and `Node::StrayCoil` pass the condition through
//!
//! Node JSON:
//!
//! ```json
//! {"Type": "LadderElement", "ElementType": "NOContact", "ComboBoxValues": ["Stop"]}
//! {"Type": "Branch", "Nodes1": [...], "Nodes2": [...]}
//! ```

use crate::elements::{CompareOp, MathOp};
use crate::error::ProgramError;
use serde_json::Value;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoilKind {
    Coil,
    OneShotPositive,
    Set,
    Reset,
}

impl CoilKind {
    pub fn from_element_type(name: &str) -> Option<Self> {
        match name {
            "Coil" => Some(CoilKind::Coil),
            "OneShotPositiveCoil" => Some(CoilKind::OneShotPositive),
            "SetCoil" => Some(CoilKind::Set),
            "ResetCoil" => Some(CoilKind::Reset),
            _ => None,
        }
    }

    pub fn element_type(&self) -> &'static str {
        match self {
            CoilKind::Coil => "Coil",
            CoilKind::OneShotPositive => "OneShotPositiveCoil",
            CoilKind::Set => "SetCoil",
            CoilKind::Reset => "ResetCoil",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Coil {
    pub kind: CoilKind,
    pub target: String,
}

/// A list's trailing coil. A malformed one is still stripped from the
/// condition, then skipped when driven.
#[derive(Debug, Clone, PartialEq)]
pub enum CoilSlot {
    Ready(Coil),
    Malformed(String),
}

/// A condition element with its operands
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    NoContact(String),
    NcContact(String),
    Compare { op: CompareOp, a: String, b: String },
    Math { op: MathOp, a: String, b: String, c: String },
    Move { from: String, to: String },
    CountUp(String),
    CountDown(String),
    OnDelayTimer(String),
    OffDelayTimer(String),
    Reset(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub left: NodeList,
    pub right: NodeList,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Branch(Box<Branch>),
    /// Element type this runtime does not implement
    Unknown(String),
    /// Coil-class element that is not the last node of its list
    StrayCoil(CoilKind),
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeList {
    pub nodes: Vec<Node>,
    pub coil: Option<CoilSlot>,
}

impl NodeList {
    /// No nodes and no coil
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.coil.is_none()
    }

    pub fn parse(items: &[Value]) -> Self {
        let (body, coil) = match items.split_last() {
            Some((last, rest)) => match coil_kind(last) {
                Some(kind) => (rest, Some(parse_coil(last, kind))),
                None => (items, None),
            },
            None => (items, None),
        };
        NodeList {
            nodes: body.iter().map(Node::parse).collect(),
            coil,
        }
    }

    /// Every malformed node or coil in this list and its branches
    pub fn malformed(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_malformed(&mut out);
        out
    }

    fn collect_malformed<'a>(&'a self, out: &mut Vec<&'a str>) {
        for node in &self.nodes {
            match node {
                Node::Malformed(reason) => out.push(reason),
                Node::Branch(branch) => {
                    branch.left.collect_malformed(out);
                    branch.right.collect_malformed(out);
                }
                _ => {}
            }
        }
        if let Some(CoilSlot::Malformed(reason)) = &self.coil {
            out.push(reason);
        }
    }
}

/// Trailing-coil test: a `LadderElement` whose `ElementType` names a coil,
/// regardless of whether its operands are usable
fn coil_kind(node: &Value) -> Option<CoilKind> {
    if node.get("Type").and_then(Value::as_str) != Some("LadderElement") {
        return None;
    }
    node.get("ElementType")
        .and_then(Value::as_str)
        .and_then(CoilKind::from_element_type)
}

fn parse_coil(node: &Value, kind: CoilKind) -> CoilSlot {
    let Some(values) = node.get("ComboBoxValues").and_then(Value::as_array) else {
        return CoilSlot::Malformed(format!("{} missing ComboBoxValues", kind.element_type()));
    };
    match values.first().and_then(Value::as_str) {
        Some(target) => CoilSlot::Ready(Coil {
            kind,
            target: target.to_string(),
        }),
        None => CoilSlot::Malformed(format!("{} missing variable name", kind.element_type())),
    }
}

impl Node {
    pub fn parse(node: &Value) -> Node {
        let Some(fields) = node.as_object() else {
            return Node::Malformed("node is not an object".to_string());
        };
        let Some(node_type) = fields.get("Type").and_then(Value::as_str) else {
            return Node::Malformed("node missing Type or Type is not a string".to_string());
        };
        match node_type {
            "LadderElement" => parse_element(node),
            "Branch" => {
                let left = fields.get("Nodes1").and_then(Value::as_array);
                let right = fields.get("Nodes2").and_then(Value::as_array);
                match (left, right) {
                    (Some(left), Some(right)) => Node::Branch(Box::new(Branch {
                        left: NodeList::parse(left),
                        right: NodeList::parse(right),
                    })),
                    _ => Node::Malformed("Branch missing Nodes1 or Nodes2 arrays".to_string()),
                }
            }
            other => Node::Malformed(format!("unknown node type '{}'", other)),
        }
    }
}

fn parse_element(node: &Value) -> Node {
    let element_type = node.get("ElementType").and_then(Value::as_str);
    let values = node.get("ComboBoxValues").and_then(Value::as_array);
    let (Some(element_type), Some(values)) = (element_type, values) else {
        return Node::Malformed("LadderElement missing ElementType or ComboBoxValues".to_string());
    };

    // Operand N is usable only when present and a string
    let operand = |i: usize| values.get(i).and_then(Value::as_str).map(str::to_string);
    let arity = |n: usize| -> Result<Vec<String>, Node> {
        (0..n)
            .map(&operand)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                Node::Malformed(format!(
                    "{} needs {} variable name{}",
                    element_type,
                    n,
                    if n == 1 { "" } else { "s" }
                ))
            })
    };

    let compare = |op: CompareOp| match arity(2) {
        Ok(mut ops) => {
            let b = ops.pop().unwrap_or_default();
            let a = ops.pop().unwrap_or_default();
            Node::Element(Element::Compare { op, a, b })
        }
        Err(node) => node,
    };
    let math = |op: MathOp| match arity(3) {
        Ok(mut ops) => {
            let c = ops.pop().unwrap_or_default();
            let b = ops.pop().unwrap_or_default();
            let a = ops.pop().unwrap_or_default();
            Node::Element(Element::Math { op, a, b, c })
        }
        Err(node) => node,
    };
    let unary = |make: fn(String) -> Element| match arity(1) {
        Ok(mut ops) => Node::Element(make(ops.pop().unwrap_or_default())),
        Err(node) => node,
    };

    match element_type {
        "NOContact" => unary(Element::NoContact),
        "NCContact" => unary(Element::NcContact),
        "GreaterCompare" => compare(CompareOp::Greater),
        "LessCompare" => compare(CompareOp::Less),
        "GreaterOrEqualCompare" => compare(CompareOp::GreaterOrEqual),
        "LessOrEqualCompare" => compare(CompareOp::LessOrEqual),
        "EqualCompare" => compare(CompareOp::Equal),
        "NotEqualCompare" => compare(CompareOp::NotEqual),
        "AddMath" => math(MathOp::Add),
        "SubtractMath" => math(MathOp::Subtract),
        "MultiplyMath" => math(MathOp::Multiply),
        "DivideMath" => math(MathOp::Divide),
        "MoveMath" => match arity(2) {
            Ok(mut ops) => {
                let to = ops.pop().unwrap_or_default();
                let from = ops.pop().unwrap_or_default();
                Node::Element(Element::Move { from, to })
            }
            Err(node) => node,
        },
        "CountUp" => unary(Element::CountUp),
        "CountDown" => unary(Element::CountDown),
        "OnDelayTimer" => unary(Element::OnDelayTimer),
        "OffDelayTimer" => unary(Element::OffDelayTimer),
        "Reset" => unary(Element::Reset),
        other => match CoilKind::from_element_type(other) {
            Some(kind) => Node::StrayCoil(kind),
            None => Node::Unknown(other.to_string()),
        },
    }
}

/// One independently scanned rung
#[derive(Debug, Clone, PartialEq)]
pub struct Wire {
    /// Position in the configuration's `Wires` array
    pub index: usize,
    pub nodes: NodeList,
}

impl Wire {
    pub fn name(&self) -> String {
        format!("wire-{}", self.index)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub wires: Vec<Wire>,
    /// `Wires` entries that were not objects with a `Nodes` array
    pub skipped: usize,
}

impl Program {
    /// Parse a `Wires` array.
    ///
    /// Entries without a `Nodes` array are skipped; the rest become wires.
    /// Malformed and unknown nodes are reported here, once per configuration.
    pub fn from_json(wires: &Value) -> Result<Self, ProgramError> {
        let entries = wires.as_array().ok_or(ProgramError::NotAnArray)?;
        let mut program = Program::default();
        for (index, entry) in entries.iter().enumerate() {
            let Some(nodes) = entry.get("Nodes").and_then(Value::as_array) else {
                error!(wire = index, "invalid or missing Nodes array in wire, skipped");
                program.skipped += 1;
                continue;
            };
            let wire = Wire {
                index,
                nodes: NodeList::parse(nodes),
            };
            report(&wire);
            program.wires.push(wire);
        }
        Ok(program)
    }
}

fn report(wire: &Wire) {
    for reason in wire.nodes.malformed() {
        error!(wire = wire.index, "{}; the wire's condition will be false", reason);
    }
    visit(&wire.nodes, &mut |node| match node {
        Node::Unknown(name) => warn!(wire = wire.index, "unknown element type '{}' ignored", name),
        Node::StrayCoil(kind) => warn!(
            wire = wire.index,
            "{} is not the last node of its list and is ignored",
            kind.element_type()
        ),
        _ => {}
    });
}

fn visit(list: &NodeList, f: &mut dyn FnMut(&Node)) {
    for node in &list.nodes {
        f(node);
        if let Node::Branch(branch) = node {
            visit(&branch.left, f);
            visit(&branch.right, f);
        }
    }
}
