use std::collections::HashMap;

use mml_core::MmlError;

use super::syntax::{Axis, CompareOp, Expr, NodeTest, Step};
use crate::tree::{NodeId, NodeKind, XmlDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum XNode {
    Node(NodeId),
    Attribute(NodeId, usize),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Nodes(Vec<XNode>),
    String(String),
    Number(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, Copy)]
struct Focus {
    node: XNode,
    position: usize,
    size: usize,
}

fn not_nodeset(what: &str) -> MmlError {
    MmlError::new(
        "XPATH_NOT_NODESET",
        format!("{} must evaluate to a node-set", what),
    )
}

pub(crate) fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        let sign = if value > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = !digits.is_empty()
        && digits.chars().all(|ch| ch.is_ascii_digit() || ch == '.')
        && digits.chars().filter(|ch| *ch == '.').count() <= 1
        && digits != ".";
    if well_formed {
        trimmed.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

pub(crate) struct Evaluator<'d> {
    document: &'d XmlDocument,
    order: HashMap<NodeId, usize>,
}

impl<'d> Evaluator<'d> {
    pub(crate) fn new(document: &'d XmlDocument, context: NodeId) -> Self {
        let mut top = context;
        while let Some(parent) = document.parent(top) {
            top = parent;
        }
        let order = document
            .descendants(top)
            .into_iter()
            .enumerate()
            .map(|(index, id)| (id, index))
            .collect();
        Self { document, order }
    }

    pub(crate) fn evaluate(&self, expr: &Expr, context: NodeId) -> Result<Value, MmlError> {
        let focus = Focus {
            node: XNode::Node(context),
            position: 1,
            size: 1,
        };
        self.eval(expr, focus)
    }

    fn order_key(&self, node: XNode) -> (usize, usize, usize) {
        let (id, slot) = match node {
            XNode::Node(id) => (id, 0),
            XNode::Attribute(id, index) => (id, index + 1),
        };
        match self.order.get(&id) {
            Some(position) => (0, *position, slot),
            None => (1, id.index(), slot),
        }
    }

    fn sort_unique(&self, mut nodes: Vec<XNode>) -> Vec<XNode> {
        nodes.sort_by_key(|node| self.order_key(*node));
        nodes.dedup();
        nodes
    }

    pub(crate) fn node_string(&self, node: XNode) -> String {
        match node {
            XNode::Node(id) => self.document.string_value(id),
            XNode::Attribute(id, index) => self
                .document
                .element(id)
                .and_then(|element| element.attributes.get_index(index))
                .map(|(_, value)| value.clone())
                .unwrap_or_default(),
        }
    }

    fn node_name(&self, node: XNode) -> String {
        match node {
            XNode::Node(id) => self.document.name(id).unwrap_or_default().to_string(),
            XNode::Attribute(id, index) => self
                .document
                .element(id)
                .and_then(|element| element.attributes.get_index(index))
                .map(|(name, _)| name.clone())
                .unwrap_or_default(),
        }
    }

    pub(crate) fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|node| self.node_string(*node))
                .unwrap_or_default(),
            Value::String(text) => text.clone(),
            Value::Number(number) => format_number(*number),
            Value::Boolean(flag) => flag.to_string(),
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Number(number) => *number,
            Value::Boolean(flag) => {
                if *flag {
                    1.0
                } else {
                    0.0
                }
            }
            other => parse_number(&self.to_string(other)),
        }
    }

    fn to_boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::String(text) => !text.is_empty(),
            Value::Number(number) => *number != 0.0 && !number.is_nan(),
            Value::Boolean(flag) => *flag,
        }
    }

    fn eval(&self, expr: &Expr, focus: Focus) -> Result<Value, MmlError> {
        match expr {
            Expr::Or(left, right) => Ok(Value::Boolean(
                self.to_boolean(&self.eval(left, focus)?) || self.to_boolean(&self.eval(right, focus)?),
            )),
            Expr::And(left, right) => Ok(Value::Boolean(
                self.to_boolean(&self.eval(left, focus)?) && self.to_boolean(&self.eval(right, focus)?),
            )),
            Expr::Compare(op, left, right) => {
                let left = self.eval(left, focus)?;
                let right = self.eval(right, focus)?;
                Ok(Value::Boolean(self.compare(*op, &left, &right)))
            }
            Expr::Add(left, right) => Ok(Value::Number(
                self.to_number(&self.eval(left, focus)?) + self.to_number(&self.eval(right, focus)?),
            )),
            Expr::Subtract(left, right) => Ok(Value::Number(
                self.to_number(&self.eval(left, focus)?) - self.to_number(&self.eval(right, focus)?),
            )),
            Expr::Negate(inner) => Ok(Value::Number(-self.to_number(&self.eval(inner, focus)?))),
            Expr::Union(left, right) => {
                let Value::Nodes(mut nodes) = self.eval(left, focus)? else {
                    return Err(not_nodeset("Union operand"));
                };
                let Value::Nodes(more) = self.eval(right, focus)? else {
                    return Err(not_nodeset("Union operand"));
                };
                nodes.extend(more);
                Ok(Value::Nodes(self.sort_unique(nodes)))
            }
            Expr::Path { absolute, steps } => {
                let start = if *absolute {
                    XNode::Node(self.tree_root(focus.node))
                } else {
                    focus.node
                };
                self.apply_steps(vec![start], steps).map(Value::Nodes)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let value = self.eval(primary, focus)?;
                if predicates.is_empty() && steps.is_empty() {
                    return Ok(value);
                }
                let Value::Nodes(nodes) = value else {
                    return Err(not_nodeset("Filtered expression"));
                };
                let nodes = self.filter(self.sort_unique(nodes), predicates)?;
                self.apply_steps(nodes, steps).map(Value::Nodes)
            }
            Expr::Literal(text) => Ok(Value::String(text.clone())),
            Expr::Number(number) => Ok(Value::Number(*number)),
            Expr::Function(name, args) => self.call(name, args, focus),
        }
    }

    fn tree_root(&self, node: XNode) -> NodeId {
        let mut top = match node {
            XNode::Node(id) | XNode::Attribute(id, _) => id,
        };
        while let Some(parent) = self.document.parent(top) {
            top = parent;
        }
        top
    }

    fn apply_steps(&self, mut nodes: Vec<XNode>, steps: &[Step]) -> Result<Vec<XNode>, MmlError> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let candidates: Vec<XNode> = self
                    .axis(step.axis, *node)
                    .into_iter()
                    .filter(|candidate| self.matches(step.axis, &step.test, *candidate))
                    .collect();
                next.extend(self.filter(candidates, &step.predicates)?);
            }
            nodes = self.sort_unique(next);
        }
        Ok(nodes)
    }

    // Candidates arrive in axis order, which is what `position()` counts.
    fn filter(&self, mut nodes: Vec<XNode>, predicates: &[Expr]) -> Result<Vec<XNode>, MmlError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::new();
            for (index, node) in nodes.into_iter().enumerate() {
                let focus = Focus {
                    node,
                    position: index + 1,
                    size,
                };
                let keep = match self.eval(predicate, focus)? {
                    Value::Number(number) => number == focus.position as f64,
                    other => self.to_boolean(&other),
                };
                if keep {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    fn axis(&self, axis: Axis, node: XNode) -> Vec<XNode> {
        let document = self.document;
        let id = match node {
            XNode::Node(id) => id,
            XNode::Attribute(owner, _) => {
                return match axis {
                    Axis::SelfAxis => vec![node],
                    Axis::Parent => vec![XNode::Node(owner)],
                    Axis::Ancestor => self.ancestors(owner, true),
                    Axis::AncestorOrSelf => {
                        let mut all = vec![node];
                        all.extend(self.ancestors(owner, true));
                        all
                    }
                    _ => Vec::new(),
                };
            }
        };

        match axis {
            Axis::Child => document.children(id).iter().copied().map(XNode::Node).collect(),
            Axis::Descendant => document
                .descendants(id)
                .into_iter()
                .skip(1)
                .map(XNode::Node)
                .collect(),
            Axis::DescendantOrSelf => document.descendants(id).into_iter().map(XNode::Node).collect(),
            Axis::Parent => document.parent(id).map(XNode::Node).into_iter().collect(),
            Axis::Ancestor => self.ancestors(id, false),
            Axis::AncestorOrSelf => self.ancestors(id, true),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let Some(parent) = document.parent(id) else {
                    return Vec::new();
                };
                let siblings = document.children(parent);
                let Some(index) = siblings.iter().position(|sibling| *sibling == id) else {
                    return Vec::new();
                };
                if axis == Axis::FollowingSibling {
                    siblings[index + 1..].iter().copied().map(XNode::Node).collect()
                } else {
                    siblings[..index].iter().rev().copied().map(XNode::Node).collect()
                }
            }
            Axis::SelfAxis => vec![node],
            Axis::Attribute => match document.element(id) {
                Some(element) => (0..element.attributes.len())
                    .map(|index| XNode::Attribute(id, index))
                    .collect(),
                None => Vec::new(),
            },
        }
    }

    fn ancestors(&self, id: NodeId, include_self: bool) -> Vec<XNode> {
        let mut chain = Vec::new();
        if include_self {
            chain.push(XNode::Node(id));
        }
        let mut current = id;
        while let Some(parent) = self.document.parent(current) {
            chain.push(XNode::Node(parent));
            current = parent;
        }
        chain
    }

    fn matches(&self, axis: Axis, test: &NodeTest, node: XNode) -> bool {
        match node {
            XNode::Attribute(_, _) => match test {
                NodeTest::Any | NodeTest::Node => true,
                NodeTest::Name(name) => self.node_name(node) == *name,
                NodeTest::Text | NodeTest::Comment => false,
            },
            XNode::Node(id) => {
                let kind = self.document.kind(id);
                match test {
                    NodeTest::Node => true,
                    NodeTest::Text => matches!(kind, NodeKind::Text(_)),
                    NodeTest::Comment => matches!(kind, NodeKind::Comment(_)),
                    _ if axis == Axis::Attribute => false,
                    NodeTest::Any => matches!(kind, NodeKind::Element(_)),
                    NodeTest::Name(name) => self.document.name(id) == Some(name.as_str()),
                }
            }
        }
    }

    fn compare(&self, op: CompareOp, left: &Value, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(left), Value::Nodes(right)) => left.iter().any(|a| {
                let a = Value::String(self.node_string(*a));
                right
                    .iter()
                    .any(|b| self.compare_atoms(op, &a, &Value::String(self.node_string(*b))))
            }),
            (Value::Nodes(nodes), Value::Boolean(_)) => {
                self.compare_atoms(op, &Value::Boolean(!nodes.is_empty()), right)
            }
            (Value::Boolean(_), Value::Nodes(nodes)) => {
                self.compare_atoms(op, left, &Value::Boolean(!nodes.is_empty()))
            }
            (Value::Nodes(nodes), other) => nodes
                .iter()
                .any(|node| self.compare_atoms(op, &Value::String(self.node_string(*node)), other)),
            (other, Value::Nodes(nodes)) => nodes
                .iter()
                .any(|node| self.compare_atoms(op, other, &Value::String(self.node_string(*node)))),
            _ => self.compare_atoms(op, left, right),
        }
    }

    fn compare_atoms(&self, op: CompareOp, left: &Value, right: &Value) -> bool {
        match op {
            CompareOp::Eq | CompareOp::NotEq => {
                let equal = if matches!(left, Value::Boolean(_)) || matches!(right, Value::Boolean(_)) {
                    self.to_boolean(left) == self.to_boolean(right)
                } else if matches!(left, Value::Number(_)) || matches!(right, Value::Number(_)) {
                    self.to_number(left) == self.to_number(right)
                } else {
                    self.to_string(left) == self.to_string(right)
                };
                if op == CompareOp::Eq {
                    equal
                } else {
                    !equal
                }
            }
            CompareOp::Lt => self.to_number(left) < self.to_number(right),
            CompareOp::LtEq => self.to_number(left) <= self.to_number(right),
            CompareOp::Gt => self.to_number(left) > self.to_number(right),
            CompareOp::GtEq => self.to_number(left) >= self.to_number(right),
        }
    }

    fn call(&self, name: &str, args: &[Expr], focus: Focus) -> Result<Value, MmlError> {
        let arity_error = |expected: &str| {
            MmlError::new(
                "XPATH_SYNTAX",
                format!("Function {}() expects {} argument(s)", name, expected),
            )
        };
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, focus)?);
        }
        let context_value = || Value::Nodes(vec![focus.node]);
        let first_or_context = |values: &[Value]| values.first().cloned().unwrap_or_else(context_value);

        let value = match (name, values.len()) {
            ("last", 0) => Value::Number(focus.size as f64),
            ("position", 0) => Value::Number(focus.position as f64),
            ("true", 0) => Value::Boolean(true),
            ("false", 0) => Value::Boolean(false),
            ("count", 1) => match &values[0] {
                Value::Nodes(nodes) => Value::Number(nodes.len() as f64),
                _ => return Err(not_nodeset("Argument of count()")),
            },
            ("string", 0 | 1) => Value::String(self.to_string(&first_or_context(&values))),
            ("number", 0 | 1) => Value::Number(self.to_number(&first_or_context(&values))),
            ("string-length", 0 | 1) => {
                Value::Number(self.to_string(&first_or_context(&values)).chars().count() as f64)
            }
            ("normalize-space", 0 | 1) => Value::String(
                self.to_string(&first_or_context(&values))
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            ("boolean", 1) => Value::Boolean(self.to_boolean(&values[0])),
            ("not", 1) => Value::Boolean(!self.to_boolean(&values[0])),
            ("contains", 2) => {
                Value::Boolean(self.to_string(&values[0]).contains(&self.to_string(&values[1])))
            }
            ("starts-with", 2) => {
                Value::Boolean(self.to_string(&values[0]).starts_with(&self.to_string(&values[1])))
            }
            ("concat", count) if count >= 2 => {
                Value::String(values.iter().map(|value| self.to_string(value)).collect())
            }
            ("name" | "local-name", 0 | 1) => match first_or_context(&values) {
                Value::Nodes(nodes) => {
                    let full = nodes
                        .first()
                        .map(|node| self.node_name(*node))
                        .unwrap_or_default();
                    if name == "local-name" {
                        Value::String(full.rsplit(':').next().unwrap_or_default().to_string())
                    } else {
                        Value::String(full)
                    }
                }
                _ => return Err(not_nodeset("Argument of name()")),
            },
            ("last" | "position" | "true" | "false", _) => return Err(arity_error("0")),
            ("count" | "boolean" | "not", _) => return Err(arity_error("1")),
            ("string" | "number" | "string-length" | "normalize-space" | "name" | "local-name", _) => {
                return Err(arity_error("0 or 1"))
            }
            ("contains" | "starts-with", _) => return Err(arity_error("2")),
            ("concat", _) => return Err(arity_error("at least 2")),
            _ => {
                return Err(MmlError::new(
                    "XPATH_SYNTAX",
                    format!("Unknown XPath function {}()", name),
                ))
            }
        };

        Ok(value)
    }
}
