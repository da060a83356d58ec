//! Runtime values of the script machine.

use std::{fmt, ops::Deref, rc::Rc};

use diagrammer_core::{
    capability::Capability,
    diagram::{ClusterId, EdgeStyle, NodeId},
};

/// A node living in one of the diagrams a script created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NodeRef {
    pub diagram: usize,
    pub node: NodeId,
}

/// Items of a list or dict, shared between copies of the value.
///
/// `depth` counts how many containers are stacked here, so building a
/// container only has to look at its direct children.
#[derive(Debug)]
pub(crate) struct Seq<T> {
    items: Rc<[T]>,
    depth: usize,
}

impl<T> Seq<T> {
    pub fn shared(&self) -> Rc<[T]> {
        Rc::clone(&self.items)
    }
}

impl<T> Clone for Seq<T> {
    fn clone(&self) -> Self {
        Self {
            items: Rc::clone(&self.items),
            depth: self.depth,
        }
    }
}

impl<T> Deref for Seq<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

/// A value on the operand stack or in a local slot.
///
/// Diagram elements are handles into the machine's diagram arena, so
/// copying a value never copies the diagram.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    None,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    List(Seq<Value>),
    Dict(Seq<(Rc<str>, Value)>),
    Callable(Capability),
    Diagram(usize),
    Cluster {
        diagram: usize,
        cluster: ClusterId,
    },
    Node(NodeRef),
    /// Result of `Edge(...)`, not yet attached to any node.
    EdgeTemplate(Rc<EdgeStyle>),
    /// Left half of `a >> Edge(...) >> b`.
    PendingEdge {
        sources: Rc<[NodeRef]>,
        style: Rc<EdgeStyle>,
    },
    /// Iteration state of a `for` loop.
    Iter { items: Rc<[Value]>, next: usize },
}

impl Value {
    pub fn str(text: impl Into<Rc<str>>) -> Self {
        Value::Str(text.into())
    }

    pub fn list(items: impl Into<Rc<[Value]>>) -> Self {
        let items = items.into();
        let depth = 1 + items.iter().map(Value::nesting).max().unwrap_or(0);
        Value::List(Seq { items, depth })
    }

    pub fn dict(entries: impl Into<Rc<[(Rc<str>, Value)]>>) -> Self {
        let items = entries.into();
        let depth = 1 + items
            .iter()
            .map(|(_, value)| value.nesting())
            .max()
            .unwrap_or(0);
        Value::Dict(Seq { items, depth })
    }

    /// Number of lists and dicts stacked inside one another; 0 for scalars.
    pub fn nesting(&self) -> usize {
        match self {
            Value::List(items) => items.depth,
            Value::Dict(entries) => entries.depth,
            _ => 0,
        }
    }

    /// Name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
            Value::Callable(_) => "constructor",
            Value::Diagram(_) => "Diagram",
            Value::Cluster { .. } => "Cluster",
            Value::Node(_) => "node",
            Value::EdgeTemplate(_) => "Edge",
            Value::PendingEdge { .. } => "edge",
            Value::Iter { .. } => "iterator",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Dict(entries) => !entries.is_empty(),
            _ => true,
        }
    }

    /// Equality as seen by `==`; diagram elements compare by identity.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Callable(a), Value::Callable(b)) => a == b,
            (Value::Diagram(a), Value::Diagram(b)) => a == b,
            (
                Value::Cluster {
                    diagram: da,
                    cluster: ca,
                },
                Value::Cluster {
                    diagram: db,
                    cluster: cb,
                },
            ) => da == db && ca == cb,
            (Value::Node(a), Value::Node(b)) => a == b,
            _ => false,
        }
    }
}

/// Formats a number the way scripts expect: integers without a fraction.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "'{s}'")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "]")
            }
            other => write!(f, "<{}>", other.type_name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Value::None.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::Diagram(0).is_truthy());
        assert!(!Value::list(Vec::<Value>::new()).is_truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Bool(true).to_string(), "True");
        let list = Value::list(vec![Value::Number(1.0), Value::str("a")]);
        assert_eq!(list.to_string(), "[1, 'a']");
    }

    #[test]
    fn test_equality_by_identity_for_elements() {
        assert!(Value::Diagram(1).equals(&Value::Diagram(1)));
        assert!(!Value::Diagram(1).equals(&Value::Diagram(2)));
        assert!(!Value::Number(1.0).equals(&Value::str("1")));
    }

    #[test]
    fn test_nesting_counts_containers() {
        assert_eq!(Value::Number(1.0).nesting(), 0);
        let inner = Value::list(vec![Value::Number(1.0)]);
        assert_eq!(inner.nesting(), 1);
        let outer = Value::list(vec![Value::None, inner.clone()]);
        assert_eq!(outer.nesting(), 2);
        let dict = Value::dict(vec![(Rc::<str>::from("k"), outer)]);
        assert_eq!(dict.nesting(), 3);
        assert_eq!(Value::dict(Vec::<(Rc<str>, Value)>::new()).nesting(), 1);
    }
}
