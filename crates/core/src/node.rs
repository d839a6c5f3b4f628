//! Hierarchical output nodes.
//!
//! Operators yield `Node`s: a row plus named relationship streams of child
//! nodes. A relationship stream is a one-shot sequence — consuming it
//! moves it — backed either by a deferred upstream pull (`Lazy`) or by an
//! already-materialized vector (`Eager`). `materialize` memoizes a lazy
//! stream in place so a node can be deep-duplicated when a single change
//! fans out to several parents.

use crate::row::Row;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Deferred producer of child nodes.
pub type StreamFn = Box<dyn FnOnce() -> Vec<Node>>;

/// A one-shot stream of child nodes.
pub enum NodeStream {
    /// Deferred: pulls from the upstream operator when consumed.
    Lazy(StreamFn),
    /// Materialized child nodes.
    Eager(Vec<Node>),
}

impl NodeStream {
    /// Creates a deferred stream.
    pub fn lazy(f: impl FnOnce() -> Vec<Node> + 'static) -> Self {
        NodeStream::Lazy(Box::new(f))
    }

    /// Creates a materialized stream.
    pub fn eager(nodes: Vec<Node>) -> Self {
        NodeStream::Eager(nodes)
    }

    /// Creates an empty stream.
    pub fn empty() -> Self {
        NodeStream::Eager(Vec::new())
    }

    /// Consumes the stream, yielding its nodes. Single consumption is
    /// enforced by the move.
    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            NodeStream::Lazy(f) => f(),
            NodeStream::Eager(nodes) => nodes,
        }
    }

    /// Materializes the stream in place and returns its nodes.
    pub fn materialize(&mut self) -> &mut Vec<Node> {
        if let NodeStream::Lazy(_) = self {
            let taken = core::mem::replace(self, NodeStream::Eager(Vec::new()));
            if let NodeStream::Lazy(f) = taken {
                *self = NodeStream::Eager(f());
            }
        }
        match self {
            NodeStream::Eager(nodes) => nodes,
            NodeStream::Lazy(_) => unreachable!(),
        }
    }

    /// Materializes, then returns a structural copy.
    pub fn duplicate(&mut self) -> NodeStream {
        let nodes = self.materialize();
        NodeStream::Eager(nodes.iter_mut().map(Node::duplicate).collect())
    }
}

impl fmt::Debug for NodeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStream::Lazy(_) => f.write_str("NodeStream::Lazy"),
            NodeStream::Eager(nodes) => write!(f, "NodeStream::Eager({})", nodes.len()),
        }
    }
}

/// A row plus its named relationship streams.
#[derive(Debug)]
pub struct Node {
    pub row: Row,
    relationships: Vec<(String, NodeStream)>,
}

impl Node {
    /// Creates a node with no relationships.
    pub fn new(row: Row) -> Self {
        Self {
            row,
            relationships: Vec::new(),
        }
    }

    /// Appends a named relationship stream.
    pub fn with_relationship(mut self, name: impl Into<String>, stream: NodeStream) -> Self {
        self.relationships.push((name.into(), stream));
        self
    }

    /// Returns the relationship names in attachment order.
    pub fn relationship_names(&self) -> impl Iterator<Item = &str> {
        self.relationships.iter().map(|(n, _)| n.as_str())
    }

    /// Detaches and returns the named relationship stream.
    pub fn take_relationship(&mut self, name: &str) -> Option<NodeStream> {
        let pos = self.relationships.iter().position(|(n, _)| n == name)?;
        Some(self.relationships.remove(pos).1)
    }

    /// Consumes the node into its row and relationship streams.
    pub fn into_parts(self) -> (Row, Vec<(String, NodeStream)>) {
        (self.row, self.relationships)
    }

    /// Materializes every relationship stream, recursively.
    pub fn materialize(&mut self) {
        for (_, stream) in &mut self.relationships {
            for child in stream.materialize() {
                child.materialize();
            }
        }
    }

    /// Deep copy. Lazy streams are materialized (and thereby memoized)
    /// first, so the original still yields its complete sequence.
    pub fn duplicate(&mut self) -> Node {
        self.materialize();
        Node {
            row: self.row.clone(),
            relationships: self
                .relationships
                .iter_mut()
                .map(|(name, stream)| (name.clone(), stream.duplicate()))
                .collect(),
        }
    }
}

/// The `#`-prefixed relationship key used in externally visible output.
pub fn external_relationship_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    out.push('#');
    out.push_str(name);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use alloc::string::ToString;
    use alloc::vec;

    fn row(id: &str) -> Row {
        Row::from_pairs(vec![("id", Value::Text(id.into()))])
    }

    #[test]
    fn lazy_stream_pulls_once() {
        let stream = NodeStream::lazy(|| vec![Node::new(row("c1")), Node::new(row("c2"))]);
        let nodes = stream.into_nodes();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].row.get("id"), Some(&Value::Text("c1".into())));
    }

    #[test]
    fn materialize_memoizes() {
        let mut stream = NodeStream::lazy(|| vec![Node::new(row("c1"))]);
        assert_eq!(stream.materialize().len(), 1);
        // Second access hits the memoized vector.
        assert_eq!(stream.materialize().len(), 1);
    }

    #[test]
    fn duplicate_preserves_original() {
        let mut node = Node::new(row("p1"))
            .with_relationship("children", NodeStream::lazy(|| vec![Node::new(row("c1"))]));
        let copy = node.duplicate();

        let originals = node.take_relationship("children").unwrap().into_nodes();
        assert_eq!(originals.len(), 1);

        let (_, rels) = copy.into_parts();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].0, "children");
        assert_eq!(rels.into_iter().next().unwrap().1.into_nodes().len(), 1);
    }

    #[test]
    fn external_names_are_hash_prefixed() {
        assert_eq!(external_relationship_name("comments"), "#comments");
    }

    #[test]
    fn take_relationship_removes_entry() {
        let mut node = Node::new(row("p1")).with_relationship("kids", NodeStream::empty());
        assert!(node.take_relationship("kids").is_some());
        assert!(node.take_relationship("kids").is_none());
        assert_eq!(node.relationship_names().count(), 0);
    }
}
