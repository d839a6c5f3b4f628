//! Differential change events.
//!
//! Operators communicate in `Change`s: a node entering the result, a node
//! leaving it, or a nested change inside the relationship of an existing
//! parent row. Child changes are recursive so arbitrarily deep join trees
//! can describe an edit at any level.

use crate::node::Node;
use crate::row::Row;
use alloc::boxed::Box;
use alloc::string::String;

/// A change nested under a parent row's relationship.
#[derive(Debug)]
pub struct ChildChange {
    pub relationship_name: String,
    pub change: Box<Change>,
}

/// One differential event.
#[derive(Debug)]
pub enum Change {
    /// A node becomes part of the result.
    Add { node: Node },
    /// A node leaves the result.
    Remove { node: Node },
    /// A change inside a relationship of the parent identified by `row`.
    Child { row: Row, child: ChildChange },
}

impl Change {
    /// Creates an add change.
    pub fn add(node: Node) -> Self {
        Change::Add { node }
    }

    /// Creates a remove change.
    pub fn remove(node: Node) -> Self {
        Change::Remove { node }
    }

    /// Creates a child change rooted at `parent_row`.
    pub fn child(parent_row: Row, relationship_name: impl Into<String>, change: Change) -> Self {
        Change::Child {
            row: parent_row,
            child: ChildChange {
                relationship_name: relationship_name.into(),
                change: Box::new(change),
            },
        }
    }

    /// The row this change applies to at the current level: the node row
    /// for add/remove, the parent row for child changes.
    pub fn row(&self) -> &Row {
        match self {
            Change::Add { node } | Change::Remove { node } => &node.row,
            Change::Child { row, .. } => row,
        }
    }

    /// Returns true for add changes.
    pub fn is_add(&self) -> bool {
        matches!(self, Change::Add { .. })
    }

    /// Returns true for remove changes.
    pub fn is_remove(&self) -> bool {
        matches!(self, Change::Remove { .. })
    }

    /// Materializes every stream reachable from this change.
    ///
    /// Consumers that discard a change (rather than walking its nodes)
    /// call this first so deferred child pulls — cleanup pulls in
    /// particular — still run.
    pub fn materialize(&mut self) {
        match self {
            Change::Add { node } | Change::Remove { node } => node.materialize(),
            Change::Child { child, .. } => child.change.materialize(),
        }
    }

    /// Materializes every stream reachable from this change, then returns
    /// a deep copy. Used when one change must be delivered to several
    /// parents.
    pub fn duplicate(&mut self) -> Change {
        match self {
            Change::Add { node } => Change::Add {
                node: node.duplicate(),
            },
            Change::Remove { node } => Change::Remove {
                node: node.duplicate(),
            },
            Change::Child { row, child } => Change::Child {
                row: row.clone(),
                child: ChildChange {
                    relationship_name: child.relationship_name.clone(),
                    change: Box::new(child.change.duplicate()),
                },
            },
        }
    }
}
