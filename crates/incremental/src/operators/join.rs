//! Join operator: hierarchical parent/child composition.
//!
//! A join keeps its parent input inline and shares its child input behind
//! a reference-counted cell, so emitted parent nodes can carry lazy child
//! streams that pull from the child on demand.
//!
//! Bookkeeping lives in operator storage under
//! `pKeySet,<joinValue>,<parentPk…>,`. Entries are keyed on the join
//! value rather than the individual parent because several parents may
//! share one value; the child subtree for a value may only be torn down
//! when the last such parent releases it.

use crate::fetch::{Constraint, FetchMode, FetchRequest};
use crate::operators::{OperatorNode, OperatorRef};
use crate::source::SourceChange;
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use rill_core::key::{storage_key, storage_prefix};
use rill_core::{Change, Error, Node, NodeStream, Result, TableSchema};
use rill_storage::{OperatorStorage, StoredValue};

#[derive(Debug)]
pub struct Join {
    parent: Box<OperatorNode>,
    child: OperatorRef,
    parent_key: String,
    child_key: String,
    relationship_name: String,
    schema: TableSchema,
    storage: OperatorStorage,
}

impl Join {
    /// Creates a join producing `relationship_name` under each parent.
    ///
    /// The child operator must not appear anywhere in the parent subtree;
    /// a graph that feeds one operator into both sides of a join would
    /// re-enter itself during propagation.
    pub fn new(
        parent: OperatorNode,
        child: OperatorRef,
        parent_key: impl Into<String>,
        child_key: impl Into<String>,
        relationship_name: impl Into<String>,
    ) -> Result<Self> {
        let relationship_name = relationship_name.into();
        if parent.contains(&child) {
            return Err(Error::SelfJoin {
                relationship: relationship_name,
            });
        }
        let schema = {
            let child_ref = child.borrow();
            parent
                .schema()
                .with_relationship(relationship_name.clone(), child_ref.schema().clone())
        };
        Ok(Self {
            parent: Box::new(parent),
            child,
            parent_key: parent_key.into(),
            child_key: child_key.into(),
            relationship_name,
            schema,
            storage: OperatorStorage::new(),
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Storage key for one parent's membership under its join value.
    fn pk_set_key(&self, node: &Node) -> String {
        let join_value = node.row.get_or_null(&self.parent_key);
        let pk_values: Vec<_> = self
            .parent
            .schema()
            .primary_key()
            .iter()
            .map(|col| node.row.get_or_null(col))
            .collect();
        let mut parts: Vec<&rill_core::Value> = Vec::with_capacity(pk_values.len() + 1);
        parts.push(&join_value);
        parts.extend(pk_values.iter());
        storage_key("pKeySet", &parts)
    }

    /// Attaches the child stream to a parent node, recording (for fetch)
    /// or releasing (for cleanup) the pKeySet entry.
    fn attach(&mut self, node: Node, mode: FetchMode) -> Node {
        let join_value = node.row.get_or_null(&self.parent_key);
        let entry_key = self.pk_set_key(&node);

        let child_mode = match mode {
            FetchMode::Fetch => {
                self.storage.set(entry_key, StoredValue::Present);
                FetchMode::Fetch
            }
            FetchMode::Cleanup => {
                self.storage.del(&entry_key);
                let prefix = storage_prefix("pKeySet", &[&join_value]);
                // A sibling parent with the same join value still holds
                // the constraint; the child subtree must survive it.
                if self.storage.scan_count(&prefix, 1) > 0 {
                    FetchMode::Fetch
                } else {
                    FetchMode::Cleanup
                }
            }
        };

        let request = FetchRequest {
            constraint: Some(Constraint::new(self.child_key.clone(), join_value)),
        };
        let child = Rc::clone(&self.child);
        node.with_relationship(
            self.relationship_name.clone(),
            NodeStream::lazy(move || child.borrow_mut().pull(child_mode, &request)),
        )
    }

    pub fn pull(&mut self, mode: FetchMode, request: &FetchRequest) -> Vec<Node> {
        let parents = self.parent.pull(mode, request);
        parents
            .into_iter()
            .map(|node| self.attach(node, mode))
            .collect()
    }

    pub fn push_source(&mut self, table: &str, change: &SourceChange) -> Result<Vec<Change>> {
        let mut out = Vec::new();

        // Parent side: adds and removes grow or shrink the hierarchy
        // exactly like fetch and cleanup; child changes pass through.
        for parent_change in self.parent.push_source(table, change)? {
            match parent_change {
                Change::Add { node } => out.push(Change::Add {
                    node: self.attach(node, FetchMode::Fetch),
                }),
                Change::Remove { node } => out.push(Change::Remove {
                    node: self.attach(node, FetchMode::Cleanup),
                }),
                passthrough @ Change::Child { .. } => out.push(passthrough),
            }
        }

        // Child side: wrap each change as a child change rooted at every
        // parent whose key matches the child row's join value. Parent
        // order is whatever the parent input yields.
        let child_changes = self.child.borrow_mut().push_source(table, change)?;
        for mut child_change in child_changes {
            let join_value = child_change.row().get_or_null(&self.child_key);
            let request = FetchRequest {
                constraint: Some(Constraint::new(self.parent_key.clone(), join_value)),
            };
            let mut parents = self.parent.pull(FetchMode::Fetch, &request);
            let last = parents.pop();
            for parent in parents {
                out.push(Change::child(
                    parent.row,
                    self.relationship_name.clone(),
                    child_change.duplicate(),
                ));
            }
            if let Some(parent) = last {
                out.push(Change::child(
                    parent.row,
                    self.relationship_name.clone(),
                    child_change,
                ));
            }
        }

        Ok(out)
    }

    pub fn destroy(&mut self) {
        self.storage.clear();
        self.parent.destroy();
        self.child.borrow_mut().destroy();
    }

    pub fn contains(&self, target: &OperatorRef) -> bool {
        Rc::ptr_eq(&self.child, target)
            || self.parent.contains(target)
            || self.child.borrow().contains(target)
    }

    pub fn storage_is_empty(&self) -> bool {
        self.storage.is_empty()
            && self.parent.storage_is_empty()
            && self.child.borrow().storage_is_empty()
    }
}
