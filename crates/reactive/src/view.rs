//! Materialized query views.
//!
//! A `QueryView` is the single consumer of a pipeline: it materializes
//! the hierarchical result, keeps it current as changes arrive, and
//! applies the parts of the query the streaming core leaves to the view —
//! `select` projection and the root `limit`. Relationship entries are
//! exposed under their externally visible `#`-prefixed names.

use crate::subscription::{SubscriptionId, SubscriptionManager};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use rill_core::{external_relationship_name, Change, Node, Row, TableSchema, Value};
use rill_incremental::Output;

/// One materialized node: a row plus `#named` child lists.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewNode {
    pub row: Row,
    pub children: Vec<(String, Vec<ViewNode>)>,
}

impl ViewNode {
    /// The child list for an external relationship name, if present.
    pub fn children_named(&self, external_name: &str) -> Option<&[ViewNode]> {
        self.children
            .iter()
            .find(|(name, _)| name == external_name)
            .map(|(_, nodes)| nodes.as_slice())
    }
}

/// Shared handle to a view.
pub type ViewHandle = Rc<RefCell<QueryView>>;

/// A continuously maintained materialization of one query.
pub struct QueryView {
    schema: TableSchema,
    select: Vec<(String, String)>,
    limit: Option<usize>,
    entries: Vec<ViewNode>,
    subscriptions: SubscriptionManager,
}

impl QueryView {
    /// Creates an empty view for a pipeline's output schema.
    pub fn new(schema: TableSchema, select: Vec<(String, String)>, limit: Option<usize>) -> Self {
        Self {
            schema,
            select,
            limit,
            entries: Vec::new(),
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Creates a shared view handle.
    pub fn shared(
        schema: TableSchema,
        select: Vec<(String, String)>,
        limit: Option<usize>,
    ) -> ViewHandle {
        Rc::new(RefCell::new(Self::new(schema, select, limit)))
    }

    /// Wraps a shared view as a pipeline output.
    pub fn output(view: &ViewHandle) -> Box<dyn Output> {
        Box::new(ViewOutput(Rc::clone(view)))
    }

    /// Seeds the view from the initial fetch.
    pub fn init(&mut self, nodes: Vec<Node>) {
        self.entries.clear();
        for node in nodes {
            let converted = convert(node, &self.schema);
            insert_sorted(&mut self.entries, &self.schema, converted);
        }
    }

    /// Applies one change and notifies subscribers.
    pub fn apply(&mut self, change: Change) {
        apply_change(&self.schema, &mut self.entries, change);
        let rows = self.rows();
        self.subscriptions.notify_all(&rows);
    }

    /// Current root rows with projection and limit applied.
    pub fn rows(&self) -> Vec<Row> {
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if let Some(limit) = self.limit {
                if out.len() >= limit {
                    break;
                }
            }
            out.push(self.project(&entry.row));
        }
        out
    }

    /// Current hierarchical result.
    pub fn tree(&self) -> &[ViewNode] {
        &self.entries
    }

    /// Number of root entries before the limit is applied.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the view holds no rows.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Subscribes to row updates.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Row]) + 'static,
    {
        self.subscriptions.subscribe(callback)
    }

    /// Drops a subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    fn project(&self, row: &Row) -> Row {
        if self.select.is_empty() {
            return row.clone();
        }
        let mut out = Row::new();
        for (selector, alias) in &self.select {
            out.set(alias.clone(), row.get_or_null(selector));
        }
        out
    }
}

struct ViewOutput(ViewHandle);

impl Output for ViewOutput {
    fn push(&mut self, change: Change) {
        self.0.borrow_mut().apply(change);
    }
}

fn pk_of(schema: &TableSchema, row: &Row) -> Vec<Value> {
    schema
        .primary_key()
        .iter()
        .map(|col| row.get_or_null(col))
        .collect()
}

fn convert(node: Node, schema: &TableSchema) -> ViewNode {
    let (row, relationships) = node.into_parts();
    let mut children = Vec::with_capacity(relationships.len());
    for (name, stream) in relationships {
        let child_schema = schema
            .relationships()
            .iter()
            .find(|(rel, _)| rel == &name)
            .map(|(_, s)| s.clone());
        let converted = match &child_schema {
            Some(child_schema) => stream
                .into_nodes()
                .into_iter()
                .map(|child| convert(child, child_schema))
                .collect(),
            None => stream
                .into_nodes()
                .into_iter()
                .map(|child| ViewNode {
                    row: child.into_parts().0,
                    children: Vec::new(),
                })
                .collect(),
        };
        children.push((external_relationship_name(&name), converted));
    }
    ViewNode { row, children }
}

fn insert_sorted(entries: &mut Vec<ViewNode>, schema: &TableSchema, node: ViewNode) {
    let key = pk_of(schema, &node.row);
    let pos = entries
        .binary_search_by(|probe| pk_of(schema, &probe.row).cmp(&key))
        .unwrap_or_else(|pos| pos);
    entries.insert(pos, node);
}

fn apply_change(schema: &TableSchema, entries: &mut Vec<ViewNode>, change: Change) {
    match change {
        Change::Add { node } => {
            let converted = convert(node, schema);
            insert_sorted(entries, schema, converted);
        }
        Change::Remove { node } => {
            // Consume the node's streams so deferred cleanup pulls run.
            let mut node = node;
            node.materialize();
            let key = pk_of(schema, &node.row);
            let pos = entries
                .iter()
                .position(|entry| pk_of(schema, &entry.row) == key);
            debug_assert!(pos.is_some(), "remove for a row absent from the view");
            if let Some(pos) = pos {
                entries.remove(pos);
            }
        }
        Change::Child { row, child } => {
            let key = pk_of(schema, &row);
            let parent = entries
                .iter_mut()
                .find(|entry| pk_of(schema, &entry.row) == key);
            debug_assert!(parent.is_some(), "child change for an absent parent");
            let parent = match parent {
                Some(parent) => parent,
                None => return,
            };
            let child_schema = schema
                .relationships()
                .iter()
                .find(|(rel, _)| rel == &child.relationship_name)
                .map(|(_, s)| s.clone())
                .unwrap_or_else(|| schema.clone());
            let external = external_relationship_name(&child.relationship_name);
            let list = match parent
                .children
                .iter_mut()
                .position(|(name, _)| name == &external)
            {
                Some(pos) => &mut parent.children[pos].1,
                None => {
                    parent.children.push((external, Vec::new()));
                    let last = parent.children.len() - 1;
                    &mut parent.children[last].1
                }
            };
            apply_change(&child_schema, list, *child.change);
        }
    }
}
