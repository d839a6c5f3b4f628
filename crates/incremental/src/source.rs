//! Sources: the indexed roots of table change streams.
//!
//! A `Source` owns one replicated table: its schema, the primary index,
//! and on-demand secondary equality indexes for columns used as join
//! keys. Sources live for the lifetime of the replica and are shared
//! across pipelines; each pipeline reads through its own stateless `Scan`
//! leaf holding a handle to the source.

use crate::fetch::FetchRequest;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use rill_core::{Change, Error, Node, Result, Row, TableSchema, Value};

/// A row-level mutation arriving from replication. Updates are decomposed
/// into remove-then-add before they reach a source.
#[derive(Clone, Debug)]
pub enum SourceChange {
    Add(Row),
    Remove(Row),
}

impl SourceChange {
    pub fn row(&self) -> &Row {
        match self {
            SourceChange::Add(row) | SourceChange::Remove(row) => row,
        }
    }
}

/// Shared handle to a source.
pub type SourceHandle = Rc<RefCell<Source>>;

/// The indexed, ordered row set of one table.
#[derive(Debug)]
pub struct Source {
    schema: TableSchema,
    /// Primary index: primary-key tuple → row, in key order.
    rows: BTreeMap<Vec<Value>, Row>,
    /// Secondary equality indexes: column → value → set of primary keys.
    indexes: HashMap<String, BTreeMap<Value, BTreeSet<Vec<Value>>>>,
}

impl Source {
    /// Creates an empty source for a validated schema.
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            indexes: HashMap::new(),
        }
    }

    /// Creates a shared handle to an empty source.
    pub fn handle(schema: TableSchema) -> SourceHandle {
        Rc::new(RefCell::new(Self::new(schema)))
    }

    /// Returns the table schema.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Builds a secondary equality index over `column` if one does not
    /// exist yet. Pipeline builders call this for join keys.
    pub fn ensure_index(&mut self, column: &str) -> Result<()> {
        if !self.schema.has_column(column) {
            return Err(Error::unknown_column(self.schema.name(), column));
        }
        if self.indexes.contains_key(column) {
            return Ok(());
        }
        let mut index: BTreeMap<Value, BTreeSet<Vec<Value>>> = BTreeMap::new();
        for (pk, row) in &self.rows {
            index
                .entry(row.get_or_null(column))
                .or_default()
                .insert(pk.clone());
        }
        self.indexes.insert(String::from(column), index);
        Ok(())
    }

    /// Applies a replication mutation, maintaining every index.
    ///
    /// Rejects rows that are missing a primary-key column or carry null in
    /// one, adds for a key already present, and removes of absent rows.
    pub fn push(&mut self, change: &SourceChange) -> Result<()> {
        let pk = change.row().key(self.schema.primary_key())?;
        match change {
            SourceChange::Add(row) => {
                if self.rows.contains_key(&pk) {
                    return Err(Error::duplicate_row(
                        self.schema.name(),
                        rill_core::key::tuple_string(&pk),
                    ));
                }
                for (column, index) in self.indexes.iter_mut() {
                    index
                        .entry(row.get_or_null(column))
                        .or_default()
                        .insert(pk.clone());
                }
                self.rows.insert(pk, row.clone());
            }
            SourceChange::Remove(_) => {
                let stored = match self.rows.remove(&pk) {
                    Some(row) => row,
                    None => {
                        return Err(Error::missing_row(
                            self.schema.name(),
                            rill_core::key::tuple_string(&pk),
                        ))
                    }
                };
                for (column, index) in self.indexes.iter_mut() {
                    let value = stored.get_or_null(column);
                    if let Some(set) = index.get_mut(&value) {
                        set.remove(&pk);
                        if set.is_empty() {
                            index.remove(&value);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns current rows satisfying the request, in primary-index
    /// order, using a secondary index for the constrained column when one
    /// exists.
    pub fn rows(&self, request: &FetchRequest) -> Vec<Row> {
        match &request.constraint {
            None => self.rows.values().cloned().collect(),
            Some(c) => {
                if let Some(index) = self.indexes.get(&c.key) {
                    match index.get(&c.value) {
                        None => Vec::new(),
                        Some(pks) => pks
                            .iter()
                            .filter_map(|pk| self.rows.get(pk).cloned())
                            .collect(),
                    }
                } else {
                    self.rows
                        .values()
                        .filter(|row| row.get_or_null(&c.key) == c.value)
                        .cloned()
                        .collect()
                }
            }
        }
    }
}

/// Stateless per-pipeline leaf reading one source.
#[derive(Debug)]
pub struct Scan {
    source: SourceHandle,
    schema: TableSchema,
}

impl Scan {
    /// Creates a scan over the source.
    pub fn new(source: &SourceHandle) -> Self {
        let schema = source.borrow().schema().clone();
        Self {
            source: Rc::clone(source),
            schema,
        }
    }

    /// Returns the schema of rows this scan yields.
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Pulls the current rows as nodes; fetch and cleanup are identical
    /// here since scans keep no per-constraint state.
    pub fn pull(&self, request: &FetchRequest) -> Vec<Node> {
        self.source
            .borrow()
            .rows(request)
            .into_iter()
            .map(Node::new)
            .collect()
    }

    /// Converts a source mutation into a node change, if it belongs to
    /// this scan's table.
    pub fn push_source(&self, table: &str, change: &SourceChange) -> Vec<Change> {
        if table != self.schema.name() {
            return Vec::new();
        }
        let change = match change {
            SourceChange::Add(row) => Change::add(Node::new(row.clone())),
            SourceChange::Remove(row) => Change::remove(Node::new(row.clone())),
        };
        alloc::vec![change]
    }

    /// Duplicates this scan; used when OR branches share one upstream.
    pub fn duplicate(&self) -> Scan {
        Scan {
            source: Rc::clone(&self.source),
            schema: self.schema.clone(),
        }
    }
}
