//! Distinct operator: primary-key dedup with reference counts.
//!
//! Above a Concat of OR branches, the same row can arrive once per branch
//! that accepts it. Distinct stores `refcount,<pk…>,` counts so that N
//! adds for one primary key produce one external add and only the final
//! remove produces the external remove. Fetch primes the counts to the
//! observed multiplicities; cleanup deletes them, returning the store to
//! its pre-subscribe state.

use crate::fetch::{FetchMode, FetchRequest};
use crate::operators::OperatorNode;
use crate::source::SourceChange;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use hashbrown::{HashMap, HashSet};
use rill_core::key::storage_key;
use rill_core::{Change, Error, Node, Result, Row, TableSchema};
use rill_storage::{OperatorStorage, StoredValue};

#[derive(Debug)]
pub struct Distinct {
    input: Box<OperatorNode>,
    primary_key: Vec<String>,
    storage: OperatorStorage,
}

impl Distinct {
    pub fn new(input: OperatorNode) -> Self {
        let primary_key = input.schema().primary_key().to_vec();
        Self {
            input: Box::new(input),
            primary_key,
            storage: OperatorStorage::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        self.input.schema()
    }

    fn refcount_key(&self, row: &Row) -> String {
        let values: Vec<rill_core::Value> = self
            .primary_key
            .iter()
            .map(|col| row.get_or_null(col))
            .collect();
        let parts: Vec<&rill_core::Value> = values.iter().collect();
        storage_key("refcount", &parts)
    }

    pub fn pull(&mut self, mode: FetchMode, request: &FetchRequest) -> Vec<Node> {
        match mode {
            FetchMode::Fetch => {
                // Yield first occurrences; prime counts to the observed
                // multiplicity so later pushes decrement correctly.
                let mut seen: HashMap<String, i64> = HashMap::new();
                let mut out = Vec::new();
                for node in self.input.pull(mode, request) {
                    let key = self.refcount_key(&node.row);
                    let entry = seen.entry(key).or_insert(0);
                    *entry += 1;
                    if *entry == 1 {
                        out.push(node);
                    }
                }
                for (key, count) in seen {
                    self.storage.set(key, StoredValue::Count(count));
                }
                out
            }
            FetchMode::Cleanup => {
                let mut seen: HashSet<String> = HashSet::new();
                let mut out = Vec::new();
                for node in self.input.pull(mode, request) {
                    let key = self.refcount_key(&node.row);
                    if seen.insert(key.clone()) {
                        out.push(node);
                    }
                    self.storage.del(&key);
                }
                out
            }
        }
    }

    pub fn push_source(&mut self, table: &str, change: &SourceChange) -> Result<Vec<Change>> {
        let mut out = Vec::new();
        for input_change in self.input.push_source(table, change)? {
            match input_change {
                Change::Add { node } => {
                    let key = self.refcount_key(&node.row);
                    if self.storage.add_count(&key, 1) == 1 {
                        out.push(Change::Add { node });
                    }
                }
                Change::Remove { node } => {
                    let key = self.refcount_key(&node.row);
                    let count = self.storage.add_count(&key, -1);
                    if count < 0 {
                        return Err(Error::invariant(
                            "distinct received a remove for an absent primary key",
                        ));
                    }
                    if count == 0 {
                        out.push(Change::Remove { node });
                    }
                }
                Change::Child { row, child } => {
                    let key = self.refcount_key(&row);
                    match self.storage.get(&key) {
                        Some(value) if value.count() > 0 => {
                            out.push(Change::Child { row, child })
                        }
                        _ => {
                            return Err(Error::invariant(
                                "child change for a parent absent from distinct output",
                            ))
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn destroy(&mut self) {
        self.storage.clear();
        self.input.destroy();
    }

    pub fn contains(&self, target: &crate::operators::OperatorRef) -> bool {
        self.input.contains(target)
    }

    pub fn duplicate_stateless(&self) -> Result<Distinct> {
        Ok(Distinct {
            input: Box::new(self.input.duplicate_stateless()?),
            primary_key: self.primary_key.clone(),
            storage: OperatorStorage::new(),
        })
    }

    pub fn storage_is_empty(&self) -> bool {
        self.storage.is_empty() && self.input.storage_is_empty()
    }
}
