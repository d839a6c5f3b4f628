//! The query engine: sources, registered pipelines, and the replication
//! inbound path.
//!
//! Registration normalizes and fingerprints each query so semantically
//! equivalent registrations share one compiled pipeline; a refcount
//! destroys the pipeline when the last registrant leaves. Replication
//! events are applied to the owning source first, then propagated through
//! every registered pipeline to quiescence, in registration order.

use crate::builder::{build_related_pipeline, Related};
use crate::resolver::{SourceMap, SourceResolver};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use hashbrown::HashMap;
use log::{debug, trace};
use rill_core::{Error, Node, Result, Row, TableSchema};
use rill_incremental::{Output, Pipeline, Source, SourceChange, SourceHandle};
use rill_query::{fingerprint::FnvHasher, hash_ast, normalize, Ast};
use rill_reactive::{QueryView, ViewHandle};

/// Handle to a registered query.
pub type QueryId = u64;

/// A row-level replication event. Updates decompose into delete + insert.
#[derive(Clone, Debug)]
pub enum RowEvent {
    Insert(Row),
    Delete(Row),
    Update(Row, Row),
}

struct RegisteredQuery {
    pipeline: Pipeline,
    ast: Ast,
    fingerprint: u64,
    refcount: usize,
}

/// One query-engine instance: the per-replica collection of sources and
/// live pipelines.
#[derive(Default)]
pub struct QueryEngine {
    sources: SourceMap,
    queries: BTreeMap<QueryId, RegisteredQuery>,
    by_fingerprint: HashMap<u64, QueryId>,
    next_id: QueryId,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a source for a replicated table.
    pub fn create_source(&mut self, schema: TableSchema) -> Result<SourceHandle> {
        if self.sources.contains(schema.name()) {
            return Err(Error::invalid_schema("table already has a source"));
        }
        debug!("creating source for table {}", schema.name());
        let source = Source::handle(schema);
        self.sources.insert(source.clone());
        Ok(source)
    }

    /// Returns the source for a table, if registered.
    pub fn source(&self, table: &str) -> Option<SourceHandle> {
        self.sources.get(table).cloned()
    }

    /// Applies one replication event: the source index mutates first,
    /// then the change propagates through every registered pipeline.
    pub fn apply(&mut self, table: &str, event: RowEvent) -> Result<()> {
        let changes = match event {
            RowEvent::Insert(row) => alloc::vec![SourceChange::Add(row)],
            RowEvent::Delete(row) => alloc::vec![SourceChange::Remove(row)],
            RowEvent::Update(old, new) => {
                alloc::vec![SourceChange::Remove(old), SourceChange::Add(new)]
            }
        };
        let source = self
            .sources
            .resolve(table)
            .ok_or_else(|| Error::unknown_table(table))?;
        for change in changes {
            trace!("applying change to table {}", table);
            source.borrow_mut().push(&change)?;
            for query in self.queries.values_mut() {
                query.pipeline.push_source(table, &change)?;
            }
        }
        Ok(())
    }

    /// Registers a query, sharing the pipeline of an equivalent existing
    /// registration.
    pub fn register(&mut self, ast: Ast) -> Result<QueryId> {
        self.register_related(ast, Vec::new())
    }

    /// Registers a query with related sub-queries.
    pub fn register_related(&mut self, ast: Ast, related: Vec<Related>) -> Result<QueryId> {
        let ast = normalize(ast);
        let related = normalize_related(related);
        let fingerprint = fingerprint_with_related(&ast, &related);

        if let Some(&id) = self.by_fingerprint.get(&fingerprint) {
            if let Some(query) = self.queries.get_mut(&id) {
                query.refcount += 1;
                debug!("query {} re-registered (refcount {})", id, query.refcount);
                return Ok(id);
            }
        }

        let pipeline = build_related_pipeline(&ast, &related, &self.sources)?;
        let id = self.next_id;
        self.next_id += 1;
        debug!("registered query {} on table {}", id, ast.table);
        self.queries.insert(
            id,
            RegisteredQuery {
                pipeline,
                ast,
                fingerprint,
                refcount: 1,
            },
        );
        self.by_fingerprint.insert(fingerprint, id);
        Ok(id)
    }

    /// Initial materialization of a registered query.
    pub fn fetch(&mut self, id: QueryId) -> Result<Vec<Node>> {
        let query = self.query_mut(id)?;
        Ok(query.pipeline.fetch())
    }

    /// Attaches the single consumer of a query's changes.
    pub fn subscribe(&mut self, id: QueryId, output: Box<dyn Output>) -> Result<()> {
        let query = self.query_mut(id)?;
        query.pipeline.set_output(output)
    }

    /// Fetches, builds a maintained view (projection and limit applied),
    /// and attaches it as the query's output in one step, leaving no
    /// window between materialization and subscription.
    pub fn subscribe_view(&mut self, id: QueryId) -> Result<ViewHandle> {
        let query = self.query_mut(id)?;
        let select = query.ast.select.clone();
        let limit = query.ast.limit.map(|limit| limit as usize);
        let view = QueryView::shared(query.pipeline.schema().clone(), select, limit);
        let nodes = query.pipeline.fetch();
        view.borrow_mut().init(nodes);
        query.pipeline.set_output(QueryView::output(&view))?;
        Ok(view)
    }

    /// Detaches the consumer and runs the cleanup mirroring its fetch.
    pub fn unsubscribe(&mut self, id: QueryId) -> Result<()> {
        let query = self.query_mut(id)?;
        query.pipeline.clear_output();
        for mut node in query.pipeline.cleanup() {
            // Deferred child pulls only run when consumed; drive them so
            // nested operators release their per-constraint state too.
            node.materialize();
        }
        Ok(())
    }

    /// Drops one registration; the pipeline is destroyed when the last
    /// registrant unregisters.
    pub fn unregister(&mut self, id: QueryId) -> Result<()> {
        let query = self
            .queries
            .get_mut(&id)
            .ok_or_else(|| Error::invalid_query("unknown query id"))?;
        query.refcount -= 1;
        if query.refcount == 0 {
            let mut query = match self.queries.remove(&id) {
                Some(query) => query,
                None => return Ok(()),
            };
            self.by_fingerprint.remove(&query.fingerprint);
            query.pipeline.destroy();
            debug!("destroyed query {}", id);
        }
        Ok(())
    }

    /// The output schema of a registered query.
    pub fn schema(&self, id: QueryId) -> Result<&TableSchema> {
        let query = self
            .queries
            .get(&id)
            .ok_or_else(|| Error::invalid_query("unknown query id"))?;
        Ok(query.pipeline.schema())
    }

    /// Returns true if a query's operator storage is empty; holds before
    /// its first fetch and again after unsubscribe.
    pub fn storage_is_empty(&self, id: QueryId) -> Result<bool> {
        let query = self
            .queries
            .get(&id)
            .ok_or_else(|| Error::invalid_query("unknown query id"))?;
        Ok(query.pipeline.storage_is_empty())
    }

    /// Number of registered queries.
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    fn query_mut(&mut self, id: QueryId) -> Result<&mut RegisteredQuery> {
        self.queries
            .get_mut(&id)
            .ok_or_else(|| Error::invalid_query("unknown query id"))
    }
}

fn normalize_related(related: Vec<Related>) -> Vec<Related> {
    related
        .into_iter()
        .map(|mut spec| {
            spec.child = normalize(spec.child);
            spec.related = normalize_related(spec.related);
            spec
        })
        .collect()
}

fn fingerprint_with_related(ast: &Ast, related: &[Related]) -> u64 {
    let mut hasher = FnvHasher::new();
    hash_ast(ast, &mut hasher);
    hash_related(related, &mut hasher);
    core::hash::Hasher::finish(&hasher)
}

fn hash_related(related: &[Related], hasher: &mut FnvHasher) {
    use core::hash::Hasher;
    for spec in related {
        hasher.write(b"related");
        hasher.write(spec.relationship_name.as_bytes());
        hasher.write(spec.parent_key.as_bytes());
        hasher.write(spec.child_key.as_bytes());
        hash_ast(&spec.child, hasher);
        hash_related(&spec.related, hasher);
        hasher.write(b"end");
    }
}
