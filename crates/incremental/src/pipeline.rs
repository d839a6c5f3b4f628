//! Pipelines: an operator tree plus its single output slot.
//!
//! Lifecycle per subscription: `fetch` → `set_output` → pushes →
//! `clear_output` → `cleanup` (mirroring the fetch) → `destroy`. Pushes
//! processed while no output is attached still update operator state —
//! joins and distinct must track the world even when nobody listens —
//! but deliver nothing.

use crate::fetch::FetchRequest;
use crate::operators::OperatorNode;
use crate::output::Output;
use crate::source::SourceChange;
use alloc::boxed::Box;
use alloc::vec::Vec;
use rill_core::{Error, Node, Result, TableSchema};

pub struct Pipeline {
    root: OperatorNode,
    output: Option<Box<dyn Output>>,
}

impl core::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pipeline")
            .field("root", &self.root)
            .field("output", &self.output.is_some())
            .finish()
    }
}

impl Pipeline {
    pub fn new(root: OperatorNode) -> Self {
        Self { root, output: None }
    }

    /// Schema of the terminal operator.
    pub fn schema(&self) -> &TableSchema {
        self.root.schema()
    }

    /// Initial materialization of the full result.
    pub fn fetch(&mut self) -> Vec<Node> {
        self.root.fetch(&FetchRequest::all())
    }

    /// Mirror of the initial fetch, releasing per-constraint state.
    pub fn cleanup(&mut self) -> Vec<Node> {
        self.root.cleanup(&FetchRequest::all())
    }

    /// Attaches the single consumer. Fails if one is already attached.
    pub fn set_output(&mut self, output: Box<dyn Output>) -> Result<()> {
        if self.output.is_some() {
            return Err(Error::invariant("pipeline already has an output"));
        }
        self.output = Some(output);
        Ok(())
    }

    /// Detaches the consumer, if any.
    pub fn clear_output(&mut self) -> Option<Box<dyn Output>> {
        self.output.take()
    }

    /// Returns true if a consumer is attached.
    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Propagates one source mutation through the graph, delivering the
    /// resulting changes to the output. The call runs to quiescence
    /// before returning.
    pub fn push_source(&mut self, table: &str, change: &SourceChange) -> Result<()> {
        let changes = self.root.push_source(table, change)?;
        match &mut self.output {
            Some(output) => {
                for change in changes {
                    output.push(change);
                }
            }
            None => {
                // Nobody consumes these, but their deferred child pulls
                // (cleanup pulls in particular) must still run.
                for mut change in changes {
                    change.materialize();
                }
            }
        }
        Ok(())
    }

    /// Synchronous, recursive teardown.
    pub fn destroy(&mut self) {
        self.output = None;
        self.root.destroy();
    }

    /// Returns true if every operator's storage is empty; holds before
    /// the first fetch and again after a full cleanup.
    pub fn storage_is_empty(&self) -> bool {
        self.root.storage_is_empty()
    }

    /// The terminal operator, for inspection in tests.
    pub fn root(&self) -> &OperatorNode {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchRequest;
    use crate::operators::{Join, OperatorNode};
    use crate::output::CollectingOutput;
    use crate::source::{Scan, Source, SourceChange, SourceHandle};
    use alloc::string::String;
    use alloc::vec;
    use alloc::vec::Vec;
    use rill_core::{text_pk_schema, Change, DataType, Row, Value};

    fn issue_source() -> SourceHandle {
        let schema = text_pk_schema(
            "issue",
            &[("id", DataType::Text), ("owner", DataType::Text)],
            &["id"],
        )
        .unwrap();
        Source::handle(schema)
    }

    fn comment_source() -> SourceHandle {
        let schema = text_pk_schema(
            "comment",
            &[("id", DataType::Text), ("issue_id", DataType::Text)],
            &["id"],
        )
        .unwrap();
        Source::handle(schema)
    }

    fn issue(id: &str, owner: &str) -> Row {
        Row::from_pairs(vec![
            ("id", Value::Text(id.into())),
            ("owner", Value::Text(owner.into())),
        ])
    }

    fn comment(id: &str, issue_id: &str) -> Row {
        Row::from_pairs(vec![
            ("id", Value::Text(id.into())),
            ("issue_id", Value::Text(issue_id.into())),
        ])
    }

    fn apply(
        pipeline: &mut Pipeline,
        source: &SourceHandle,
        table: &str,
        change: SourceChange,
    ) {
        source.borrow_mut().push(&change).unwrap();
        pipeline.push_source(table, &change).unwrap();
    }

    fn join_pipeline(issues: &SourceHandle, comments: &SourceHandle) -> Pipeline {
        issues.borrow_mut().ensure_index("id").unwrap();
        comments.borrow_mut().ensure_index("issue_id").unwrap();
        let join = Join::new(
            OperatorNode::Scan(Scan::new(issues)),
            OperatorNode::Scan(Scan::new(comments)).shared(),
            "id",
            "issue_id",
            "comments",
        )
        .unwrap();
        Pipeline::new(OperatorNode::Join(join))
    }

    fn child_ids(node: &mut rill_core::Node, relationship: &str) -> Vec<String> {
        node.take_relationship(relationship)
            .unwrap()
            .into_nodes()
            .into_iter()
            .map(|n| match n.row.get("id") {
                Some(Value::Text(s)) => s.clone(),
                other => panic!("unexpected id {:?}", other),
            })
            .collect()
    }

    #[test]
    fn join_fetch_attaches_matching_children() {
        let issues = issue_source();
        let comments = comment_source();
        let mut pipeline = join_pipeline(&issues, &comments);

        for row in [issue("i1", "u1"), issue("i2", "u2")] {
            apply(&mut pipeline, &issues, "issue", SourceChange::Add(row));
        }
        for row in [comment("c1", "i1"), comment("c2", "i1"), comment("c3", "i2")] {
            apply(&mut pipeline, &comments, "comment", SourceChange::Add(row));
        }

        let mut nodes = pipeline.fetch();
        assert_eq!(nodes.len(), 2);
        assert_eq!(child_ids(&mut nodes[0], "comments"), vec!["c1", "c2"]);
        assert_eq!(child_ids(&mut nodes[1], "comments"), vec!["c3"]);
    }

    #[test]
    fn join_child_insert_fans_out_to_matching_parents() {
        let issues = issue_source();
        let comments = comment_source();
        // Two issues share owner u1; join on owner so one comment keyed
        // by owner reaches both parents.
        issues.borrow_mut().ensure_index("owner").unwrap();
        comments.borrow_mut().ensure_index("issue_id").unwrap();
        let join = Join::new(
            OperatorNode::Scan(Scan::new(&issues)),
            OperatorNode::Scan(Scan::new(&comments)).shared(),
            "owner",
            "issue_id",
            "comments",
        )
        .unwrap();
        let mut pipeline = Pipeline::new(OperatorNode::Join(join));

        apply(&mut pipeline, &issues, "issue", SourceChange::Add(issue("i1", "u1")));
        apply(&mut pipeline, &issues, "issue", SourceChange::Add(issue("i2", "u1")));
        pipeline.fetch();

        let output = CollectingOutput::new();
        pipeline.set_output(Box::new(output.clone())).unwrap();

        apply(
            &mut pipeline,
            &comments,
            "comment",
            SourceChange::Add(comment("c1", "u1")),
        );

        let changes = output.take();
        assert_eq!(changes.len(), 2);
        let mut parent_ids: Vec<String> = changes
            .iter()
            .map(|c| match c {
                Change::Child { row, child } => {
                    assert_eq!(child.relationship_name, "comments");
                    assert!(child.change.is_add());
                    match row.get("id") {
                        Some(Value::Text(s)) => s.clone(),
                        other => panic!("unexpected id {:?}", other),
                    }
                }
                other => panic!("expected child change, got {:?}", other),
            })
            .collect();
        parent_ids.sort();
        assert_eq!(parent_ids, vec!["i1", "i2"]);
    }

    #[test]
    fn join_cleanup_spares_sibling_subtrees() {
        let issues = issue_source();
        let comments = comment_source();
        issues.borrow_mut().ensure_index("owner").unwrap();
        comments.borrow_mut().ensure_index("issue_id").unwrap();
        let join = Join::new(
            OperatorNode::Scan(Scan::new(&issues)),
            OperatorNode::Scan(Scan::new(&comments)).shared(),
            "owner",
            "issue_id",
            "comments",
        )
        .unwrap();
        let mut pipeline = Pipeline::new(OperatorNode::Join(join));

        apply(&mut pipeline, &issues, "issue", SourceChange::Add(issue("i1", "u1")));
        apply(&mut pipeline, &issues, "issue", SourceChange::Add(issue("i2", "u1")));
        apply(
            &mut pipeline,
            &comments,
            "comment",
            SourceChange::Add(comment("c1", "u1")),
        );

        let nodes = pipeline.fetch();
        assert_eq!(nodes.len(), 2);
        assert!(!pipeline.storage_is_empty());

        // Removing one of two parents sharing the join value keeps the
        // other's bookkeeping entry alive.
        let change = SourceChange::Remove(issue("i1", "u1"));
        issues.borrow_mut().push(&change).unwrap();
        pipeline.push_source("issue", &change).unwrap();
        assert!(!pipeline.storage_is_empty());

        let change = SourceChange::Remove(issue("i2", "u1"));
        issues.borrow_mut().push(&change).unwrap();
        pipeline.push_source("issue", &change).unwrap();
        assert!(pipeline.storage_is_empty());
    }

    #[test]
    fn fetch_cleanup_round_trip_restores_storage() {
        let issues = issue_source();
        let comments = comment_source();
        let mut pipeline = join_pipeline(&issues, &comments);

        apply(&mut pipeline, &issues, "issue", SourceChange::Add(issue("i1", "u1")));
        apply(
            &mut pipeline,
            &comments,
            "comment",
            SourceChange::Add(comment("c1", "i1")),
        );

        assert!(pipeline.storage_is_empty());
        let fetched = pipeline.fetch();
        assert_eq!(fetched.len(), 1);
        assert!(!pipeline.storage_is_empty());

        let cleaned = pipeline.cleanup();
        assert_eq!(cleaned.len(), 1);
        assert!(pipeline.storage_is_empty());
    }

    #[test]
    fn single_output_slot() {
        let issues = issue_source();
        let mut pipeline = Pipeline::new(OperatorNode::Scan(Scan::new(&issues)));
        pipeline
            .set_output(Box::new(CollectingOutput::new()))
            .unwrap();
        assert!(pipeline
            .set_output(Box::new(CollectingOutput::new()))
            .is_err());
        pipeline.clear_output();
        assert!(pipeline
            .set_output(Box::new(CollectingOutput::new()))
            .is_ok());
    }

    #[test]
    fn pushes_without_output_still_update_state() {
        let issues = issue_source();
        let comments = comment_source();
        let mut pipeline = join_pipeline(&issues, &comments);

        apply(&mut pipeline, &issues, "issue", SourceChange::Add(issue("i1", "u1")));
        pipeline.fetch();

        // No output attached; the push must still maintain join storage.
        apply(
            &mut pipeline,
            &issues,
            "issue",
            SourceChange::Add(issue("i2", "u9")),
        );
        let mut nodes = pipeline.root.fetch(&FetchRequest::all());
        assert_eq!(nodes.len(), 2);
        assert_eq!(child_ids(&mut nodes[0], "comments"), Vec::<String>::new());
    }
}
