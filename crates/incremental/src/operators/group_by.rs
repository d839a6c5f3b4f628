//! GroupBy + aggregate operator.
//!
//! Rows are partitioned by the canonical encoding of their group-column
//! tuple. Each group keeps an insertion-ordered membership list keyed by
//! the row's encoded primary key, plus one accumulator per aggregation.
//! The synthetic output row for a group is its first surviving member's
//! row merged with `{alias: value}` for every aggregation.
//!
//! When an aggregate value (or the representative member) changes for an
//! existing group, the operator emits `Remove` of the old synthetic node
//! followed by `Add` of the new one, preserving per-primary-key ordering.

use crate::fetch::{FetchMode, FetchRequest};
use crate::operators::agg::{Accumulator, Aggregation};
use crate::operators::OperatorNode;
use crate::source::SourceChange;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use rill_core::key::tuple_string;
use rill_core::{Change, Column, Error, Node, Result, Row, TableSchema, Value};

#[derive(Debug)]
struct GroupState {
    /// Members in insertion order: (encoded primary key, row).
    members: Vec<(String, Row)>,
    accumulators: Vec<Accumulator>,
}

impl GroupState {
    fn new(aggregations: &[Aggregation]) -> Self {
        Self {
            members: Vec::new(),
            accumulators: aggregations.iter().map(Accumulator::new).collect(),
        }
    }

    fn add(&mut self, aggregations: &[Aggregation], member_key: String, row: Row) {
        for (accumulator, aggregation) in self.accumulators.iter_mut().zip(aggregations) {
            accumulator.apply(aggregation, &member_key, &row, 1);
        }
        self.members.push((member_key, row));
    }

    fn remove(&mut self, aggregations: &[Aggregation], member_key: &str) -> bool {
        let pos = match self.members.iter().position(|(k, _)| k == member_key) {
            Some(pos) => pos,
            None => return false,
        };
        let (key, row) = self.members.remove(pos);
        for (accumulator, aggregation) in self.accumulators.iter_mut().zip(aggregations) {
            accumulator.apply(aggregation, &key, &row, -1);
        }
        true
    }

    /// First surviving member's row merged with the aggregate aliases.
    fn synthetic_row(&self, aggregations: &[Aggregation]) -> Option<Row> {
        let (_, first) = self.members.first()?;
        let mut row = first.clone();
        for (accumulator, aggregation) in self.accumulators.iter().zip(aggregations) {
            row.set(aggregation.alias.clone(), accumulator.value());
        }
        Some(row)
    }
}

#[derive(Debug)]
pub struct GroupBy {
    input: Box<OperatorNode>,
    group_columns: Vec<String>,
    aggregations: Vec<Aggregation>,
    member_key_columns: Vec<String>,
    groups: BTreeMap<String, GroupState>,
    schema: TableSchema,
}

impl GroupBy {
    pub fn new(
        input: OperatorNode,
        group_columns: Vec<String>,
        aggregations: Vec<Aggregation>,
    ) -> Result<Self> {
        let input_schema = input.schema();
        for column in &group_columns {
            if !input_schema.has_column(column) {
                return Err(Error::unknown_column(input_schema.name(), column.clone()));
            }
        }
        let mut alias_columns = Vec::with_capacity(aggregations.len());
        for aggregation in &aggregations {
            if let Some(field) = &aggregation.field {
                if !input_schema.has_column(field) {
                    return Err(Error::unknown_column(input_schema.name(), field.clone()));
                }
            }
            let field_type = aggregation
                .field
                .as_deref()
                .and_then(|f| input_schema.column(f))
                .map(|c| c.data_type);
            alias_columns.push(Column::new(
                aggregation.alias.clone(),
                aggregation.output_type(field_type),
            ));
        }
        let member_key_columns = input_schema.primary_key().to_vec();
        let schema = input_schema.with_columns(alias_columns);
        Ok(Self {
            input: Box::new(input),
            group_columns,
            aggregations,
            member_key_columns,
            groups: BTreeMap::new(),
            schema,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Canonical group key: JSON-encoded tuple of the group columns'
    /// values in declared order.
    fn group_key(&self, row: &Row) -> String {
        let values: Vec<Value> = self
            .group_columns
            .iter()
            .map(|col| row.get_or_null(col))
            .collect();
        tuple_string(&values)
    }

    fn member_key(&self, row: &Row) -> String {
        let values: Vec<Value> = self
            .member_key_columns
            .iter()
            .map(|col| row.get_or_null(col))
            .collect();
        tuple_string(&values)
    }

    /// Rebuilds group state from an input pull and yields the synthetic
    /// nodes in group-key order.
    pub fn pull(&mut self, mode: FetchMode, request: &FetchRequest) -> Vec<Node> {
        self.groups.clear();
        let inputs = self.input.pull(mode, &FetchRequest::all());
        for node in inputs {
            let group_key = self.group_key(&node.row);
            let member_key = self.member_key(&node.row);
            self.groups
                .entry(group_key)
                .or_insert_with(|| GroupState::new(&self.aggregations))
                .add(&self.aggregations, member_key, node.row);
        }

        let mut out = Vec::with_capacity(self.groups.len());
        for state in self.groups.values() {
            if let Some(row) = state.synthetic_row(&self.aggregations) {
                if request.admits(&row) {
                    out.push(Node::new(row));
                }
            }
        }
        if mode == FetchMode::Cleanup {
            self.groups.clear();
        }
        out
    }

    pub fn push_source(&mut self, table: &str, change: &SourceChange) -> Result<Vec<Change>> {
        let mut out = Vec::new();
        for input_change in self.input.push_source(table, change)? {
            match input_change {
                Change::Add { node } => self.apply_add(node.row, &mut out),
                Change::Remove { node } => self.apply_remove(node.row, &mut out)?,
                Change::Child { .. } => {
                    return Err(Error::invariant(
                        "child change reached a group-by operator",
                    ))
                }
            }
        }
        Ok(out)
    }

    fn apply_add(&mut self, row: Row, out: &mut Vec<Change>) {
        let group_key = self.group_key(&row);
        let member_key = self.member_key(&row);
        let state = self
            .groups
            .entry(group_key)
            .or_insert_with(|| GroupState::new(&self.aggregations));
        let before = state.synthetic_row(&self.aggregations);
        state.add(&self.aggregations, member_key, row);
        let after = state.synthetic_row(&self.aggregations);
        emit_transition(before, after, out);
    }

    fn apply_remove(&mut self, row: Row, out: &mut Vec<Change>) -> Result<()> {
        let group_key = self.group_key(&row);
        let member_key = self.member_key(&row);
        let state = match self.groups.get_mut(&group_key) {
            Some(state) => state,
            None => {
                return Err(Error::missing_row(self.schema.name(), group_key));
            }
        };
        let before = state.synthetic_row(&self.aggregations);
        if !state.remove(&self.aggregations, &member_key) {
            return Err(Error::missing_row(self.schema.name(), member_key));
        }
        let after = state.synthetic_row(&self.aggregations);
        if state.members.is_empty() {
            self.groups.remove(&group_key);
        }
        emit_transition(before, after, out);
        Ok(())
    }

    pub fn destroy(&mut self) {
        self.groups.clear();
        self.input.destroy();
    }

    pub fn contains(&self, target: &crate::operators::OperatorRef) -> bool {
        self.input.contains(target)
    }

    pub fn storage_is_empty(&self) -> bool {
        self.input.storage_is_empty()
    }

    /// Number of live groups, for lifecycle tests.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

fn emit_transition(before: Option<Row>, after: Option<Row>, out: &mut Vec<Change>) {
    match (before, after) {
        (None, Some(row)) => out.push(Change::add(Node::new(row))),
        (Some(row), None) => out.push(Change::remove(Node::new(row))),
        (Some(old), Some(new)) => {
            if old != new {
                out.push(Change::remove(Node::new(old)));
                out.push(Change::add(Node::new(new)));
            }
        }
        (None, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::agg::AggregateFn;
    use crate::source::{Scan, Source, SourceChange, SourceHandle};
    use alloc::string::ToString;
    use alloc::vec;
    use rill_core::{text_pk_schema, DataType};

    fn event_source() -> SourceHandle {
        let schema = text_pk_schema(
            "event",
            &[
                ("id", DataType::Text),
                ("g", DataType::Text),
                ("v", DataType::Int),
            ],
            &["id"],
        )
        .unwrap();
        Source::handle(schema)
    }

    fn event(id: &str, g: &str, v: i64) -> Row {
        Row::from_pairs(vec![
            ("id", Value::Text(id.into())),
            ("g", Value::Text(g.into())),
            ("v", Value::Int(v)),
        ])
    }

    fn group_by(source: &SourceHandle, aggregations: Vec<Aggregation>) -> GroupBy {
        GroupBy::new(
            OperatorNode::Scan(Scan::new(source)),
            vec!["g".to_string()],
            aggregations,
        )
        .unwrap()
    }

    fn count_and_sum() -> Vec<Aggregation> {
        vec![
            Aggregation::new(AggregateFn::Count, None, "count"),
            Aggregation::new(AggregateFn::Sum, Some("v".to_string()), "sum"),
        ]
    }

    fn apply(op: &mut GroupBy, source: &SourceHandle, change: SourceChange) -> Vec<Change> {
        source.borrow_mut().push(&change).unwrap();
        op.push_source("event", &change).unwrap()
    }

    #[test]
    fn fetch_builds_groups_in_key_order() {
        let source = event_source();
        let mut op = group_by(&source, count_and_sum());
        for row in [event("e2", "b", 5), event("e1", "a", 1), event("e3", "a", 2)] {
            source.borrow_mut().push(&SourceChange::Add(row)).unwrap();
        }
        let nodes = op.pull(FetchMode::Fetch, &FetchRequest::all());
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].row.get_or_null("g"), Value::Text("a".into()));
        assert_eq!(nodes[0].row.get_or_null("count"), Value::Int(2));
        assert_eq!(nodes[0].row.get_or_null("sum"), Value::Int(3));
        assert_eq!(nodes[1].row.get_or_null("g"), Value::Text("b".into()));
        assert_eq!(nodes[1].row.get_or_null("sum"), Value::Int(5));
    }

    #[test]
    fn push_emits_group_transitions() {
        let source = event_source();
        let mut op = group_by(&source, count_and_sum());

        // First member of a group: a plain add.
        let out = apply(&mut op, &source, SourceChange::Add(event("e1", "a", 1)));
        assert_eq!(out.len(), 1);
        assert!(out[0].is_add());

        // Second member: the aggregate value changes, remove + add.
        let out = apply(&mut op, &source, SourceChange::Add(event("e2", "a", 2)));
        assert_eq!(out.len(), 2);
        assert!(out[0].is_remove());
        assert!(out[1].is_add());
        assert_eq!(out[1].row().get_or_null("sum"), Value::Int(3));

        // Emptying the group: removes cascade down to a final remove.
        let out = apply(&mut op, &source, SourceChange::Remove(event("e2", "a", 2)));
        assert_eq!(out.len(), 2);
        let out = apply(&mut op, &source, SourceChange::Remove(event("e1", "a", 1)));
        assert_eq!(out.len(), 1);
        assert!(out[0].is_remove());
        assert_eq!(op.group_count(), 0);
    }

    #[test]
    fn representative_row_follows_first_surviving_member() {
        let source = event_source();
        let mut op = group_by(&source, count_and_sum());
        apply(&mut op, &source, SourceChange::Add(event("e1", "a", 1)));
        apply(&mut op, &source, SourceChange::Add(event("e2", "a", 2)));

        let out = apply(&mut op, &source, SourceChange::Remove(event("e1", "a", 1)));
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].row().get_or_null("id"), Value::Text("e2".into()));
        assert_eq!(out[1].row().get_or_null("count"), Value::Int(1));
    }

    #[test]
    fn min_ties_survive_single_removal() {
        let source = event_source();
        let mut op = group_by(
            &source,
            vec![Aggregation::new(AggregateFn::Min, Some("v".to_string()), "least")],
        );
        apply(&mut op, &source, SourceChange::Add(event("e1", "a", 2)));
        apply(&mut op, &source, SourceChange::Add(event("e2", "a", 2)));
        apply(&mut op, &source, SourceChange::Add(event("e3", "a", 7)));

        let out = apply(&mut op, &source, SourceChange::Remove(event("e1", "a", 2)));
        // Representative changed but the minimum did not.
        assert_eq!(out.last().unwrap().row().get_or_null("least"), Value::Int(2));

        let out = apply(&mut op, &source, SourceChange::Remove(event("e2", "a", 2)));
        assert_eq!(out.last().unwrap().row().get_or_null("least"), Value::Int(7));
    }

    #[test]
    fn array_preserves_insertion_order_across_groups() {
        let source = event_source();
        let mut op = group_by(
            &source,
            vec![Aggregation::new(AggregateFn::Array, Some("v".to_string()), "values")],
        );
        apply(&mut op, &source, SourceChange::Add(event("e3", "a", 3)));
        apply(&mut op, &source, SourceChange::Add(event("e1", "a", 1)));
        let nodes = op.pull(FetchMode::Fetch, &FetchRequest::all());
        assert_eq!(
            nodes[0].row.get_or_null("values"),
            Value::Array(vec![Value::Int(3), Value::Int(1)])
        );
    }

    #[test]
    fn cleanup_clears_group_state() {
        let source = event_source();
        let mut op = group_by(&source, count_and_sum());
        apply(&mut op, &source, SourceChange::Add(event("e1", "a", 1)));
        let fetched = op.pull(FetchMode::Fetch, &FetchRequest::all());
        assert_eq!(op.group_count(), 1);
        let cleaned = op.pull(FetchMode::Cleanup, &FetchRequest::all());
        assert_eq!(fetched.len(), cleaned.len());
        assert_eq!(op.group_count(), 0);
    }

    #[test]
    fn remove_for_unknown_group_is_an_invariant_violation() {
        let source = event_source();
        let mut op = group_by(&source, count_and_sum());
        let change = SourceChange::Add(event("e9", "z", 1));
        source.borrow_mut().push(&change).unwrap();
        source
            .borrow_mut()
            .push(&SourceChange::Remove(event("e9", "z", 1)))
            .unwrap();
        // The operator never saw the add, so the remove has no group.
        let err = op
            .push_source("event", &SourceChange::Remove(event("e9", "z", 1)))
            .unwrap_err();
        assert!(matches!(err, Error::MissingRow { .. }));
    }
}
