//! Full-table aggregate operator.
//!
//! Used when a query carries aggregations without `groupBy`. The output
//! is always exactly one synthetic row, identified by `id = 0`, holding
//! `{alias: value}` for each aggregation. Only `count`, `sum`, and `avg`
//! are supported here; order-dependent aggregates are rejected when the
//! pipeline is built.

use crate::fetch::{FetchMode, FetchRequest};
use crate::operators::agg::{Accumulator, AggregateFn, Aggregation};
use crate::operators::OperatorNode;
use crate::source::SourceChange;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use rill_core::{Change, DataType, Error, Node, Result, Row, TableSchema, Value};

#[derive(Debug)]
pub struct FullAggregate {
    input: Box<OperatorNode>,
    aggregations: Vec<Aggregation>,
    accumulators: Vec<Accumulator>,
    schema: TableSchema,
}

impl FullAggregate {
    pub fn new(input: OperatorNode, aggregations: Vec<Aggregation>) -> Result<Self> {
        let input_schema = input.schema();
        let mut builder = TableSchema::builder(input_schema.name()).column("id", DataType::Int);
        for aggregation in &aggregations {
            match aggregation.aggregate {
                AggregateFn::Count | AggregateFn::Sum | AggregateFn::Avg => {}
                other => {
                    return Err(Error::unsupported_aggregate(
                        other.name(),
                        "full-table aggregate",
                    ))
                }
            }
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
            builder = builder.column(
                aggregation.alias.clone(),
                aggregation.output_type(field_type),
            );
        }
        let schema = builder.primary_key(["id"]).build()?;
        let accumulators = aggregations.iter().map(Accumulator::new).collect();
        Ok(Self {
            input: Box::new(input),
            aggregations,
            accumulators,
            schema,
        })
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn member_key(&self, row: &Row) -> String {
        let values: Vec<Value> = self
            .input
            .schema()
            .primary_key()
            .iter()
            .map(|col| row.get_or_null(col))
            .collect();
        rill_core::key::tuple_string(&values)
    }

    fn reset(&mut self) {
        self.accumulators = self.aggregations.iter().map(Accumulator::new).collect();
    }

    fn synthetic_row(&self) -> Row {
        let mut row = Row::new();
        row.set("id", Value::Int(0));
        for (accumulator, aggregation) in self.accumulators.iter().zip(&self.aggregations) {
            row.set(aggregation.alias.clone(), accumulator.value());
        }
        row
    }

    pub fn pull(&mut self, mode: FetchMode, request: &FetchRequest) -> Vec<Node> {
        self.reset();
        for node in self.input.pull(mode, &FetchRequest::all()) {
            let member_key = self.member_key(&node.row);
            for (accumulator, aggregation) in
                self.accumulators.iter_mut().zip(&self.aggregations)
            {
                accumulator.apply(aggregation, &member_key, &node.row, 1);
            }
        }
        let row = self.synthetic_row();
        if mode == FetchMode::Cleanup {
            self.reset();
        }
        if request.admits(&row) {
            alloc::vec![Node::new(row)]
        } else {
            Vec::new()
        }
    }

    pub fn push_source(&mut self, table: &str, change: &SourceChange) -> Result<Vec<Change>> {
        let mut out = Vec::new();
        for input_change in self.input.push_source(table, change)? {
            let before = self.synthetic_row();
            let (row, sign) = match &input_change {
                Change::Add { node } => (&node.row, 1),
                Change::Remove { node } => (&node.row, -1),
                Change::Child { .. } => {
                    return Err(Error::invariant(
                        "child change reached a full-table aggregate",
                    ))
                }
            };
            let member_key = self.member_key(row);
            for (accumulator, aggregation) in
                self.accumulators.iter_mut().zip(&self.aggregations)
            {
                accumulator.apply(aggregation, &member_key, row, sign);
            }
            let after = self.synthetic_row();
            if before != after {
                out.push(Change::remove(Node::new(before)));
                out.push(Change::add(Node::new(after)));
            }
        }
        Ok(out)
    }

    pub fn destroy(&mut self) {
        self.reset();
        self.input.destroy();
    }

    pub fn contains(&self, target: &crate::operators::OperatorRef) -> bool {
        self.input.contains(target)
    }

    pub fn storage_is_empty(&self) -> bool {
        self.input.storage_is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Scan, Source, SourceChange, SourceHandle};
    use alloc::string::ToString;
    use alloc::vec;
    use rill_core::{text_pk_schema, DataType};

    fn event_source() -> SourceHandle {
        let schema = text_pk_schema(
            "event",
            &[("id", DataType::Text), ("v", DataType::Int)],
            &["id"],
        )
        .unwrap();
        Source::handle(schema)
    }

    fn event(id: &str, v: i64) -> Row {
        Row::from_pairs(vec![
            ("id", Value::Text(id.into())),
            ("v", Value::Int(v)),
        ])
    }

    fn aggregate(source: &SourceHandle) -> FullAggregate {
        FullAggregate::new(
            OperatorNode::Scan(Scan::new(source)),
            vec![
                Aggregation::new(AggregateFn::Count, None, "count"),
                Aggregation::new(AggregateFn::Sum, Some("v".to_string()), "total"),
                Aggregation::new(AggregateFn::Avg, Some("v".to_string()), "mean"),
            ],
        )
        .unwrap()
    }

    fn apply(op: &mut FullAggregate, source: &SourceHandle, change: SourceChange) -> Vec<Change> {
        source.borrow_mut().push(&change).unwrap();
        op.push_source("event", &change).unwrap()
    }

    #[test]
    fn empty_table_yields_one_zero_row() {
        let source = event_source();
        let mut op = aggregate(&source);
        let nodes = op.pull(FetchMode::Fetch, &FetchRequest::all());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].row.get_or_null("id"), Value::Int(0));
        assert_eq!(nodes[0].row.get_or_null("count"), Value::Int(0));
        assert_eq!(nodes[0].row.get_or_null("total"), Value::Int(0));
        assert_eq!(nodes[0].row.get_or_null("mean"), Value::Null);
    }

    #[test]
    fn pushes_replace_the_synthetic_row() {
        let source = event_source();
        let mut op = aggregate(&source);

        let out = apply(&mut op, &source, SourceChange::Add(event("e1", 4)));
        assert_eq!(out.len(), 2);
        assert!(out[0].is_remove());
        assert!(out[1].is_add());
        assert_eq!(out[1].row().get_or_null("count"), Value::Int(1));
        assert_eq!(out[1].row().get_or_null("total"), Value::Int(4));

        let out = apply(&mut op, &source, SourceChange::Add(event("e2", 2)));
        assert_eq!(out[1].row().get_or_null("count"), Value::Int(2));
        assert_eq!(out[1].row().get_or_null("total"), Value::Int(6));
        assert_eq!(out[1].row().get_or_null("mean"), Value::Float(3.0));

        let out = apply(&mut op, &source, SourceChange::Remove(event("e1", 4)));
        assert_eq!(out[1].row().get_or_null("total"), Value::Int(2));
    }

    #[test]
    fn rejects_order_dependent_aggregates() {
        let source = event_source();
        let err = FullAggregate::new(
            OperatorNode::Scan(Scan::new(&source)),
            vec![Aggregation::new(AggregateFn::Max, Some("v".to_string()), "most")],
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedAggregate { .. }));
    }

    #[test]
    fn fetch_reflects_current_rows() {
        let source = event_source();
        let mut op = aggregate(&source);
        for row in [event("e1", 1), event("e2", 2), event("e3", 3)] {
            source.borrow_mut().push(&SourceChange::Add(row)).unwrap();
        }
        let nodes = op.pull(FetchMode::Fetch, &FetchRequest::all());
        assert_eq!(nodes[0].row.get_or_null("count"), Value::Int(3));
        assert_eq!(nodes[0].row.get_or_null("total"), Value::Int(6));
        assert_eq!(nodes[0].row.get_or_null("mean"), Value::Float(2.0));
    }
}
