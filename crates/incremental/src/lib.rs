//! Rill Incremental - the dataflow operator core.
//!
//! Compiled queries run as pipelines of incremental operators rooted at
//! shared table sources. Control flow is pull for initial materialization
//! (`fetch`, mirrored later by `cleanup`) and push for maintenance: each
//! upstream row mutation propagates through the graph as differential
//! `Change` events and lands at the pipeline's single `Output`.
//!
//! # Operators
//!
//! - `Scan`: stateless leaf reading one shared `Source`
//! - `Filter`: compiled predicate over one column
//! - `Join`: hierarchical parent/child composition with pKeySet
//!   bookkeeping
//! - `GroupBy`: grouped aggregation with incremental accumulators
//! - `FullAggregate`: whole-table count/sum/avg
//! - `Concat` + `Distinct`: OR-branch union and primary-key dedup
//!
//! # Example
//!
//! ```
//! use rill_core::{text_pk_schema, DataType, Row, Value};
//! use rill_incremental::{
//!     CompareOp, ColumnRef, CompiledPredicate, Filter, OperatorNode,
//!     Pipeline, Scan, Source, SourceChange,
//! };
//!
//! let schema = text_pk_schema(
//!     "issue",
//!     &[("id", DataType::Text), ("points", DataType::Int)],
//!     &["id"],
//! )
//! .unwrap();
//! let source = Source::handle(schema);
//!
//! let filter = Filter::new(
//!     OperatorNode::Scan(Scan::new(&source)),
//!     CompiledPredicate::Compare {
//!         column: ColumnRef::new("points"),
//!         op: CompareOp::Gt,
//!         value: Value::Int(2),
//!     },
//! );
//! let mut pipeline = Pipeline::new(OperatorNode::Filter(filter));
//!
//! let row = Row::from_pairs([("id", Value::Text("i1".into())), ("points", Value::Int(5))]);
//! let change = SourceChange::Add(row);
//! source.borrow_mut().push(&change).unwrap();
//! pipeline.push_source("issue", &change).unwrap();
//! assert_eq!(pipeline.fetch().len(), 1);
//! ```

#![no_std]

extern crate alloc;

mod fetch;
pub mod operators;
mod output;
mod pipeline;
mod source;

pub use fetch::{Constraint, FetchMode, FetchRequest};
pub use operators::{
    Accumulator, AggregateFn, Aggregation, ColumnRef, CompareOp, CompiledPredicate, Concat,
    Distinct, Filter, FullAggregate, GroupBy, Join, OperatorNode, OperatorRef,
};
pub use output::{CollectingOutput, Output};
pub use pipeline::Pipeline;
pub use source::{Scan, Source, SourceChange, SourceHandle};
