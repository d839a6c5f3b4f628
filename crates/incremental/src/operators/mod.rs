//! The operator set.
//!
//! Operator kinds are a tagged variant with a shared behavioral contract
//! dispatched by `OperatorNode`: pull (`fetch`/`cleanup`), push
//! propagation, schema access, and recursive destruction. Operators own
//! their inputs, so each has exactly one downstream consumer by
//! construction; the one exception is a join's child, which is shared
//! behind an `Rc<RefCell<…>>` so emitted nodes can pull child streams
//! lazily.

mod agg;
mod aggregate;
mod concat;
mod distinct;
mod filter;
mod group_by;
mod join;

pub use agg::{Accumulator, AggregateFn, Aggregation};
pub use aggregate::FullAggregate;
pub use concat::Concat;
pub use distinct::Distinct;
pub use filter::{ColumnRef, CompareOp, CompiledPredicate, Filter};
pub use group_by::GroupBy;
pub use join::Join;

use crate::fetch::{FetchMode, FetchRequest};
use crate::source::{Scan, SourceChange};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use rill_core::{Change, Error, Node, Result, TableSchema};

/// Shared handle to an operator, used for join children.
pub type OperatorRef = Rc<RefCell<OperatorNode>>;

/// One node of the dataflow graph.
#[derive(Debug)]
pub enum OperatorNode {
    Scan(Scan),
    Filter(Filter),
    Join(Join),
    GroupBy(GroupBy),
    FullAggregate(FullAggregate),
    Concat(Concat),
    Distinct(Distinct),
}

impl OperatorNode {
    /// Wraps an operator in a shared handle.
    pub fn shared(self) -> OperatorRef {
        Rc::new(RefCell::new(self))
    }

    /// Initial materialization: yields the current result.
    pub fn fetch(&mut self, request: &FetchRequest) -> Vec<Node> {
        self.pull(FetchMode::Fetch, request)
    }

    /// Mirror of a prior fetch that also releases per-constraint state.
    pub fn cleanup(&mut self, request: &FetchRequest) -> Vec<Node> {
        self.pull(FetchMode::Cleanup, request)
    }

    pub(crate) fn pull(&mut self, mode: FetchMode, request: &FetchRequest) -> Vec<Node> {
        match self {
            OperatorNode::Scan(op) => op.pull(request),
            OperatorNode::Filter(op) => op.pull(mode, request),
            OperatorNode::Join(op) => op.pull(mode, request),
            OperatorNode::GroupBy(op) => op.pull(mode, request),
            OperatorNode::FullAggregate(op) => op.pull(mode, request),
            OperatorNode::Concat(op) => op.pull(mode, request),
            OperatorNode::Distinct(op) => op.pull(mode, request),
        }
    }

    /// Routes a source mutation through this subtree, returning the
    /// changes it produces at this level in source insertion order.
    pub fn push_source(&mut self, table: &str, change: &SourceChange) -> Result<Vec<Change>> {
        match self {
            OperatorNode::Scan(op) => Ok(op.push_source(table, change)),
            OperatorNode::Filter(op) => op.push_source(table, change),
            OperatorNode::Join(op) => op.push_source(table, change),
            OperatorNode::GroupBy(op) => op.push_source(table, change),
            OperatorNode::FullAggregate(op) => op.push_source(table, change),
            OperatorNode::Concat(op) => op.push_source(table, change),
            OperatorNode::Distinct(op) => op.push_source(table, change),
        }
    }

    /// Schema of the nodes this operator yields, including relationship
    /// sub-schemas.
    pub fn schema(&self) -> &TableSchema {
        match self {
            OperatorNode::Scan(op) => op.schema(),
            OperatorNode::Filter(op) => op.schema(),
            OperatorNode::Join(op) => op.schema(),
            OperatorNode::GroupBy(op) => op.schema(),
            OperatorNode::FullAggregate(op) => op.schema(),
            OperatorNode::Concat(op) => op.schema(),
            OperatorNode::Distinct(op) => op.schema(),
        }
    }

    /// Releases resources, cascading through inputs.
    pub fn destroy(&mut self) {
        match self {
            OperatorNode::Scan(_) => {}
            OperatorNode::Filter(op) => op.destroy(),
            OperatorNode::Join(op) => op.destroy(),
            OperatorNode::GroupBy(op) => op.destroy(),
            OperatorNode::FullAggregate(op) => op.destroy(),
            OperatorNode::Concat(op) => op.destroy(),
            OperatorNode::Distinct(op) => op.destroy(),
        }
    }

    /// Returns true if `target` appears anywhere in this subtree. Used to
    /// reject joins whose child aliases their parent side.
    pub fn contains(&self, target: &OperatorRef) -> bool {
        match self {
            OperatorNode::Scan(_) => false,
            OperatorNode::Filter(op) => op.input().contains(target),
            OperatorNode::Join(op) => op.contains(target),
            OperatorNode::GroupBy(op) => op.contains(target),
            OperatorNode::FullAggregate(op) => op.contains(target),
            OperatorNode::Concat(op) => op.contains(target),
            OperatorNode::Distinct(op) => op.contains(target),
        }
    }

    /// Duplicates a stateless subtree (scans, filters, concat, distinct)
    /// so OR branches can share one upstream. Stateful operators cannot
    /// be duplicated.
    pub fn duplicate_stateless(&self) -> Result<OperatorNode> {
        match self {
            OperatorNode::Scan(op) => Ok(OperatorNode::Scan(op.duplicate())),
            OperatorNode::Filter(op) => Ok(OperatorNode::Filter(op.duplicate_stateless()?)),
            OperatorNode::Concat(op) => Ok(OperatorNode::Concat(op.duplicate_stateless()?)),
            OperatorNode::Distinct(op) => Ok(OperatorNode::Distinct(op.duplicate_stateless()?)),
            OperatorNode::Join(_) | OperatorNode::GroupBy(_) | OperatorNode::FullAggregate(_) => {
                Err(Error::invariant(
                    "cannot duplicate a stateful operator into an OR branch",
                ))
            }
        }
    }

    /// Returns true if no operator in this subtree holds storage entries.
    pub fn storage_is_empty(&self) -> bool {
        match self {
            OperatorNode::Scan(_) => true,
            OperatorNode::Filter(op) => op.storage_is_empty(),
            OperatorNode::Join(op) => op.storage_is_empty(),
            OperatorNode::GroupBy(op) => op.storage_is_empty(),
            OperatorNode::FullAggregate(op) => op.storage_is_empty(),
            OperatorNode::Concat(op) => op.storage_is_empty(),
            OperatorNode::Distinct(op) => op.storage_is_empty(),
        }
    }
}
