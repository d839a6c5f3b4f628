//! Filter operator and compiled predicates.
//!
//! A filter passes a change through unchanged iff its compiled predicate
//! holds on the row (for add/remove) or on the parent row (for child
//! changes). Filters keep no per-operator state, so OR branches can
//! duplicate whole filter chains freely.

use crate::fetch::{FetchMode, FetchRequest};
use crate::operators::OperatorNode;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use rill_core::{Change, LikePattern, Node, Result, Row, TableSchema, Value};

/// A column reference, optionally qualified by a source alias.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnRef {
    pub source: Option<String>,
    pub column: String,
}

impl ColumnRef {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            source: None,
            column: column.into(),
        }
    }

    pub fn qualified(source: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            column: column.into(),
        }
    }
}

/// Comparison operators backed by the total value order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A compiled row predicate.
#[derive(Clone, Debug)]
pub enum CompiledPredicate {
    /// Value comparison against a literal.
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Value,
    },
    /// Membership test against a literal list.
    InList {
        column: ColumnRef,
        values: Vec<Value>,
        negated: bool,
    },
    /// LIKE / ILIKE pattern match (and negations).
    Like {
        column: ColumnRef,
        pattern: LikePattern,
        negated: bool,
    },
}

impl CompiledPredicate {
    /// Evaluates the predicate against a row.
    pub fn eval(&self, row: &Row) -> bool {
        match self {
            CompiledPredicate::Compare { column, op, value } => {
                let actual = row.get_or_null(&column.column);
                match op {
                    CompareOp::Eq => actual == *value,
                    CompareOp::Ne => actual != *value,
                    CompareOp::Lt => actual < *value,
                    CompareOp::Le => actual <= *value,
                    CompareOp::Gt => actual > *value,
                    CompareOp::Ge => actual >= *value,
                }
            }
            CompiledPredicate::InList {
                column,
                values,
                negated,
            } => {
                let actual = row.get_or_null(&column.column);
                values.contains(&actual) != *negated
            }
            CompiledPredicate::Like {
                column,
                pattern,
                negated,
            } => match row.get_or_null(&column.column) {
                // Non-text values never match a pattern.
                Value::Text(s) => pattern.matches(&s) != *negated,
                _ => *negated,
            },
        }
    }
}

/// The filter operator.
#[derive(Debug)]
pub struct Filter {
    input: Box<OperatorNode>,
    predicate: CompiledPredicate,
}

impl Filter {
    pub fn new(input: OperatorNode, predicate: CompiledPredicate) -> Self {
        Self {
            input: Box::new(input),
            predicate,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        self.input.schema()
    }

    pub fn pull(&mut self, mode: FetchMode, request: &FetchRequest) -> Vec<Node> {
        self.input
            .pull(mode, request)
            .into_iter()
            .filter(|node| self.predicate.eval(&node.row))
            .collect()
    }

    pub fn push_source(
        &mut self,
        table: &str,
        change: &crate::source::SourceChange,
    ) -> Result<Vec<Change>> {
        let incoming = self.input.push_source(table, change)?;
        Ok(incoming
            .into_iter()
            .filter(|change| self.predicate.eval(change.row()))
            .collect())
    }

    pub fn destroy(&mut self) {
        self.input.destroy();
    }

    pub fn input(&self) -> &OperatorNode {
        &self.input
    }

    pub fn duplicate_stateless(&self) -> Result<Filter> {
        Ok(Filter {
            input: Box::new(self.input.duplicate_stateless()?),
            predicate: self.predicate.clone(),
        })
    }

    pub fn storage_is_empty(&self) -> bool {
        self.input.storage_is_empty()
    }
}
