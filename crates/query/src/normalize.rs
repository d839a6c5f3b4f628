//! Deterministic AST canonicalization.
//!
//! Semantically equivalent queries must reduce to byte-identical ASTs so
//! pipelines can be shared by fingerprint. Normalization sorts every
//! order-insensitive list, flattens and sorts WHERE trees, collapses
//! degenerate conjunctions, and drops duplicate siblings. `order_by` is
//! semantically significant and untouched. The transform is idempotent.

use crate::ast::{Ast, Condition};
use alloc::string::String;
use alloc::vec::Vec;
use core::cmp::Ordering;
use rill_core::key::value_string;

/// Canonicalizes an AST.
pub fn normalize(mut ast: Ast) -> Ast {
    ast.select.sort_by(|a, b| a.0.cmp(&b.0));
    ast.aggregates.sort_by(|a, b| {
        let a_key = (a.aggregate.name(), a.field.as_deref().unwrap_or("*"));
        let b_key = (b.aggregate.name(), b.field.as_deref().unwrap_or("*"));
        a_key.cmp(&b_key)
    });
    ast.group_by.sort();
    ast.where_clause = ast.where_clause.and_then(normalize_condition);
    ast
}

/// Canonicalizes one condition tree. Returns `None` for conditions that
/// vanish (empty conjunctions).
pub fn normalize_condition(condition: Condition) -> Option<Condition> {
    match condition {
        simple @ Condition::Simple { .. } => Some(simple),
        Condition::Conjunction { op, conditions } => {
            let mut flat: Vec<Condition> = Vec::with_capacity(conditions.len());
            for child in conditions {
                match normalize_condition(child) {
                    None => {}
                    // A conjunction with its parent's operator is inlined.
                    Some(Condition::Conjunction {
                        op: child_op,
                        conditions: grandchildren,
                    }) if child_op == op => flat.extend(grandchildren),
                    Some(other) => flat.push(other),
                }
            }
            flat.sort_by(cmp_condition);
            flat.dedup();
            match flat.len() {
                0 => None,
                // A single-child conjunction is its child, whatever the
                // operator.
                1 => flat.pop(),
                _ => Some(Condition::Conjunction {
                    op,
                    conditions: flat,
                }),
            }
        }
    }
}

/// Total order over normalized conditions: simple conditions before
/// conjunctions; simples by `(field, op, canonical value)`; conjunctions
/// by operator, then member-wise with prefixes first.
pub fn cmp_condition(a: &Condition, b: &Condition) -> Ordering {
    match (a, b) {
        (Condition::Simple { .. }, Condition::Conjunction { .. }) => Ordering::Less,
        (Condition::Conjunction { .. }, Condition::Simple { .. }) => Ordering::Greater,
        (
            Condition::Simple {
                op: a_op,
                field: a_field,
                value: a_value,
            },
            Condition::Simple {
                op: b_op,
                field: b_field,
                value: b_value,
            },
        ) => a_field
            .cmp(b_field)
            .then_with(|| a_op.symbol().cmp(b_op.symbol()))
            .then_with(|| cmp_value_strings(a_value, b_value)),
        (
            Condition::Conjunction {
                op: a_op,
                conditions: a_conditions,
            },
            Condition::Conjunction {
                op: b_op,
                conditions: b_conditions,
            },
        ) => a_op.symbol().cmp(b_op.symbol()).then_with(|| {
            for (x, y) in a_conditions.iter().zip(b_conditions.iter()) {
                let ord = cmp_condition(x, y);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            a_conditions.len().cmp(&b_conditions.len())
        }),
    }
}

fn cmp_value_strings(a: &rill_core::Value, b: &rill_core::Value) -> Ordering {
    let a_string: String = value_string(a);
    let b_string: String = value_string(b);
    a_string.cmp(&b_string)
}
