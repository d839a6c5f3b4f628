//! Structural fingerprints for normalized ASTs.
//!
//! Registered queries are deduplicated by a 64-bit FNV-1a hash over the
//! canonical AST. Two queries fingerprint identically iff they normalize
//! to the same form.

use crate::ast::{Ast, Condition};
use crate::normalize::normalize;
use core::hash::Hasher;
use rill_core::key::value_string;

/// FNV-1a, fast and well distributed for short structural encodings.
#[derive(Default)]
pub struct FnvHasher {
    state: u64,
}

impl FnvHasher {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self {
            state: Self::FNV_OFFSET,
        }
    }
}

impl Hasher for FnvHasher {
    fn finish(&self) -> u64 {
        self.state
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state ^= *byte as u64;
            self.state = self.state.wrapping_mul(Self::FNV_PRIME);
        }
    }
}

/// Computes the fingerprint of a query, normalizing first.
pub fn fingerprint(ast: &Ast) -> u64 {
    let normalized = normalize(ast.clone());
    let mut hasher = FnvHasher::new();
    hash_ast(&normalized, &mut hasher);
    hasher.finish()
}

/// Feeds a canonical AST into a hasher. Callers composing larger
/// fingerprints (registration with related queries) reuse this.
pub fn hash_ast<H: Hasher>(ast: &Ast, hasher: &mut H) {
    hasher.write(b"table");
    hasher.write(ast.table.as_bytes());
    if let Some(alias) = &ast.alias {
        hasher.write(b"alias");
        hasher.write(alias.as_bytes());
    }
    for (selector, alias) in &ast.select {
        hasher.write(b"select");
        hasher.write(selector.as_bytes());
        hasher.write(alias.as_bytes());
    }
    for aggregate in &ast.aggregates {
        hasher.write(b"aggregate");
        hasher.write(aggregate.aggregate.name().as_bytes());
        hasher.write(aggregate.field.as_deref().unwrap_or("*").as_bytes());
        hasher.write(aggregate.alias.as_bytes());
    }
    if let Some(condition) = &ast.where_clause {
        hasher.write(b"where");
        hash_condition(condition, hasher);
    }
    for (column, direction) in &ast.order_by {
        hasher.write(b"order");
        hasher.write(column.as_bytes());
        hasher.write(&[*direction as u8]);
    }
    for column in &ast.group_by {
        hasher.write(b"group");
        hasher.write(column.as_bytes());
    }
    if let Some(limit) = ast.limit {
        hasher.write(b"limit");
        hasher.write(&limit.to_le_bytes());
    }
}

fn hash_condition<H: Hasher>(condition: &Condition, hasher: &mut H) {
    match condition {
        Condition::Simple { op, field, value } => {
            hasher.write(b"simple");
            hasher.write(field.as_bytes());
            hasher.write(op.symbol().as_bytes());
            hasher.write(value_string(value).as_bytes());
        }
        Condition::Conjunction { op, conditions } => {
            hasher.write(b"conjunction");
            hasher.write(op.symbol().as_bytes());
            for child in conditions {
                hash_condition(child, hasher);
            }
            hasher.write(b"end");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Direction;
    use alloc::vec;
    use rill_core::Value;

    fn base() -> Ast {
        Ast::table("issue").with_order_by("id", Direction::Asc)
    }

    #[test]
    fn equivalent_queries_share_fingerprints() {
        let a = base().with_where(Condition::and(vec![
            Condition::eq("a", Value::Int(1)),
            Condition::eq("b", Value::Int(2)),
        ]));
        let b = base().with_where(Condition::and(vec![
            Condition::eq("b", Value::Int(2)),
            Condition::and(vec![Condition::eq("a", Value::Int(1))]),
        ]));
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn different_queries_diverge() {
        let a = base().with_where(Condition::eq("a", Value::Int(1)));
        let b = base().with_where(Condition::eq("a", Value::Int(2)));
        let c = base();
        assert_ne!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&c));
    }

    #[test]
    fn order_by_direction_matters() {
        let asc = Ast::table("issue").with_order_by("id", Direction::Asc);
        let desc = Ast::table("issue").with_order_by("id", Direction::Desc);
        assert_ne!(fingerprint(&asc), fingerprint(&desc));
    }

    #[test]
    fn and_or_diverge() {
        let and = base().with_where(Condition::and(vec![
            Condition::eq("a", Value::Int(1)),
            Condition::eq("b", Value::Int(2)),
        ]));
        let or = base().with_where(Condition::or(vec![
            Condition::eq("a", Value::Int(1)),
            Condition::eq("b", Value::Int(2)),
        ]));
        assert_ne!(fingerprint(&and), fingerprint(&or));
    }
}
