//! Fetch requests and constraints.

use rill_core::Value;
use alloc::string::String;

/// Equality constraint narrowing a fetch to rows whose `key` column holds
/// `value`. Joins use this to pull the children of one parent.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub key: String,
    pub value: Value,
}

impl Constraint {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Parameters of a `fetch` or `cleanup` call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchRequest {
    pub constraint: Option<Constraint>,
}

impl FetchRequest {
    /// An unconstrained request.
    pub fn all() -> Self {
        Self::default()
    }

    /// A request constrained to `key = value`.
    pub fn constrained(key: impl Into<String>, value: Value) -> Self {
        Self {
            constraint: Some(Constraint::new(key, value)),
        }
    }

    /// Returns true if `row` satisfies the constraint (or there is none).
    pub fn admits(&self, row: &rill_core::Row) -> bool {
        match &self.constraint {
            None => true,
            Some(c) => row.get_or_null(&c.key) == c.value,
        }
    }
}

/// Whether a pull releases per-constraint state.
///
/// `Cleanup` yields the same node sequence as `Fetch` but tells operators
/// the caller will never re-subscribe on this constraint, so bookkeeping
/// for it can be dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    Fetch,
    Cleanup,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::Row;
    use alloc::vec;

    #[test]
    fn admits_matching_rows() {
        let req = FetchRequest::constrained("owner", Value::Text("u1".into()));
        let hit = Row::from_pairs(vec![("owner", Value::Text("u1".into()))]);
        let miss = Row::from_pairs(vec![("owner", Value::Text("u2".into()))]);
        let absent = Row::from_pairs(vec![("id", Value::Int(1))]);
        assert!(req.admits(&hit));
        assert!(!req.admits(&miss));
        assert!(!req.admits(&absent));
        assert!(FetchRequest::all().admits(&miss));
    }
}
