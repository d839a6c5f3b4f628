//! Row structure for the Rill data model.
//!
//! A row is a mapping from column name to value. The map is ordered so
//! that iteration, equality, and encodings are deterministic regardless of
//! insertion order.

use crate::error::{Error, Result};
use crate::key;
use crate::value::Value;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// A row in a replicated table or an operator's output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    values: BTreeMap<String, Value>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a row from `(column, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Gets the value of a column, if present.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Gets the value of a column, treating absence as `Null`.
    pub fn get_or_null(&self, column: &str) -> Value {
        self.values.get(column).cloned().unwrap_or(Value::Null)
    }

    /// Sets a column value, returning the previous value if any.
    pub fn set(&mut self, column: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(column.into(), value)
    }

    /// Returns true if the row has a value for the column.
    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Merges the columns of `other` into this row, overwriting collisions.
    pub fn merge(&mut self, other: &Row) {
        for (k, v) in other.iter() {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// Returns a copy of this row with `other` merged in.
    pub fn merged(&self, other: &Row) -> Row {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Iterates over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Returns the number of columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the row has no columns.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Extracts the primary-key tuple for the given key columns.
    ///
    /// Fails if a key column is absent or null; every row accepted by a
    /// source satisfies this, so downstream operators may rely on it.
    pub fn key(&self, key_columns: &[String]) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(key_columns.len());
        for column in key_columns {
            match self.values.get(column) {
                None => {
                    return Err(Error::MissingPrimaryKey {
                        column: column.clone(),
                    })
                }
                Some(Value::Null) => {
                    return Err(Error::NullPrimaryKey {
                        column: column.clone(),
                    })
                }
                Some(v) => out.push(v.clone()),
            }
        }
        Ok(out)
    }

    /// Canonical string encoding of the primary-key tuple.
    pub fn key_string(&self, key_columns: &[String]) -> Result<String> {
        Ok(key::tuple_string(&self.key(key_columns)?))
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        Row::from_pairs(iter)
    }
}
