//! Sorted key-value scratch store.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// A value kept in operator storage. Entries are tiny: a presence flag
/// for join bookkeeping, or a reference count for dedup state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoredValue {
    /// Opaque presence marker.
    Present,
    /// Reference count.
    Count(i64),
}

impl StoredValue {
    /// Returns the count, treating `Present` as 1.
    pub fn count(&self) -> i64 {
        match self {
            StoredValue::Present => 1,
            StoredValue::Count(n) => *n,
        }
    }
}

/// Sorted key-value map with prefix scan, private to one operator.
#[derive(Debug, Default)]
pub struct OperatorStorage {
    entries: BTreeMap<String, StoredValue>,
}

impl OperatorStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key, returning the previous value if any.
    pub fn set(&mut self, key: impl Into<String>, value: StoredValue) -> Option<StoredValue> {
        self.entries.insert(key.into(), value)
    }

    /// Gets a key's value.
    pub fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.get(key).copied()
    }

    /// Deletes a key, returning its value if it was present.
    pub fn del(&mut self, key: &str) -> Option<StoredValue> {
        self.entries.remove(key)
    }

    /// Iterates `(key, value)` pairs whose key starts with `prefix`, in
    /// key order.
    pub fn scan<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, StoredValue)> + 'a {
        self.entries
            .range(String::from(prefix)..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_str(), *v))
    }

    /// Counts entries under a prefix, stopping early at `limit`.
    pub fn scan_count(&self, prefix: &str, limit: usize) -> usize {
        self.scan(prefix).take(limit).count()
    }

    /// Adds `delta` to the count stored at `key`, deleting the entry when
    /// it reaches zero. Returns the new count.
    pub fn add_count(&mut self, key: &str, delta: i64) -> i64 {
        let current = self.get(key).map(|v| v.count()).unwrap_or(0);
        let next = current + delta;
        if next == 0 {
            self.entries.remove(key);
        } else {
            self.entries.insert(String::from(key), StoredValue::Count(next));
        }
        next
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns all keys, for diagnostics and tests.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|k| k.as_str()).collect()
    }
}
