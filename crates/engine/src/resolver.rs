//! Source resolution.

use alloc::string::String;
use hashbrown::HashMap;
use rill_incremental::SourceHandle;

/// Maps table names to sources for the pipeline builder.
pub trait SourceResolver {
    fn resolve(&self, table: &str) -> Option<SourceHandle>;
}

/// A plain table → source map.
#[derive(Default)]
pub struct SourceMap {
    sources: HashMap<String, SourceHandle>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under its schema name. Returns the previous
    /// source if one existed.
    pub fn insert(&mut self, source: SourceHandle) -> Option<SourceHandle> {
        let name = String::from(source.borrow().name());
        self.sources.insert(name, source)
    }

    pub fn get(&self, table: &str) -> Option<&SourceHandle> {
        self.sources.get(table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.sources.contains_key(table)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl SourceResolver for SourceMap {
    fn resolve(&self, table: &str) -> Option<SourceHandle> {
        self.sources.get(table).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::{text_pk_schema, DataType};
    use rill_incremental::Source;

    #[test]
    fn resolves_registered_tables() {
        let mut map = SourceMap::new();
        let schema = text_pk_schema("issue", &[("id", DataType::Text)], &["id"]).unwrap();
        map.insert(Source::handle(schema));
        assert!(map.resolve("issue").is_some());
        assert!(map.resolve("comment").is_none());
        assert!(map.contains("issue"));
        assert_eq!(map.len(), 1);
    }
}
