//! Table schemas for sources and operator outputs.
//!
//! Replication hands the engine one schema per table: column types plus a
//! non-empty primary key. Join operators extend schemas with named
//! relationship sub-schemas describing their hierarchical output.

use crate::error::{Error, Result};
use crate::types::DataType;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// Column name every replicated table reserves for version bookkeeping;
/// upstream schemas must not declare it.
pub const RESERVED_COLUMN: &str = "_0_version";

/// Schema name reserved for the sync engine's own metadata tables.
pub const RESERVED_SCHEMA: &str = "_zero";

/// A typed column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Schema of the rows produced by a source or an operator, including the
/// schemas of nested relationships added by joins.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    relationships: Vec<(String, TableSchema)>,
}

impl TableSchema {
    /// Starts building a schema for the named table.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    /// Returns the table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared columns.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the primary-key column names, in key order.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    /// Returns the named relationship sub-schemas.
    pub fn relationships(&self) -> &[(String, TableSchema)] {
        &self.relationships
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if the schema declares the column.
    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns a copy of this schema with a relationship appended.
    pub fn with_relationship(&self, name: impl Into<String>, child: TableSchema) -> TableSchema {
        let mut out = self.clone();
        out.relationships.push((name.into(), child));
        out
    }

    /// Returns a copy of this schema with extra columns appended, as
    /// produced by aggregation aliases.
    pub fn with_columns(&self, extra: Vec<Column>) -> TableSchema {
        let mut out = self.clone();
        out.columns.extend(extra);
        out
    }

}

/// Builder validating schema construction.
pub struct SchemaBuilder {
    name: String,
    columns: Vec<Column>,
    primary_key: Vec<String>,
}

impl SchemaBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
        }
    }

    /// Adds a column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(name, data_type));
        self
    }

    /// Declares the primary key.
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Validates and builds the schema.
    pub fn build(self) -> Result<TableSchema> {
        if self.name == RESERVED_SCHEMA {
            return Err(Error::invalid_schema("schema name _zero is reserved"));
        }
        if self.columns.is_empty() {
            return Err(Error::invalid_schema("table has no columns"));
        }
        for (i, col) in self.columns.iter().enumerate() {
            if col.name == RESERVED_COLUMN {
                return Err(Error::invalid_schema("column name _0_version is reserved"));
            }
            if !col.data_type.is_storable() {
                return Err(Error::invalid_schema("array is not a storable column type"));
            }
            if self.columns[..i].iter().any(|c| c.name == col.name) {
                let mut msg = String::from("duplicate column ");
                msg.push_str(&col.name);
                return Err(Error::InvalidSchema { message: msg });
            }
        }
        if self.primary_key.is_empty() {
            return Err(Error::invalid_schema("primary key must be non-empty"));
        }
        for key in &self.primary_key {
            if !self.columns.iter().any(|c| &c.name == key) {
                let mut msg = String::from("primary-key column not declared: ");
                msg.push_str(key);
                return Err(Error::InvalidSchema { message: msg });
            }
        }
        Ok(TableSchema {
            name: self.name,
            columns: self.columns,
            primary_key: self.primary_key,
            relationships: Vec::new(),
        })
    }
}

/// Convenience constructor for the common text-keyed test tables.
pub fn text_pk_schema(name: &str, columns: &[(&str, DataType)], pk: &[&str]) -> Result<TableSchema> {
    let mut builder = TableSchema::builder(name);
    for (col, ty) in columns {
        builder = builder.column(*col, *ty);
    }
    builder.primary_key(pk.iter().map(|s| s.to_string())).build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issues() -> TableSchema {
        TableSchema::builder("issue")
            .column("id", DataType::Text)
            .column("owner", DataType::Text)
            .column("points", DataType::Int)
            .primary_key(["id"])
            .build()
            .unwrap()
    }

    #[test]
    fn build_and_lookup() {
        let schema = issues();
        assert_eq!(schema.name(), "issue");
        assert!(schema.has_column("owner"));
        assert!(!schema.has_column("priority"));
        assert_eq!(schema.primary_key(), &["id".to_string()]);
    }

    #[test]
    fn rejects_empty_primary_key() {
        let err = TableSchema::builder("t")
            .column("a", DataType::Int)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn rejects_unknown_primary_key() {
        let err = TableSchema::builder("t")
            .column("a", DataType::Int)
            .primary_key(["b"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn rejects_reserved_names() {
        let err = TableSchema::builder("t")
            .column(RESERVED_COLUMN, DataType::Int)
            .primary_key([RESERVED_COLUMN])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));

        let err = TableSchema::builder(RESERVED_SCHEMA)
            .column("a", DataType::Int)
            .primary_key(["a"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = TableSchema::builder("t")
            .column("a", DataType::Int)
            .column("a", DataType::Text)
            .primary_key(["a"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema { .. }));
    }

    #[test]
    fn relationship_extension() {
        let parent = issues();
        let child = TableSchema::builder("comment")
            .column("id", DataType::Text)
            .column("issue_id", DataType::Text)
            .primary_key(["id"])
            .build()
            .unwrap();
        let joined = parent.with_relationship("comments", child);
        assert_eq!(joined.relationships().len(), 1);
        assert_eq!(joined.relationships()[0].0, "comments");
    }
}
