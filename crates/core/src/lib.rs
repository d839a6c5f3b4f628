//! Rill Core - data model for the Rill incremental query engine.
//!
//! This crate provides the foundational types shared by every part of the
//! engine:
//!
//! - `Value`: the primitive value domain rows are made of
//! - `Row`: a column-name → value mapping
//! - `TableSchema`: typed columns plus a non-empty primary key
//! - `Node` / `NodeStream`: hierarchical output units with one-shot
//!   relationship streams
//! - `Change`: differential events (add / remove / nested child change)
//! - `LikePattern`: LIKE/ILIKE compilation to an anchored pattern subset
//! - `key`: the canonical value encoding used for storage and group keys
//! - `Error`: error types with configuration/schema/invariant kinds
//!
//! # Example
//!
//! ```
//! use rill_core::{Row, TableSchema, Value, DataType};
//!
//! let schema = TableSchema::builder("issue")
//!     .column("id", DataType::Text)
//!     .column("points", DataType::Int)
//!     .primary_key(["id"])
//!     .build()
//!     .unwrap();
//!
//! let row = Row::from_pairs([
//!     ("id", Value::Text("i1".into())),
//!     ("points", Value::Int(3)),
//! ]);
//! assert_eq!(row.key(schema.primary_key()).unwrap(), vec![Value::Text("i1".into())]);
//! ```

#![no_std]

extern crate alloc;

mod change;
mod error;
pub mod key;
mod node;
mod pattern;
mod row;
mod schema;
mod types;
mod value;

pub use change::{Change, ChildChange};
pub use error::{Error, ErrorKind, Result};
pub use node::{external_relationship_name, Node, NodeStream, StreamFn};
pub use pattern::LikePattern;
pub use row::Row;
pub use schema::{text_pk_schema, Column, SchemaBuilder, TableSchema, RESERVED_COLUMN, RESERVED_SCHEMA};
pub use types::DataType;
pub use value::Value;
