//! Rill Engine - query registration and pipeline compilation.
//!
//! The engine owns the per-replica sources, compiles registered queries
//! into incremental pipelines (deduplicated by canonical fingerprint),
//! and drives the replication inbound path: every row event mutates its
//! source, then propagates through each live pipeline to its subscriber.
//!
//! # Example
//!
//! ```
//! use rill_core::{text_pk_schema, DataType, Row, Value};
//! use rill_engine::{QueryEngine, RowEvent};
//! use rill_query::{Ast, Condition, Direction};
//!
//! let mut engine = QueryEngine::new();
//! engine
//!     .create_source(
//!         text_pk_schema(
//!             "issue",
//!             &[("id", DataType::Text), ("points", DataType::Int)],
//!             &["id"],
//!         )
//!         .unwrap(),
//!     )
//!     .unwrap();
//!
//! let query = Ast::table("issue")
//!     .with_where(Condition::eq("points", Value::Int(3)))
//!     .with_order_by("id", Direction::Asc);
//! let id = engine.register(query).unwrap();
//! let view = engine.subscribe_view(id).unwrap();
//!
//! let row = Row::from_pairs([("id", Value::Text("i1".into())), ("points", Value::Int(3))]);
//! engine.apply("issue", RowEvent::Insert(row)).unwrap();
//! assert_eq!(view.borrow().len(), 1);
//! ```

#![no_std]

extern crate alloc;

mod builder;
mod engine;
mod resolver;

pub use builder::{build_pipeline, build_related_pipeline, Related};
pub use engine::{QueryEngine, QueryId, RowEvent};
pub use resolver::{SourceMap, SourceResolver};
