//! Rill Storage - per-operator scratch storage.
//!
//! Stateful operators (joins, distinct) keep small bookkeeping entries in
//! a sorted key-value store with prefix scans. Each operator instance owns
//! its own store, so namespaces are disjoint by construction; the engine
//! inspects stores only to assert that a subscribe/unsubscribe round trip
//! left them empty.

#![no_std]

extern crate alloc;

mod store;

pub use store::{OperatorStorage, StoredValue};
