//! Rill Reactive - subscriber-side materialization.
//!
//! Pipelines push raw `Change` events; this crate turns them into
//! continuously maintained views. `QueryView` applies the query's
//! `select` projection and root `limit`, keeps the hierarchical result
//! sorted, and fans updates out to callback subscriptions.

#![no_std]

extern crate alloc;

mod subscription;
mod view;

pub use subscription::{Subscription, SubscriptionId, SubscriptionManager, ViewCallback};
pub use view::{QueryView, ViewHandle, ViewNode};
