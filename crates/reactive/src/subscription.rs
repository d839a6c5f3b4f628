//! Subscription management for materialized views.

use alloc::boxed::Box;
use alloc::vec::Vec;
use hashbrown::HashMap;
use rill_core::Row;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback invoked with the view's current rows after each delivery.
pub type ViewCallback = Box<dyn Fn(&[Row])>;

/// A subscription to view updates.
pub struct Subscription {
    id: SubscriptionId,
    callback: ViewCallback,
    active: bool,
}

impl Subscription {
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: Fn(&[Row]) + 'static,
    {
        Self {
            id,
            callback: Box::new(callback),
            active: true,
        }
    }

    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn notify(&self, rows: &[Row]) {
        if self.active {
            (self.callback)(rows);
        }
    }
}

/// Tracks the subscriptions of one view.
#[derive(Default)]
pub struct SubscriptionManager {
    subscriptions: HashMap<SubscriptionId, Subscription>,
    next_id: SubscriptionId,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a callback, returning the id used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Row]) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Subscription::new(id, callback));
        id
    }

    /// Removes a subscription. Returns true if it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Notifies every active subscription.
    pub fn notify_all(&self, rows: &[Row]) {
        for subscription in self.subscriptions.values() {
            subscription.notify(rows);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.keys().copied().collect()
    }
}
