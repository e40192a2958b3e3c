//! Observer registry for stream updates.
//!
//! Listeners are invoked synchronously with `(state, latest_snapshot)`. The
//! registry copies the listener list before dispatch, so a listener may
//! unsubscribe itself or another listener from inside its callback.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::connection::ConnectionState;

use super::snapshot::MetricsSnapshot;

/// Callback signature for stream listeners.
pub type Listener = dyn Fn(ConnectionState, Option<&MetricsSnapshot>) + Send + Sync;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone)]
struct Entry {
    id: SubscriptionId,
    listener: Arc<Listener>,
    active: Arc<AtomicBool>,
}

type Entries = Mutex<Vec<Entry>>;

/// Set of registered listeners.
#[derive(Clone, Default)]
pub struct SubscriberRegistry {
    entries: Arc<Entries>,
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl SubscriberRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` and returns the handle that removes it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(ConnectionState, Option<&MetricsSnapshot>) + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let active = Arc::new(AtomicBool::new(true));
        let entry = Entry {
            id,
            listener: Arc::new(listener),
            active: Arc::clone(&active),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);

        Subscription {
            id,
            entries: Arc::downgrade(&self.entries),
            active,
            detached: false,
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True if nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers one update to every listener that is still subscribed.
    ///
    /// Returns the number of listeners invoked.
    pub fn notify(&self, state: ConnectionState, snapshot: Option<&MetricsSnapshot>) -> usize {
        let snapshot_of_entries: Vec<Entry> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0;
        for entry in &snapshot_of_entries {
            // Skip listeners removed earlier in this same dispatch.
            if !entry.active.load(Ordering::Acquire) {
                continue;
            }
            (entry.listener)(state, snapshot);
            delivered += 1;
        }
        delivered
    }
}

/// Handle for one registered listener.
///
/// Dropping the handle unsubscribes, unless [`Subscription::detach`] was
/// called.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: SubscriptionId,
    entries: Weak<Entries>,
    active: Arc<AtomicBool>,
    detached: bool,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// The id backing this subscription.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// True until the listener is removed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Removes the listener. Idempotent; safe to call from inside a callback.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(entries) = self.entries.upgrade() {
            entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|e| e.id != self.id);
        }
    }

    /// Keeps the listener registered for the lifetime of the registry.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting(count: &Arc<AtomicUsize>) -> impl Fn(ConnectionState, Option<&MetricsSnapshot>) + Send + Sync {
        let c = Arc::clone(count);
        move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn(ConnectionState, Option<&MetricsSnapshot>) + Send + Sync) {
        let count = Arc::new(AtomicUsize::new(0));
        let f = counting(&count);
        (count, f)
    }

    #[test]
    fn every_listener_sees_each_update_once() {
        let registry = SubscriberRegistry::new();
        let (a, fa) = counter();
        let (b, fb) = counter();
        let _sa = registry.subscribe(fa);
        let _sb = registry.subscribe(fb);

        assert_eq!(registry.notify(ConnectionState::Connecting, None), 2);
        assert_eq!(registry.notify(ConnectionState::Connected, None), 2);
        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (count, f) = counter();
        let sub = registry.subscribe(f);
        sub.unsubscribe();
        sub.unsubscribe();
        assert!(!sub.is_active());
        assert!(registry.is_empty());
        registry.notify(ConnectionState::Error, None);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn drop_unsubscribes_unless_detached() {
        let registry = SubscriberRegistry::new();
        let (_, f) = counter();
        drop(registry.subscribe(f));
        assert!(registry.is_empty());

        let (count, f) = counter();
        registry.subscribe(f).detach();
        assert_eq!(registry.len(), 1);
        registry.notify(ConnectionState::Connected, None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_can_unsubscribe_itself_during_callback() {
        let registry = SubscriberRegistry::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let self_calls = Arc::new(AtomicUsize::new(0));

        let slot_in = Arc::clone(&slot);
        let calls_in = Arc::clone(&self_calls);
        let sub = registry.subscribe(move |_, _| {
            calls_in.fetch_add(1, Ordering::SeqCst);
            if let Some(s) = slot_in.lock().unwrap().take() {
                s.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        let (other, f) = counter();
        let _other_sub = registry.subscribe(f);

        assert_eq!(registry.notify(ConnectionState::Connecting, None), 2);
        assert_eq!(registry.notify(ConnectionState::Connected, None), 1);
        assert_eq!(self_calls.load(Ordering::SeqCst), 1);
        assert_eq!(other.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn listener_can_unsubscribe_a_later_listener_mid_dispatch() {
        let registry = SubscriberRegistry::new();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let victim_in = Arc::clone(&victim);
        let _a = registry.subscribe(move |_, _| {
            if let Some(s) = victim_in.lock().unwrap().take() {
                s.unsubscribe();
            }
        });
        let (b, fb) = counter();
        let _b = registry.subscribe(fb);
        let (c, fc) = counter();
        *victim.lock().unwrap() = Some(registry.subscribe(fc));

        assert_eq!(registry.notify(ConnectionState::Connecting, None), 2);
        assert_eq!(b.load(Ordering::SeqCst), 1);
        assert_eq!(c.load(Ordering::SeqCst), 0);

        assert_eq!(registry.notify(ConnectionState::Connected, None), 2);
        assert_eq!(registry.notify(ConnectionState::Error, None), 2);
        assert_eq!(b.load(Ordering::SeqCst), 3);
        assert_eq!(c.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn handle_outliving_registry_is_harmless() {
        let registry = SubscriberRegistry::new();
        let (_, f) = counter();
        let sub = registry.subscribe(f);
        drop(registry);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
