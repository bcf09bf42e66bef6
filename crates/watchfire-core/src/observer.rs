//! Observer registry and the subscription handle it hands out.
//!
//! The notification contract is "depend, then invalidate": a subscription
//! becomes eligible for the next change notification when its owner calls
//! [`Subscription::read`], receives at most one pending notification per
//! arming, and must read again to re-arm. Fan-out is synchronous with the
//! mutation that triggered it and never blocks the mutating path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use uuid::Uuid;

use crate::region::BeaconSnapshot;

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

struct ObserverEntry {
    id: SubscriptionId,
    armed: Arc<AtomicBool>,
    tx: Sender<()>,
}

/// Tracks subscriptions and fires their pending-notification tokens.
pub(crate) struct ObserverRegistry {
    entries: Mutex<Vec<ObserverEntry>>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register a new subscriber, initially unarmed.
    pub(crate) fn register(&self) -> (SubscriptionId, Arc<AtomicBool>, Receiver<()>) {
        let id = SubscriptionId::new();
        let armed = Arc::new(AtomicBool::new(false));
        // Capacity 1: only "needs re-evaluation" is meaningful, never a count.
        let (tx, rx) = mpsc::channel(1);

        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.push(ObserverEntry {
            id,
            armed: Arc::clone(&armed),
            tx,
        });

        (id, armed, rx)
    }

    pub(crate) fn unregister(&self, id: SubscriptionId) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.retain(|entry| entry.id != id);
    }

    /// Fire every armed subscription exactly once and disarm it.
    ///
    /// Called after the new snapshot is installed, so a subscriber that
    /// re-reads immediately observes the value that caused the notification.
    /// Subscribers whose receiving half is gone are pruned here.
    pub(crate) fn notify_armed(&self) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.retain(|entry| {
            if !entry.armed.swap(false, Ordering::AcqRel) {
                return !entry.tx.is_closed();
            }
            match entry.tx.try_send(()) {
                // Full means a prior notification is still pending, which is
                // exactly the at-most-one-pending contract.
                Ok(()) | Err(TrySendError::Full(())) => true,
                Err(TrySendError::Closed(())) => false,
            }
        });
    }

    /// Drop every entry, closing the notification channels.
    ///
    /// Called when the owning store is torn down so subscribers blocked in
    /// [`Subscription::changed`] observe the shutdown instead of waiting
    /// forever.
    pub(crate) fn clear(&self) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// A live interest in one store's snapshot changes.
///
/// Obtained from [`RegionStore::subscribe`](crate::store::RegionStore::subscribe).
/// Call [`read`](Self::read) to get the current snapshot and arm the handle
/// for the next change, then await [`changed`](Self::changed). Dropping the
/// handle unregisters it.
pub struct Subscription {
    id: SubscriptionId,
    armed: Arc<AtomicBool>,
    rx: Receiver<()>,
    registry: Arc<ObserverRegistry>,
    snapshot: Arc<RwLock<Arc<BeaconSnapshot>>>,
}

impl Subscription {
    pub(crate) fn new(
        registry: Arc<ObserverRegistry>,
        snapshot: Arc<RwLock<Arc<BeaconSnapshot>>>,
    ) -> Self {
        let (id, armed, rx) = registry.register();
        Self {
            id,
            armed,
            rx,
            registry,
            snapshot,
        }
    }

    /// The id backing this subscription.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Return the current snapshot and arm this subscription for the next
    /// accepted change.
    ///
    /// Arming is not retroactive: changes that happened before this call are
    /// not replayed.
    #[must_use]
    pub fn read(&self) -> Arc<BeaconSnapshot> {
        self.armed.store(true, Ordering::Release);
        let guard = self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Wait until the next change notification.
    ///
    /// Returns `true` when a notification arrived, `false` when the owning
    /// store has been torn down. The handle is disarmed afterwards; call
    /// [`read`](Self::read) to re-arm.
    pub async fn changed(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Consume a pending notification without waiting.
    ///
    /// Returns `true` when a notification was pending.
    pub fn try_changed(&mut self) -> bool {
        matches!(self.rx.try_recv(), Ok(()))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Arc<ObserverRegistry>, Arc<RwLock<Arc<BeaconSnapshot>>>) {
        (
            Arc::new(ObserverRegistry::new()),
            Arc::new(RwLock::new(Arc::new(BeaconSnapshot::default()))),
        )
    }

    #[test]
    fn test_unarmed_subscription_is_not_notified() {
        let (registry, snapshot) = fixture();
        let mut sub = Subscription::new(Arc::clone(&registry), snapshot);

        registry.notify_armed();
        assert!(!sub.try_changed());
    }

    #[test]
    fn test_read_arms_for_exactly_one_notification() {
        let (registry, snapshot) = fixture();
        let mut sub = Subscription::new(Arc::clone(&registry), snapshot);

        let _ = sub.read();
        registry.notify_armed();
        assert!(sub.try_changed());

        // Not re-armed: a second change is silent until the next read.
        registry.notify_armed();
        assert!(!sub.try_changed());
    }

    #[test]
    fn test_rearming_without_consuming_keeps_one_pending() {
        let (registry, snapshot) = fixture();
        let mut sub = Subscription::new(Arc::clone(&registry), snapshot);

        let _ = sub.read();
        registry.notify_armed();
        let _ = sub.read();
        registry.notify_armed();

        assert!(sub.try_changed());
        assert!(!sub.try_changed());
    }

    #[test]
    fn test_all_armed_subscribers_are_notified() {
        let (registry, snapshot) = fixture();
        let mut first = Subscription::new(Arc::clone(&registry), Arc::clone(&snapshot));
        let mut second = Subscription::new(Arc::clone(&registry), snapshot);

        let _ = first.read();
        let _ = second.read();
        registry.notify_armed();

        assert!(first.try_changed());
        assert!(second.try_changed());
    }

    #[test]
    fn test_drop_unregisters() {
        let (registry, snapshot) = fixture();
        let sub = Subscription::new(Arc::clone(&registry), snapshot);
        assert_eq!(registry.len(), 1);
        drop(sub);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_subscription_ids_are_unique() {
        let (registry, snapshot) = fixture();
        let first = Subscription::new(Arc::clone(&registry), Arc::clone(&snapshot));
        let second = Subscription::new(registry, snapshot);
        assert_ne!(first.id(), second.id());
    }
}
