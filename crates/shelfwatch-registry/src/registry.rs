//! In-memory subscription registry behind one reader/writer lock.
//!
//! Reads proceed concurrently; writes are exclusive. Every mutation
//! persists a full snapshot AFTER releasing the lock, so a slow disk never
//! blocks lock holders for longer than the snapshot copy.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use shelfwatch_core::traits::SubscriberSource;
use shelfwatch_core::types::{
    ManualCheckOutcome, NotificationFrequency, SubscribeOutcome, Subscription, UnsubscribeOutcome,
};

use crate::store::SubscriptionStore;

/// Owned registry object; all locking is encapsulated here.
pub struct SubscriptionRegistry {
    inner: RwLock<BTreeMap<i64, Subscription>>,
    store: SubscriptionStore,
}

impl SubscriptionRegistry {
    /// Load persisted state before serving any request.
    pub fn load(store: SubscriptionStore) -> Self {
        let subscriptions = store.load();
        let total_items: usize = subscriptions.values().map(|s| s.items.len()).sum();
        tracing::info!(
            "Loaded {} recipients with {} subscriptions",
            subscriptions.len(),
            total_items
        );
        Self {
            inner: RwLock::new(subscriptions),
            store,
        }
    }

    /// Run a mutation under the write lock, snapshot the map, release the
    /// lock, then persist the snapshot.
    fn mutate<R>(&self, f: impl FnOnce(&mut BTreeMap<i64, Subscription>) -> (R, bool)) -> R {
        let (result, snapshot) = {
            let mut map = self.inner.write().expect("registry lock poisoned");
            let (result, changed) = f(&mut map);
            (result, changed.then(|| map.clone()))
        };
        if let Some(snapshot) = snapshot
            && let Err(e) = self.store.save(&snapshot)
        {
            // In-memory state stays authoritative until the next good write.
            tracing::warn!("Failed to persist subscriptions: {e}");
        }
        result
    }

    /// Upsert the recipient's store/locale preference.
    pub fn set_location(&self, recipient: i64, display_name: &str, code: &str) {
        let now = Utc::now();
        self.mutate(|map| {
            let sub = map
                .entry(recipient)
                .or_insert_with(|| Subscription::new(recipient, display_name, now));
            sub.store_code = Some(code.to_string());
            if sub.frequency.is_none() {
                sub.frequency = Some(NotificationFrequency::Every30Minutes);
            }
            sub.updated_at = now;
            ((), true)
        });
    }

    /// Subscribe the recipient to an item. Requires a store/locale to be
    /// set first; availability and delivery are locale-dependent.
    pub fn subscribe(&self, recipient: i64, display_name: &str, item_id: &str) -> SubscribeOutcome {
        let now = Utc::now();
        self.mutate(|map| {
            let created = !map.contains_key(&recipient);
            let sub = map
                .entry(recipient)
                .or_insert_with(|| Subscription::new(recipient, display_name, now));

            if sub.store_code.is_none() {
                return (SubscribeOutcome::LocationRequired, created);
            }
            if sub.items.contains(item_id) {
                return (SubscribeOutcome::AlreadySubscribed, created);
            }
            sub.items.insert(item_id.to_string());
            sub.updated_at = now;
            (SubscribeOutcome::Subscribed, true)
        })
    }

    /// Remove an item from the recipient's subscriptions.
    pub fn unsubscribe(&self, recipient: i64, item_id: &str) -> UnsubscribeOutcome {
        let now = Utc::now();
        self.mutate(|map| {
            let Some(sub) = map.get_mut(&recipient) else {
                return (UnsubscribeOutcome::NotSubscribed, false);
            };
            if !sub.items.remove(item_id) {
                return (UnsubscribeOutcome::NotSubscribed, false);
            }
            sub.updated_at = now;
            (UnsubscribeOutcome::Removed, true)
        })
    }

    /// Upsert the recipient's notification frequency.
    pub fn set_frequency(&self, recipient: i64, display_name: &str, freq: NotificationFrequency) {
        let now = Utc::now();
        self.mutate(|map| {
            let sub = map
                .entry(recipient)
                .or_insert_with(|| Subscription::new(recipient, display_name, now));
            sub.frequency = Some(freq);
            sub.updated_at = now;
            ((), true)
        });
    }

    /// Stamp a successful notification for frequency throttling.
    pub fn update_last_notified(&self, recipient: i64, item_id: &str, at: DateTime<Utc>) {
        self.mutate(|map| {
            let Some(sub) = map.get_mut(&recipient) else {
                return ((), false);
            };
            sub.last_notified.insert(item_id.to_string(), at);
            sub.updated_at = at;
            ((), true)
        });
    }

    /// Gate an on-demand check behind the per-recipient cooldown; claims
    /// the slot when allowed.
    pub fn begin_manual_check(&self, recipient: i64, cooldown: Duration) -> ManualCheckOutcome {
        let now = Utc::now();
        self.mutate(|map| {
            let Some(sub) = map.get_mut(&recipient) else {
                return (ManualCheckOutcome::Allowed, false);
            };
            if let Some(last) = sub.last_manual_check {
                let remaining = cooldown - (now - last);
                if remaining > Duration::zero() {
                    return (
                        ManualCheckOutcome::OnCooldown {
                            remaining_secs: remaining.num_seconds().max(1),
                        },
                        false,
                    );
                }
            }
            sub.last_manual_check = Some(now);
            sub.updated_at = now;
            (ManualCheckOutcome::Allowed, true)
        })
    }

    /// Snapshot of one recipient's subscription.
    pub fn subscription_of(&self, recipient: i64) -> Option<Subscription> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .get(&recipient)
            .cloned()
    }

    /// Snapshot of every subscription.
    pub fn all_subscriptions(&self) -> Vec<Subscription> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl SubscriberSource for SubscriptionRegistry {
    fn target_item_ids(&self) -> HashSet<String> {
        let map = self.inner.read().expect("registry lock poisoned");
        map.values()
            .flat_map(|sub| sub.items.iter().cloned())
            .collect()
    }

    fn subscribers_for(&self, sku: &str) -> Vec<Subscription> {
        let map = self.inner.read().expect("registry lock poisoned");
        map.values()
            .filter(|sub| sub.items.contains(sku))
            .cloned()
            .collect()
    }

    fn record_notified(&self, recipient: i64, sku: &str, at: DateTime<Utc>) {
        self.update_last_notified(recipient, sku, at);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(name: &str) -> (SubscriptionRegistry, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("shelfwatch-test-{name}"));
        std::fs::remove_dir_all(&dir).ok();
        (
            SubscriptionRegistry::load(SubscriptionStore::new(&dir)),
            dir,
        )
    }

    #[test]
    fn test_subscribe_requires_location() {
        let (reg, dir) = registry("loc-gate");

        assert_eq!(
            reg.subscribe(1, "alex", "A1"),
            SubscribeOutcome::LocationRequired
        );
        // Rejected subscribe leaves the item set unchanged.
        assert!(reg.subscription_of(1).unwrap().items.is_empty());

        reg.set_location(1, "alex", "gujarat");
        assert_eq!(reg.subscribe(1, "alex", "A1"), SubscribeOutcome::Subscribed);
        assert_eq!(
            reg.subscribe(1, "alex", "A1"),
            SubscribeOutcome::AlreadySubscribed
        );
        assert_eq!(reg.subscription_of(1).unwrap().items.len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unsubscribe_signals() {
        let (reg, dir) = registry("unsub");
        reg.set_location(2, "sam", "punjab");
        reg.subscribe(2, "sam", "A1");

        assert_eq!(reg.unsubscribe(2, "A1"), UnsubscribeOutcome::Removed);
        assert_eq!(reg.unsubscribe(2, "A1"), UnsubscribeOutcome::NotSubscribed);
        assert_eq!(reg.unsubscribe(99, "A1"), UnsubscribeOutcome::NotSubscribed);
        // The subscription record survives, only emptied.
        assert!(reg.subscription_of(2).is_some());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_target_ids_union() {
        let (reg, dir) = registry("targets");
        reg.set_location(1, "a", "gujarat");
        reg.set_location(2, "b", "punjab");
        reg.subscribe(1, "a", "A1");
        reg.subscribe(1, "a", "B2");
        reg.subscribe(2, "b", "B2");

        let ids = reg.target_item_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("A1") && ids.contains("B2"));

        assert_eq!(reg.subscribers_for("B2").len(), 2);
        assert_eq!(reg.subscribers_for("A1").len(), 1);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_state_survives_reload() {
        let dir = std::env::temp_dir().join("shelfwatch-test-reload");
        std::fs::remove_dir_all(&dir).ok();
        {
            let reg = SubscriptionRegistry::load(SubscriptionStore::new(&dir));
            reg.set_location(5, "riley", "karnataka");
            reg.subscribe(5, "riley", "A1");
            reg.set_frequency(5, "riley", NotificationFrequency::Daily);
        }
        let reg = SubscriptionRegistry::load(SubscriptionStore::new(&dir));
        let sub = reg.subscription_of(5).unwrap();
        assert!(sub.items.contains("A1"));
        assert_eq!(sub.frequency, Some(NotificationFrequency::Daily));
        assert_eq!(sub.store_code.as_deref(), Some("karnataka"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_manual_check_cooldown() {
        let (reg, dir) = registry("cooldown");
        reg.set_location(3, "kim", "gujarat");

        assert_eq!(
            reg.begin_manual_check(3, Duration::minutes(2)),
            ManualCheckOutcome::Allowed
        );
        match reg.begin_manual_check(3, Duration::minutes(2)) {
            ManualCheckOutcome::OnCooldown { remaining_secs } => {
                assert!(remaining_secs > 0 && remaining_secs <= 120);
            }
            other => panic!("expected cooldown, got {other:?}"),
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_last_notified_stamp() {
        let (reg, dir) = registry("stamp");
        reg.set_location(4, "pat", "gujarat");
        reg.subscribe(4, "pat", "A1");

        let at = Utc::now();
        reg.update_last_notified(4, "A1", at);
        let sub = reg.subscription_of(4).unwrap();
        assert_eq!(sub.last_notified.get("A1"), Some(&at));

        std::fs::remove_dir_all(&dir).ok();
    }
}
