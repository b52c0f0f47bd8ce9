//! Snapshot diffing against last-known per-item availability.

use std::collections::{HashMap, HashSet};

use shelfwatch_core::types::{Item, StockEvent};

/// Last-known state for one tracked item. Overwritten on every cycle that
/// targets the item; only the tracker ever writes these.
#[derive(Debug, Clone)]
pub struct StockRecord {
    pub in_stock: bool,
    /// Last item snapshot seen for this sku, kept so "assumed unavailable"
    /// events can still name the product.
    pub last_seen: Option<Item>,
}

/// Owns the per-item stock records and produces availability-change events.
#[derive(Debug, Default)]
pub struct StockTracker {
    records: HashMap<String, StockRecord>,
}

impl StockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff a fresh snapshot against stored state for the given target set.
    ///
    /// Transition table, per target sku:
    /// - present, unknown/false -> true: BecameAvailable
    /// - present, true -> false: WentUnavailable
    /// - present, state unchanged: nothing (idempotent)
    /// - absent, was true: WentUnavailable (upstream lists only active
    ///   items, so absence is a negative signal)
    /// - absent, was false/unknown: nothing, but recorded as unavailable
    ///
    /// Every target's record is rewritten so the next diff starts from
    /// up-to-date prior state. Records for skus outside the target set are
    /// left untouched.
    pub fn diff(&mut self, snapshot: &[Item], targets: &HashSet<String>) -> Vec<StockEvent> {
        let by_sku: HashMap<&str, &Item> = snapshot
            .iter()
            .filter(|item| targets.contains(&item.sku))
            .map(|item| (item.sku.as_str(), item))
            .collect();

        // Sorted for deterministic event order.
        let mut skus: Vec<&String> = targets.iter().collect();
        skus.sort();

        let mut events = Vec::new();
        for sku in skus {
            let prior = self.records.get(sku).map(|r| r.in_stock);

            match by_sku.get(sku.as_str()) {
                Some(&item) => {
                    let now_available = item.is_available();
                    match (prior, now_available) {
                        (None | Some(false), true) => {
                            tracing::info!("{} ({}): now IN STOCK", item.name, sku);
                            events.push(StockEvent::BecameAvailable(item.clone()));
                        }
                        (Some(true), false) => {
                            tracing::info!("{} ({}): now OUT OF STOCK", item.name, sku);
                            events.push(StockEvent::WentUnavailable {
                                sku: sku.clone(),
                                item: Some(item.clone()),
                            });
                        }
                        _ => {}
                    }
                    self.records.insert(
                        sku.clone(),
                        StockRecord {
                            in_stock: now_available,
                            last_seen: Some(item.clone()),
                        },
                    );
                }
                None => {
                    if prior == Some(true) {
                        tracing::warn!("{sku} missing from snapshot, assuming OUT OF STOCK");
                        let last_seen = self.records.get(sku).and_then(|r| r.last_seen.clone());
                        events.push(StockEvent::WentUnavailable {
                            sku: sku.clone(),
                            item: last_seen,
                        });
                    }
                    self.records
                        .entry(sku.clone())
                        .and_modify(|r| r.in_stock = false)
                        .or_insert(StockRecord {
                            in_stock: false,
                            last_seen: None,
                        });
                }
            }
        }
        events
    }

    /// Last-known record for a sku, if it was ever targeted.
    pub fn record(&self, sku: &str) -> Option<&StockRecord> {
        self.records.get(sku)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str, available: i64) -> Item {
        Item {
            id: format!("id-{sku}"),
            name: format!("Product {sku}"),
            alias: format!("product-{sku}"),
            sku: sku.to_string(),
            categories: vec![],
            available,
            inventory_quantity: if available == 1 { 40 } else { 0 },
            price: Some(300),
        }
    }

    fn targets(skus: &[&str]) -> HashSet<String> {
        skus.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unknown_to_available_emits_once() {
        let mut tracker = StockTracker::new();
        let snapshot = vec![item("A1", 1)];
        let t = targets(&["A1"]);

        let events = tracker.diff(&snapshot, &t);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StockEvent::BecameAvailable(i) if i.sku == "A1"));

        // Repeated identical state never re-emits.
        let events = tracker.diff(&snapshot, &t);
        assert!(events.is_empty());
    }

    #[test]
    fn test_available_to_unavailable() {
        let mut tracker = StockTracker::new();
        let t = targets(&["A1"]);
        tracker.diff(&[item("A1", 1)], &t);

        let events = tracker.diff(&[item("A1", 0)], &t);
        assert_eq!(events.len(), 1);
        assert!(
            matches!(&events[0], StockEvent::WentUnavailable { sku, item } if sku == "A1" && item.is_some())
        );
    }

    #[test]
    fn test_unavailable_stays_silent() {
        let mut tracker = StockTracker::new();
        let t = targets(&["A1"]);
        assert!(tracker.diff(&[item("A1", 0)], &t).is_empty());
        assert!(tracker.diff(&[item("A1", 0)], &t).is_empty());
        assert_eq!(tracker.record("A1").map(|r| r.in_stock), Some(false));
    }

    #[test]
    fn test_absent_after_available_is_assumed_unavailable() {
        let mut tracker = StockTracker::new();
        let t = targets(&["A1"]);
        tracker.diff(&[item("A1", 1)], &t);

        // Item vanished from the snapshot entirely.
        let events = tracker.diff(&[], &t);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StockEvent::WentUnavailable { sku, item } => {
                assert_eq!(sku, "A1");
                // Last-seen details survive so the event can name the product.
                assert_eq!(item.as_ref().unwrap().name, "Product A1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(tracker.record("A1").map(|r| r.in_stock), Some(false));
    }

    #[test]
    fn test_absent_never_seen_records_false_silently() {
        let mut tracker = StockTracker::new();
        let t = targets(&["GHOST"]);
        let events = tracker.diff(&[], &t);
        assert!(events.is_empty());
        assert_eq!(tracker.record("GHOST").map(|r| r.in_stock), Some(false));
    }

    #[test]
    fn test_untargeted_records_left_untouched() {
        let mut tracker = StockTracker::new();
        tracker.diff(&[item("A1", 1)], &targets(&["A1"]));

        // A1 dropped from every subscription; a later cycle without it must
        // not rewrite its record even though it is absent from the snapshot.
        let events = tracker.diff(&[item("B2", 1)], &targets(&["B2"]));
        assert_eq!(events.len(), 1);
        assert_eq!(tracker.record("A1").map(|r| r.in_stock), Some(true));
    }

    #[test]
    fn test_non_target_items_ignored() {
        let mut tracker = StockTracker::new();
        let events = tracker.diff(&[item("X9", 1)], &targets(&["A1"]));
        assert!(events.is_empty());
        assert!(tracker.record("X9").is_none());
    }
}
