//! Poll engine — the poll-and-notify cycle and on-demand targeted checks.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;

use shelfwatch_catalog::CatalogClient;
use shelfwatch_core::error::Result;
use shelfwatch_core::traits::SubscriberSource;
use shelfwatch_core::types::Item;
use shelfwatch_notify::Dispatcher;
use shelfwatch_stock::StockTracker;

/// Owns the stock tracker and wires catalog fetches to event dispatch.
///
/// The tracker sits behind a lock, but only `cycle` (sequential by
/// construction) mutates it; on-demand checks read the upstream directly
/// and never write stock records.
pub struct PollEngine {
    catalog: Arc<CatalogClient>,
    tracker: Mutex<StockTracker>,
    source: Arc<dyn SubscriberSource>,
    dispatcher: Arc<Dispatcher>,
    store_code: String,
}

impl PollEngine {
    pub fn new(
        catalog: Arc<CatalogClient>,
        source: Arc<dyn SubscriberSource>,
        dispatcher: Arc<Dispatcher>,
        store_code: &str,
    ) -> Self {
        Self {
            catalog,
            tracker: Mutex::new(StockTracker::new()),
            source,
            dispatcher,
            store_code: store_code.to_string(),
        }
    }

    /// One poll-and-notify cycle. The target set is recomputed from the
    /// registry every time, so it tracks subscriptions dynamically. Any
    /// upstream failure aborts the cycle with stored state untouched.
    pub async fn cycle(&self) -> Result<()> {
        let targets = self.source.target_item_ids();
        if targets.is_empty() {
            tracing::debug!("No subscribed items, skipping cycle");
            return Ok(());
        }

        tracing::info!("Checking stock for {} tracked item(s)", targets.len());
        let snapshot = self.catalog.fetch_snapshot(&self.store_code).await?;
        tracing::info!("Received {} items in catalog snapshot", snapshot.len());

        self.process_snapshot(&snapshot, &targets).await;
        Ok(())
    }

    /// Diff a snapshot and dispatch the resulting events. Split from
    /// `cycle` so the decision path is testable without HTTP.
    pub async fn process_snapshot(&self, snapshot: &[Item], targets: &HashSet<String>) {
        let events = {
            let mut tracker = self.tracker.lock().await;
            tracker.diff(snapshot, targets)
        };
        for event in &events {
            self.dispatcher.dispatch(event).await;
        }
    }

    /// Last-known availability per sku, for status rendering. None means
    /// the sku was never targeted by a completed cycle.
    pub async fn stock_status(
        &self,
        skus: impl IntoIterator<Item = String>,
    ) -> Vec<(String, Option<bool>)> {
        let tracker = self.tracker.lock().await;
        skus.into_iter()
            .map(|sku| {
                let state = tracker.record(&sku).map(|r| r.in_stock);
                (sku, state)
            })
            .collect()
    }

    /// On-demand targeted check for an arbitrary id set, bound to the
    /// requester's store when set. Reports current availability only;
    /// stock records are not written here.
    pub async fn check_items(
        &self,
        store_code: Option<&str>,
        ids: &HashSet<String>,
    ) -> Result<(Vec<Item>, Vec<String>)> {
        let store = store_code.unwrap_or(&self.store_code);
        let snapshot = self.catalog.fetch_snapshot(store).await?;

        let found: Vec<Item> = snapshot
            .into_iter()
            .filter(|item| ids.contains(&item.sku))
            .collect();
        let found_skus: HashSet<&str> = found.iter().map(|i| i.sku.as_str()).collect();
        let mut missing: Vec<String> = ids
            .iter()
            .filter(|sku| !found_skus.contains(sku.as_str()))
            .cloned()
            .collect();
        missing.sort();

        Ok((found, missing))
    }
}

/// Drive the periodic cycle. Strictly sequential: each cycle completes
/// before the next tick is awaited, so no two diffs ever race. No error
/// stops the loop.
pub async fn run_poll_loop(engine: Arc<PollEngine>, check_interval_secs: u64) {
    tracing::info!("Poll scheduler started (every {check_interval_secs}s)");
    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(check_interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately; the caller already ran the
    // baseline cycle, so consume it.
    interval.tick().await;

    loop {
        interval.tick().await;
        if let Err(e) = engine.cycle().await {
            // Upstream-transient: state untouched, retried next cycle.
            tracing::warn!("Poll cycle failed: {e}");
        }
    }
}
