//! Trait seams between the poller, the registry, and the transport.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::Subscription;

/// Outbound messaging transport. One send is one HTML-capable message to one
/// recipient; implementations must report gateway-level failure (not just
/// transport-level OK) as an error.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn send(&self, recipient: i64, html: &str) -> Result<()>;
}

/// The narrow capability the poll/dispatch path needs from the subscription
/// registry: enumerate targets, resolve subscribers, record throttling.
/// The registry implements this; it never calls back into the poller.
pub trait SubscriberSource: Send + Sync {
    /// Union of every recipient's subscribed item ids. Recomputed each
    /// cycle, so the poll target set tracks subscriptions dynamically.
    fn target_item_ids(&self) -> HashSet<String>;

    /// Snapshot of every subscription containing `sku`.
    fn subscribers_for(&self, sku: &str) -> Vec<Subscription>;

    /// Record a successful delivery for frequency throttling.
    fn record_notified(&self, recipient: i64, sku: &str, at: DateTime<Utc>);
}
