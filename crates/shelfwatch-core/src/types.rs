//! Wire and domain types shared across the workspace.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One item as returned by the storefront catalog API.
///
/// `available` is a truthy sentinel (1 = in stock), not a boolean.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub alias: String,
    pub sku: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub available: i64,
    #[serde(default)]
    pub inventory_quantity: i64,
    #[serde(default)]
    pub price: Option<i64>,
}

impl Item {
    /// Whether the truthy availability sentinel says "in stock".
    pub fn is_available(&self) -> bool {
        self.available == 1
    }
}

/// The catalog API's bulk read envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub data: Vec<Item>,
}

/// Availability transition emitted by the stock state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum StockEvent {
    /// Item went from unknown/out-of-stock to in stock.
    BecameAvailable(Item),
    /// Item went out of stock, either observed (`item` present) or assumed
    /// because it vanished from the snapshot (`item` is the last-seen copy).
    WentUnavailable { sku: String, item: Option<Item> },
}

impl StockEvent {
    pub fn sku(&self) -> &str {
        match self {
            StockEvent::BecameAvailable(item) => &item.sku,
            StockEvent::WentUnavailable { sku, .. } => sku,
        }
    }
}

/// Per-recipient minimum re-notify interval.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationFrequency {
    #[serde(rename = "immediate")]
    Immediate,
    #[serde(rename = "every_30_minutes")]
    Every30Minutes,
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "every_3_hours")]
    Every3Hours,
    #[serde(rename = "every_6_hours")]
    Every6Hours,
    #[serde(rename = "every_12_hours")]
    Every12Hours,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "every_3_days")]
    Every3Days,
}

impl NotificationFrequency {
    /// Minimum interval between notifications for the same item.
    pub fn min_interval(&self) -> Duration {
        match self {
            NotificationFrequency::Immediate => Duration::zero(),
            NotificationFrequency::Every30Minutes => Duration::minutes(30),
            NotificationFrequency::Hourly => Duration::hours(1),
            NotificationFrequency::Every3Hours => Duration::hours(3),
            NotificationFrequency::Every6Hours => Duration::hours(6),
            NotificationFrequency::Every12Hours => Duration::hours(12),
            NotificationFrequency::Daily => Duration::hours(24),
            NotificationFrequency::Every3Days => Duration::hours(72),
        }
    }

    /// The wire/user-facing keyword for this frequency.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationFrequency::Immediate => "immediate",
            NotificationFrequency::Every30Minutes => "every_30_minutes",
            NotificationFrequency::Hourly => "hourly",
            NotificationFrequency::Every3Hours => "every_3_hours",
            NotificationFrequency::Every6Hours => "every_6_hours",
            NotificationFrequency::Every12Hours => "every_12_hours",
            NotificationFrequency::Daily => "daily",
            NotificationFrequency::Every3Days => "every_3_days",
        }
    }

    /// Parse a user-facing frequency keyword (the serde wire name).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "immediate" => Some(Self::Immediate),
            "every_30_minutes" => Some(Self::Every30Minutes),
            "hourly" => Some(Self::Hourly),
            "every_3_hours" => Some(Self::Every3Hours),
            "every_6_hours" => Some(Self::Every6Hours),
            "every_12_hours" => Some(Self::Every12Hours),
            "daily" => Some(Self::Daily),
            "every_3_days" => Some(Self::Every3Days),
            _ => None,
        }
    }
}

/// One recipient's durable subscription state.
///
/// Created on first interaction, never deleted; unsubscribing empties
/// `items`. `last_notified` keys may lag item removal; a stale entry is
/// inert, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub recipient_id: i64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub items: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<NotificationFrequency>,
    #[serde(default)]
    pub last_notified: BTreeMap<String, DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_manual_check: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(recipient_id: i64, display_name: &str, now: DateTime<Utc>) -> Self {
        Self {
            recipient_id,
            display_name: display_name.to_string(),
            items: BTreeSet::new(),
            store_code: None,
            frequency: None,
            last_notified: BTreeMap::new(),
            last_manual_check: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of a subscribe request. Negative cases are signals, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    /// Availability is locale-dependent; a store code must be set first.
    LocationRequired,
    AlreadySubscribed,
}

/// Result of an unsubscribe request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    NotSubscribed,
}

/// Result of asking to run an on-demand stock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManualCheckOutcome {
    Allowed,
    OnCooldown { remaining_secs: i64 },
}
