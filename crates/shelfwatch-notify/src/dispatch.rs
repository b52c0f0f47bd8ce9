//! Notification dispatch: resolves subscribers, applies the quiet-hours
//! and frequency gates, and delivers with bounded retries.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;

use shelfwatch_core::config::NotifyConfig;
use shelfwatch_core::traits::{MessageGateway, SubscriberSource};
use shelfwatch_core::types::StockEvent;

use crate::quiet::{is_quiet_hours, parse_timezone};
use crate::throttle::should_notify;

/// Renders an availability event into the outbound message body.
/// Kept as a callback so transport formatting stays outside this crate.
pub type EventRenderer = Arc<dyn Fn(&StockEvent) -> String + Send + Sync>;

/// Best-effort notification dispatcher.
///
/// Delivery contract: per recipient, quiet hours gate first, then the
/// frequency throttle (a throttled skip consumes nothing), then up to the
/// configured number of attempts with a fixed delay between them. First
/// success records last-notified exactly once; exhaustion logs and drops.
pub struct Dispatcher {
    source: Arc<dyn SubscriberSource>,
    gateway: Arc<dyn MessageGateway>,
    render: EventRenderer,
    timezone: Option<Tz>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn SubscriberSource>,
        gateway: Arc<dyn MessageGateway>,
        render: EventRenderer,
        config: &NotifyConfig,
    ) -> Self {
        Self {
            source,
            gateway,
            render,
            timezone: parse_timezone(config.timezone.as_deref()),
            retry_attempts: config.retry_attempts.max(1),
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }

    /// Deliver one availability event to every eligible subscriber.
    pub async fn dispatch(&self, event: &StockEvent) {
        let sku = event.sku();
        let subscribers = self.source.subscribers_for(sku);
        if subscribers.is_empty() {
            return;
        }

        let html = (self.render)(event);
        let mut sent = 0usize;

        for sub in subscribers {
            if is_quiet_hours(Utc::now(), self.timezone) {
                tracing::debug!("Quiet hours: suppressing {sku} for {}", sub.recipient_id);
                continue;
            }
            if !should_notify(&sub, sku, Utc::now()) {
                tracing::debug!(
                    "Frequency throttle: skipping {sku} for {}",
                    sub.recipient_id
                );
                continue;
            }
            if self.send_with_retry(sub.recipient_id, &html).await {
                self.source.record_notified(sub.recipient_id, sku, Utc::now());
                sent += 1;
            }
        }

        if sent > 0 {
            tracing::info!("Notified {sent} subscriber(s) about {sku}");
        }
    }

    /// Quiet-hours-gated one-off send, used for startup self-test and
    /// on-demand completion notices. Returns whether delivery succeeded.
    pub async fn send_notice(&self, recipient: i64, html: &str) -> bool {
        self.send_with_retry(recipient, html).await
    }

    /// Up to `retry_attempts` deliveries with a fixed inter-attempt delay,
    /// no backoff growth. Every attempt re-checks quiet hours, so a window
    /// opening mid-retry still suppresses the message.
    async fn send_with_retry(&self, recipient: i64, html: &str) -> bool {
        for attempt in 1..=self.retry_attempts {
            if is_quiet_hours(Utc::now(), self.timezone) {
                tracing::debug!("Quiet hours: suppressing send to {recipient}");
                return false;
            }
            match self.gateway.send(recipient, html).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!("Attempt {attempt}: delivery to {recipient} failed: {e}");
                }
            }
            if attempt < self.retry_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        // No dead-letter queue; drop with a log entry.
        tracing::error!(
            "Dropping notification for {recipient} after {} attempts",
            self.retry_attempts
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration};
    use shelfwatch_core::error::{Result, ShelfwatchError};
    use shelfwatch_core::types::{Item, NotificationFrequency, Subscription};
    use std::collections::HashSet;
    use std::sync::Mutex;

    struct StubSource {
        subs: Mutex<Vec<Subscription>>,
    }

    impl SubscriberSource for StubSource {
        fn target_item_ids(&self) -> HashSet<String> {
            self.subs
                .lock()
                .unwrap()
                .iter()
                .flat_map(|s| s.items.iter().cloned())
                .collect()
        }

        fn subscribers_for(&self, sku: &str) -> Vec<Subscription> {
            self.subs
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.items.contains(sku))
                .cloned()
                .collect()
        }

        fn record_notified(&self, recipient: i64, sku: &str, at: DateTime<Utc>) {
            let mut subs = self.subs.lock().unwrap();
            if let Some(sub) = subs.iter_mut().find(|s| s.recipient_id == recipient) {
                sub.last_notified.insert(sku.to_string(), at);
            }
        }
    }

    struct RecordingGateway {
        sent: Mutex<Vec<(i64, String)>>,
        fail_first: Mutex<u32>,
    }

    #[async_trait]
    impl MessageGateway for RecordingGateway {
        async fn send(&self, recipient: i64, html: &str) -> Result<()> {
            let mut failures = self.fail_first.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ShelfwatchError::Gateway("simulated outage".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((recipient, html.to_string()));
            Ok(())
        }
    }

    fn fixture(
        freq: Option<NotificationFrequency>,
        fail_first: u32,
    ) -> (Dispatcher, Arc<StubSource>, Arc<RecordingGateway>) {
        let mut sub = Subscription::new(10, "tester", Utc::now());
        sub.store_code = Some("gujarat".into());
        sub.frequency = freq;
        sub.items.insert("A1".into());

        let source = Arc::new(StubSource {
            subs: Mutex::new(vec![sub]),
        });
        let gateway = Arc::new(RecordingGateway {
            sent: Mutex::new(Vec::new()),
            fail_first: Mutex::new(fail_first),
        });
        let config = NotifyConfig {
            timezone: None,
            retry_attempts: 3,
            retry_delay_secs: 0,
        };
        let dispatcher = Dispatcher::new(
            source.clone(),
            gateway.clone(),
            Arc::new(|event: &StockEvent| format!("event for {}", event.sku())),
            &config,
        );
        (dispatcher, source, gateway)
    }

    fn became_available() -> StockEvent {
        StockEvent::BecameAvailable(Item {
            id: "id-A1".into(),
            name: "Product A1".into(),
            alias: "product-a1".into(),
            sku: "A1".into(),
            categories: vec![],
            available: 1,
            inventory_quantity: 12,
            price: None,
        })
    }

    #[tokio::test]
    async fn test_dispatch_sends_and_records() {
        let (dispatcher, source, gateway) = fixture(Some(NotificationFrequency::Daily), 0);
        dispatcher.dispatch(&became_available()).await;

        let sent = gateway.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 10);
        assert!(sent[0].1.contains("A1"));

        let subs = source.subs.lock().unwrap();
        assert!(subs[0].last_notified.contains_key("A1"));
    }

    #[tokio::test]
    async fn test_dispatch_throttled_recipient_skipped() {
        let (dispatcher, source, gateway) = fixture(Some(NotificationFrequency::Daily), 0);
        source.subs.lock().unwrap()[0]
            .last_notified
            .insert("A1".into(), Utc::now() - ChronoDuration::hours(1));

        dispatcher.dispatch(&became_available()).await;
        assert!(gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retry_then_success_records_once() {
        let (dispatcher, source, gateway) = fixture(None, 2);
        dispatcher.dispatch(&became_available()).await;

        // Two failures then success on the third attempt.
        assert_eq!(gateway.sent.lock().unwrap().len(), 1);
        let subs = source.subs.lock().unwrap();
        assert_eq!(subs[0].last_notified.len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_retries_drop_without_recording() {
        let (dispatcher, source, gateway) = fixture(None, 5);
        dispatcher.dispatch(&became_available()).await;

        assert!(gateway.sent.lock().unwrap().is_empty());
        let subs = source.subs.lock().unwrap();
        assert!(subs[0].last_notified.is_empty());
    }
}
