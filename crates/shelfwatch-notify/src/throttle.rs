//! Per-recipient notification frequency throttling.

use chrono::{DateTime, Utc};

use shelfwatch_core::types::{NotificationFrequency, Subscription};

/// Whether a notification for `item_id` may be sent to this recipient now.
///
/// Unset or immediate frequency always passes. The first notification for
/// an item is never suppressed; afterwards the configured minimum interval
/// must have elapsed since the recorded last notification.
pub fn should_notify(sub: &Subscription, item_id: &str, now: DateTime<Utc>) -> bool {
    let Some(freq) = sub.frequency else {
        return true;
    };
    if freq == NotificationFrequency::Immediate {
        return true;
    }
    let Some(last) = sub.last_notified.get(item_id) else {
        return true;
    };
    now - *last >= freq.min_interval()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sub_with(freq: Option<NotificationFrequency>) -> Subscription {
        let mut sub = Subscription::new(1, "tester", Utc::now());
        sub.frequency = freq;
        sub
    }

    #[test]
    fn test_hourly_elapsed() {
        let now = Utc::now();
        let mut sub = sub_with(Some(NotificationFrequency::Hourly));
        sub.last_notified
            .insert("A1".into(), now - Duration::minutes(90));
        assert!(should_notify(&sub, "A1", now));
    }

    #[test]
    fn test_hourly_too_soon() {
        let now = Utc::now();
        let mut sub = sub_with(Some(NotificationFrequency::Hourly));
        sub.last_notified
            .insert("A1".into(), now - Duration::minutes(10));
        assert!(!should_notify(&sub, "A1", now));
    }

    #[test]
    fn test_first_notification_never_suppressed() {
        let now = Utc::now();
        let sub = sub_with(Some(NotificationFrequency::Every3Days));
        assert!(should_notify(&sub, "A1", now));
    }

    #[test]
    fn test_unset_and_immediate_always_pass() {
        let now = Utc::now();
        assert!(should_notify(&sub_with(None), "A1", now));

        let mut sub = sub_with(Some(NotificationFrequency::Immediate));
        sub.last_notified.insert("A1".into(), now);
        assert!(should_notify(&sub, "A1", now));
    }

    #[test]
    fn test_throttle_is_per_item() {
        let now = Utc::now();
        let mut sub = sub_with(Some(NotificationFrequency::Daily));
        sub.last_notified.insert("A1".into(), now);
        assert!(!should_notify(&sub, "A1", now));
        // A different item has no entry yet.
        assert!(should_notify(&sub, "B2", now));
    }
}
