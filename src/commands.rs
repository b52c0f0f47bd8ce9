//! Interactive command routing over Telegram long polling. This is the
//! collaborator surface: it only translates commands onto the core entry
//! points and renders replies.

use std::sync::Arc;

use chrono::Duration;

use shelfwatch_channels::{TelegramGateway, format};
use shelfwatch_core::config::AppConfig;
use shelfwatch_core::types::{
    ManualCheckOutcome, NotificationFrequency, SubscribeOutcome, UnsubscribeOutcome,
};
use shelfwatch_notify::Dispatcher;
use shelfwatch_registry::SubscriptionRegistry;
use shelfwatch_scheduler::PollEngine;

/// Long-poll updates forever and route each command. Poll failures back
/// off briefly and continue; nothing here stops the process.
pub async fn run_command_loop(
    gateway: Arc<TelegramGateway>,
    registry: Arc<SubscriptionRegistry>,
    dispatcher: Arc<Dispatcher>,
    engine: Arc<PollEngine>,
    config: AppConfig,
) {
    tracing::info!("Command loop started");
    let mut last_update_id = 0i64;

    loop {
        let updates = match gateway.get_updates(last_update_id + 1).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!("Update poll failed: {e}");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            last_update_id = last_update_id.max(update.update_id);
            let Some((chat_id, name, text)) = update.command_parts() else {
                continue;
            };
            tracing::debug!("Command from {name} ({chat_id}): {text}");

            let reply =
                handle_command(&registry, &dispatcher, &engine, &config, chat_id, &name, text)
                    .await;
            if let Some(reply) = reply
                && let Err(e) = gateway.send_message(chat_id, &reply).await
            {
                tracing::warn!("Reply to {chat_id} failed: {e}");
            }
        }
    }
}

async fn handle_command(
    registry: &Arc<SubscriptionRegistry>,
    dispatcher: &Arc<Dispatcher>,
    engine: &Arc<PollEngine>,
    config: &AppConfig,
    chat_id: i64,
    name: &str,
    text: &str,
) -> Option<String> {
    let (cmd, arg) = split_command(text);

    match cmd.as_str() {
        "/start" | "/help" => Some(format::render_help()),

        "/location" => {
            let Some(code) = normalize_store_code(arg) else {
                return Some("Usage: /location &lt;store&gt;, e.g. /location gujarat".into());
            };
            registry.set_location(chat_id, name, &code);
            Some(format!(
                "📍 Store set to <b>{}</b>. You can /subscribe now.",
                format::escape_html(&code)
            ))
        }

        "/subscribe" => {
            let Some(sku) = arg.map(str::to_uppercase) else {
                return Some("Usage: /subscribe &lt;sku&gt;".into());
            };
            match registry.subscribe(chat_id, name, &sku) {
                SubscribeOutcome::Subscribed => Some(format!(
                    "🔔 Subscribed to <code>{}</code>. You will hear about availability changes.",
                    format::escape_html(&sku)
                )),
                SubscribeOutcome::AlreadySubscribed => {
                    Some("You are already subscribed to this item.".into())
                }
                SubscribeOutcome::LocationRequired => Some(
                    "⚠️ Set your store first with /location &lt;store&gt;; availability depends on it."
                        .into(),
                ),
            }
        }

        "/unsubscribe" => {
            let Some(sku) = arg.map(str::to_uppercase) else {
                return Some("Usage: /unsubscribe &lt;sku&gt;".into());
            };
            match registry.unsubscribe(chat_id, &sku) {
                UnsubscribeOutcome::Removed => Some(format!(
                    "🔕 Unsubscribed from <code>{}</code>.",
                    format::escape_html(&sku)
                )),
                UnsubscribeOutcome::NotSubscribed => {
                    Some("You are not subscribed to this item.".into())
                }
            }
        }

        "/frequency" => match arg.and_then(NotificationFrequency::parse) {
            Some(freq) => {
                registry.set_frequency(chat_id, name, freq);
                Some(format!(
                    "🔔 Notification frequency set to <b>{}</b>.",
                    freq.as_str()
                ))
            }
            None => Some(
                "Usage: /frequency &lt;setting&gt;\nOne of: immediate, every_30_minutes, hourly, \
                 every_3_hours, every_6_hours, every_12_hours, daily, every_3_days"
                    .into(),
            ),
        },

        "/status" => {
            let sub = registry.subscription_of(chat_id);
            match sub {
                Some(sub) => {
                    let stock = engine.stock_status(sub.items.iter().cloned()).await;
                    Some(format::render_status(&sub, &stock))
                }
                None => Some(
                    "You have no subscriptions yet. Use /subscribe &lt;sku&gt; to add one.".into(),
                ),
            }
        }

        "/checknow" => check_now(registry, dispatcher, engine, config, chat_id).await,

        _ => Some(format::render_help()),
    }
}

/// On-demand targeted check. Cooldown-gated per recipient, then dispatched
/// to run asynchronously; the spawned task pushes its own completion
/// notice so the command loop is never blocked on upstream calls.
async fn check_now(
    registry: &Arc<SubscriptionRegistry>,
    dispatcher: &Arc<Dispatcher>,
    engine: &Arc<PollEngine>,
    config: &AppConfig,
    chat_id: i64,
) -> Option<String> {
    let sub = registry.subscription_of(chat_id);
    let Some(sub) = sub.filter(|s| !s.items.is_empty()) else {
        return Some("You have no subscriptions to check. Use /subscribe first.".into());
    };

    let cooldown = Duration::seconds(config.scheduler.manual_check_cooldown_secs as i64);
    if let ManualCheckOutcome::OnCooldown { remaining_secs } =
        registry.begin_manual_check(chat_id, cooldown)
    {
        return Some(format!(
            "⏰ Please wait {remaining_secs}s before checking again."
        ));
    }

    let engine = engine.clone();
    let dispatcher = dispatcher.clone();
    let base_url = config.catalog.base_url.clone();
    let ids: std::collections::HashSet<String> = sub.items.iter().cloned().collect();
    let store_code = sub.store_code.clone();

    tokio::spawn(async move {
        let report = match engine.check_items(store_code.as_deref(), &ids).await {
            Ok((found, missing)) => format::render_check_report(&found, &missing, &base_url),
            Err(e) => {
                tracing::warn!("On-demand check for {chat_id} failed: {e}");
                "❌ Could not reach the shop right now. Please try again later.".into()
            }
        };
        dispatcher.send_notice(chat_id, &report).await;
    });

    Some("🔍 Checking your items, results in a moment...".into())
}

/// Split "/cmd arg words" into the lowercased command (bot-suffix
/// stripped) and the remaining argument.
fn split_command(text: &str) -> (String, Option<&str>) {
    let text = text.trim();
    let (head, tail) = match text.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, Some(tail.trim())),
        None => (text, None),
    };
    let head = head.split('@').next().unwrap_or(head).to_lowercase();
    (head, tail.filter(|t| !t.is_empty()))
}

/// Lowercase, space-to-underscore store codes; letters and underscores
/// only, bounded length.
fn normalize_store_code(arg: Option<&str>) -> Option<String> {
    let code = arg?.trim().to_lowercase().replace(' ', "_");
    if code.len() < 3 || code.len() > 25 {
        return None;
    }
    if !code.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
        return None;
    }
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("/subscribe A1"), ("/subscribe".into(), Some("A1")));
        assert_eq!(split_command("/status"), ("/status".into(), None));
        assert_eq!(split_command("/HELP@shelfbot"), ("/help".into(), None));
        assert_eq!(split_command("/location  tamil nadu "), ("/location".into(), Some("tamil nadu")));
    }

    #[test]
    fn test_normalize_store_code() {
        assert_eq!(normalize_store_code(Some("Tamil Nadu")).as_deref(), Some("tamil_nadu"));
        assert_eq!(normalize_store_code(Some("gujarat")).as_deref(), Some("gujarat"));
        assert!(normalize_store_code(Some("x")).is_none());
        assert!(normalize_store_code(Some("weird$code")).is_none());
        assert!(normalize_store_code(None).is_none());
    }
}
