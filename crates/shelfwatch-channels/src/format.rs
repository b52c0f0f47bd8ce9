//! Outbound HTML message rendering. Pure string building; nothing here
//! touches the network or the registry.

use shelfwatch_core::types::{Item, StockEvent, Subscription};

/// Escape the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Storefront product page link for an item, when it has a link alias.
pub fn product_link(base_url: &str, alias: &str) -> Option<String> {
    if alias.is_empty() {
        return None;
    }
    Some(format!(
        "{}/en/product/{alias}",
        base_url.trim_end_matches('/')
    ))
}

/// Body for an availability-change event.
pub fn render_event(event: &StockEvent, base_url: &str) -> String {
    match event {
        StockEvent::BecameAvailable(item) => {
            let link = product_link(base_url, &item.alias)
                .map(|url| format!("\n\n🔗 <a href=\"{url}\">View on the shop</a>"))
                .unwrap_or_default();
            format!(
                "✅ <b>Stock Available!</b>\n\nProduct: <b>{}</b>\nStatus: <b>IN STOCK</b>\nQuantity: {}\nSKU: <code>{}</code>{link}",
                escape_html(&item.name),
                item.inventory_quantity,
                escape_html(&item.sku),
            )
        }
        StockEvent::WentUnavailable {
            sku,
            item: Some(item),
        } => format!(
            "ℹ️ <b>Stock Update</b>\n\nProduct: <b>{}</b>\nStatus: <b>OUT OF STOCK</b>\nSKU: <code>{}</code>",
            escape_html(&item.name),
            escape_html(sku),
        ),
        // Item vanished from the catalog and we never saw its details.
        StockEvent::WentUnavailable { sku, item: None } => format!(
            "❓ <b>Stock Update (Not Found)</b>\n\nProduct: <b>{}</b>\nStatus: <b>Assumed OUT OF STOCK</b> (no longer listed)\nSKU: <code>{}</code>",
            escape_html(sku),
            escape_html(sku),
        ),
    }
}

/// Startup self-test notice for the admin chat.
pub fn render_startup_notice(
    recipients: usize,
    tracked_items: usize,
    quiet_hours_enabled: bool,
) -> String {
    let quiet = if quiet_hours_enabled {
        "quiet hours 00:00-07:00 local"
    } else {
        "quiet hours disabled"
    };
    format!(
        "🔄 Shelfwatch started. {recipients} recipient(s), {tracked_items} tracked item(s), {quiet}."
    )
}

/// One recipient's subscription status, with last-known stock per item.
pub fn render_status(sub: &Subscription, stock: &[(String, Option<bool>)]) -> String {
    if sub.items.is_empty() {
        return "You have no subscriptions yet. Use /subscribe &lt;sku&gt; to add one.".into();
    }

    let store = sub.store_code.as_deref().unwrap_or("not set");
    let freq = sub.frequency.map(|f| f.as_str()).unwrap_or("immediate");

    let mut out = format!(
        "📊 <b>Your Subscriptions</b>\n\nUser: <b>{}</b>\nStore: <b>{}</b>\nFrequency: <b>{}</b>\nItems:\n",
        escape_html(&sub.display_name),
        escape_html(store),
        escape_html(freq),
    );
    for (sku, in_stock) in stock {
        let marker = match in_stock {
            Some(true) => "✅",
            Some(false) => "❌",
            None => "🔍",
        };
        out.push_str(&format!("{marker} <code>{}</code>\n", escape_html(sku)));
    }
    out.push_str("\n✅ in stock | ❌ out of stock | 🔍 not checked yet");
    out
}

/// Report for an on-demand targeted check.
pub fn render_check_report(found: &[Item], missing: &[String], base_url: &str) -> String {
    let mut out = String::from("🔍 <b>Stock Check</b>\n\n");
    let mut in_stock = 0usize;

    for item in found {
        if item.is_available() {
            in_stock += 1;
            let link = product_link(base_url, &item.alias)
                .map(|url| format!(" <a href=\"{url}\">link</a>"))
                .unwrap_or_default();
            out.push_str(&format!(
                "✅ <b>{}</b> ({} available){link}\n",
                escape_html(&item.name),
                item.inventory_quantity,
            ));
        } else {
            out.push_str(&format!("❌ <b>{}</b>\n", escape_html(&item.name)));
        }
    }
    for sku in missing {
        out.push_str(&format!(
            "❓ <code>{}</code> not listed right now\n",
            escape_html(sku)
        ));
    }

    out.push_str(&format!(
        "\n{in_stock} of {} checked item(s) in stock",
        found.len() + missing.len()
    ));
    out
}

/// Command overview, sent for /help and unrecognized input.
pub fn render_help() -> String {
    "🤖 <b>Shelfwatch</b>\n\n\
     /subscribe &lt;sku&gt; - get notified about an item\n\
     /unsubscribe &lt;sku&gt; - stop notifications for an item\n\
     /location &lt;store&gt; - set your store (e.g. gujarat)\n\
     /frequency &lt;setting&gt; - immediate, every_30_minutes, hourly, every_3_hours, every_6_hours, every_12_hours, daily, every_3_days\n\
     /status - your subscriptions and their stock\n\
     /checknow - check your items right now\n\
     /help - this message"
        .into()
}
