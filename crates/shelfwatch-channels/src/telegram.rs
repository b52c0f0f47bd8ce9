//! Telegram Bot gateway — message sending plus long-poll updates.

use async_trait::async_trait;
use serde::Deserialize;

use shelfwatch_core::error::{Result, ShelfwatchError};
use shelfwatch_core::traits::MessageGateway;

/// Telegram Bot API client. Send-only state is immutable, so one instance
/// can be shared behind an `Arc` by the dispatcher and the command loop;
/// update offsets are tracked by the caller.
pub struct TelegramGateway {
    bot_token: String,
    client: reqwest::Client,
    poll_timeout_secs: u64,
}

impl TelegramGateway {
    pub fn new(bot_token: &str, poll_timeout_secs: u64) -> Result<Self> {
        // Client timeout must outlast the long-poll window.
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(poll_timeout_secs + 15))
            .build()
            .map_err(|e| ShelfwatchError::Gateway(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            bot_token: bot_token.to_string(),
            client,
            poll_timeout_secs,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{}", self.bot_token, method)
    }

    /// Send an HTML message. A 200 response with `ok: false` counts as a
    /// delivery failure; the gateway must report explicit success.
    pub async fn send_message(&self, chat_id: i64, html: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": html,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ShelfwatchError::Gateway(format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ShelfwatchError::Gateway(format!("Invalid send response: {e}")))?;

        if !result.ok {
            return Err(ShelfwatchError::Gateway(format!(
                "Send failed: {}",
                result.description.unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Get bot info; used as the startup credential check.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ShelfwatchError::Gateway(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| ShelfwatchError::Gateway(format!("Invalid getMe response: {e}")))?;
        body.result
            .ok_or_else(|| ShelfwatchError::Gateway("No bot info".into()))
    }

    /// Long-poll for updates after `offset`. The caller owns the offset and
    /// passes `last_update_id + 1`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
                ("allowed_updates", "[\"message\"]".into()),
            ])
            .send()
            .await
            .map_err(|e| ShelfwatchError::Gateway(format!("getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| ShelfwatchError::Gateway(format!("Invalid updates response: {e}")))?;

        if !body.ok {
            return Err(ShelfwatchError::Gateway(format!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            )));
        }
        Ok(body.result.unwrap_or_default())
    }
}

#[async_trait]
impl MessageGateway for TelegramGateway {
    async fn send(&self, recipient: i64, html: &str) -> Result<()> {
        self.send_message(recipient, html).await
    }
}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub text: Option<String>,
    pub date: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

impl TelegramUpdate {
    /// Extract (chat id, sender display name, text) from a human message;
    /// bot messages and non-text updates yield None.
    pub fn command_parts(&self) -> Option<(i64, String, &str)> {
        let msg = self.message.as_ref()?;
        let text = msg.text.as_deref()?;
        let from = msg.from.as_ref()?;
        if from.is_bot {
            return None;
        }
        let name = from
            .username
            .clone()
            .unwrap_or_else(|| match &from.last_name {
                Some(last) => format!("{} {last}", from.first_name),
                None => from.first_name.clone(),
            });
        Some((msg.chat.id, name, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parts_from_update() {
        let update: TelegramUpdate = serde_json::from_str(
            r#"{
                "update_id": 5,
                "message": {
                    "message_id": 1,
                    "from": {"id": 42, "is_bot": false, "first_name": "Alex", "username": "alex"},
                    "chat": {"id": 42, "type": "private"},
                    "text": "/subscribe A1",
                    "date": 1700000000
                }
            }"#,
        )
        .unwrap();

        let (chat, name, text) = update.command_parts().unwrap();
        assert_eq!(chat, 42);
        assert_eq!(name, "alex");
        assert_eq!(text, "/subscribe A1");
    }

    #[test]
    fn test_bot_messages_ignored() {
        let update: TelegramUpdate = serde_json::from_str(
            r#"{
                "update_id": 6,
                "message": {
                    "message_id": 2,
                    "from": {"id": 7, "is_bot": true, "first_name": "Bot"},
                    "chat": {"id": 7, "type": "private"},
                    "text": "hello",
                    "date": 1700000000
                }
            }"#,
        )
        .unwrap();
        assert!(update.command_parts().is_none());
    }
}
