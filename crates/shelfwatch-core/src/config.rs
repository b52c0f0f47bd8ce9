//! Shelfwatch configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ShelfwatchError};

/// Root configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load config from the default path (~/.shelfwatch/config.toml).
    /// A missing file yields defaults; the bot token can still arrive via env.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ShelfwatchError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ShelfwatchError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the shelfwatch home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".shelfwatch")
    }

    /// Resolve the bot token: SHELFWATCH_TELEGRAM_TOKEN overrides the file.
    pub fn bot_token(&self) -> Result<String> {
        let token = std::env::var("SHELFWATCH_TELEGRAM_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.telegram.bot_token.trim().to_string());
        if token.is_empty() {
            return Err(ShelfwatchError::Config(
                "Telegram bot token is empty. Set [telegram].bot_token or SHELFWATCH_TELEGRAM_TOKEN"
                    .into(),
            ));
        }
        Ok(token)
    }
}

/// Messaging gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Chat that receives the startup self-test notice.
    #[serde(default)]
    pub admin_chat_id: Option<i64>,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            admin_chat_id: None,
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// Upstream catalog API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Store code the periodic cycle binds the session to.
    #[serde(default = "default_store")]
    pub default_store: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Minimum spacing between consecutive upstream calls, shared by all
    /// callers.
    #[serde(default = "default_min_call_interval")]
    pub min_call_interval_secs: u64,
    /// Refresh the session when its remaining validity drops below this.
    #[serde(default = "default_refresh_margin")]
    pub session_refresh_margin_mins: i64,
    /// TTL assumed when the upstream expiry attribute is unparsable.
    #[serde(default = "default_fallback_ttl")]
    pub session_fallback_ttl_hours: i64,
}

fn default_base_url() -> String {
    "https://shop.amul.com".into()
}
fn default_store() -> String {
    "gujarat".into()
}
fn default_request_timeout() -> u64 {
    15
}
fn default_min_call_interval() -> u64 {
    5
}
fn default_refresh_margin() -> i64 {
    60
}
fn default_fallback_ttl() -> i64 {
    24
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_store: default_store(),
            request_timeout_secs: default_request_timeout(),
            min_call_interval_secs: default_min_call_interval(),
            session_refresh_margin_mins: default_refresh_margin(),
            session_fallback_ttl_hours: default_fallback_ttl(),
        }
    }
}

/// Poll scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Per-recipient cooldown between on-demand "check now" requests.
    #[serde(default = "default_manual_cooldown")]
    pub manual_check_cooldown_secs: u64,
}

fn default_check_interval() -> u64 {
    3600
}
fn default_manual_cooldown() -> u64 {
    120
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            manual_check_cooldown_secs: default_manual_cooldown(),
        }
    }
}

/// Notification policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// IANA timezone for quiet hours, e.g. "Asia/Kolkata".
    /// Unset disables quiet hours entirely (fail-open).
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    2
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            timezone: None,
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

/// Subscription persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding subscriptions.json.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "~/.shelfwatch".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.catalog.default_store, "gujarat");
        assert_eq!(config.scheduler.check_interval_secs, 3600);
        assert_eq!(config.notify.retry_attempts, 3);
        assert!(config.notify.timezone.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            [telegram]
            bot_token = "123:abc"
            admin_chat_id = 42

            [notify]
            timezone = "Asia/Kolkata"

            [scheduler]
            check_interval_secs = 900
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.telegram.admin_chat_id, Some(42));
        assert_eq!(config.notify.timezone.as_deref(), Some("Asia/Kolkata"));
        assert_eq!(config.scheduler.check_interval_secs, 900);
        // Untouched sections keep their defaults.
        assert_eq!(config.catalog.min_call_interval_secs, 5);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.catalog.base_url, "https://shop.amul.com");
        assert_eq!(config.scheduler.manual_check_cooldown_secs, 120);
    }

    #[test]
    fn test_home_dir() {
        let home = AppConfig::home_dir();
        assert!(home.to_string_lossy().contains("shelfwatch"));
    }
}
