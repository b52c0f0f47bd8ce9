//! Upstream session management — cookie handshake, expiry tracking, and the
//! shared rate-limit clock.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::SET_COOKIE;
use tokio::sync::Mutex;

use shelfwatch_core::config::CatalogConfig;
use shelfwatch_core::error::{Result, ShelfwatchError};

const LANDING_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36";

/// Current upstream session state.
#[derive(Debug, Default)]
struct SessionState {
    /// When the session credential expires. None before the first handshake.
    expiry: Option<DateTime<Utc>>,
    /// Store code the session preference is currently bound to.
    bound_store: Option<String>,
}

#[derive(Debug, Default)]
struct RateClock {
    last_call: Option<Instant>,
}

/// Thread-safe session manager. The cookie jar lives in the shared
/// `reqwest::Client`; expiry and store binding are tracked here.
pub struct SessionManager {
    client: reqwest::Client,
    config: CatalogConfig,
    state: Mutex<SessionState>,
    rate: Mutex<RateClock>,
}

impl SessionManager {
    pub fn new(config: CatalogConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ShelfwatchError::Session(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            state: Mutex::default(),
            rate: Mutex::default(),
        })
    }

    /// The HTTP client carrying the session cookie jar.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Ensure a valid session bound to `store_code`, refreshing if the
    /// remaining validity is below the configured margin.
    ///
    /// The state lock is held across the whole handshake, so only one
    /// refresh is ever in flight; concurrent callers wait on the lock and
    /// then observe the fresh session. A valid session asked for a
    /// different store code is reused and only rebound.
    pub async fn ensure_session(&self, store_code: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        let margin = chrono::Duration::minutes(self.config.session_refresh_margin_mins);
        let expired = match state.expiry {
            Some(expiry) => Utc::now() + margin >= expiry,
            None => true,
        };

        if expired {
            let mut expiry = self.fetch_credential().await?;
            // A fresh session must outlive the refresh margin, or every
            // cycle would re-run the handshake.
            if expiry <= Utc::now() + margin {
                tracing::warn!(
                    "Upstream expiry {expiry} is within the refresh margin, using fallback TTL"
                );
                expiry = Utc::now() + chrono::Duration::hours(self.config.session_fallback_ttl_hours);
            }
            self.bind_store(store_code).await?;
            state.expiry = Some(expiry);
            state.bound_store = Some(store_code.to_string());
            tracing::info!("Session refreshed, expires {expiry}");
        } else if state.bound_store.as_deref() != Some(store_code) {
            self.bind_store(store_code).await?;
            state.bound_store = Some(store_code.to_string());
            tracing::debug!("Session rebound to store '{store_code}'");
        }
        Ok(())
    }

    /// Block until the minimum spacing since the last upstream call has
    /// elapsed, then claim the slot. This is the single politeness gate,
    /// shared by scheduled cycles and on-demand checks.
    pub async fn enforce_rate_limit(&self) {
        let mut rate = self.rate.lock().await;
        let min = Duration::from_secs(self.config.min_call_interval_secs);
        if let Some(last) = rate.last_call {
            let elapsed = last.elapsed();
            if elapsed < min {
                tokio::time::sleep(min - elapsed).await;
            }
        }
        rate.last_call = Some(Instant::now());
    }

    /// Handshake step 1: unauthenticated landing fetch. The session
    /// credential lands in the cookie jar; expiry comes from the
    /// Set-Cookie metadata, parsed leniently.
    async fn fetch_credential(&self) -> Result<DateTime<Utc>> {
        let url = format!("{}/en/", self.config.base_url);
        let resp = self
            .client
            .get(&url)
            .header("User-Agent", LANDING_USER_AGENT)
            .send()
            .await
            .map_err(|e| ShelfwatchError::Session(format!("Landing fetch failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ShelfwatchError::Session(format!(
                "Landing fetch returned {}",
                resp.status()
            )));
        }

        let cookies: Vec<String> = resp
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();

        match session_expiry(cookies.iter().map(String::as_str)) {
            Some(expiry) => Ok(expiry),
            None => {
                tracing::warn!(
                    "Could not parse session expiry, assuming {}h TTL",
                    self.config.session_fallback_ttl_hours
                );
                Ok(Utc::now() + chrono::Duration::hours(self.config.session_fallback_ttl_hours))
            }
        }
    }

    /// Handshake step 2: bind the session to a store and validate it.
    /// Non-success means the refresh failed.
    async fn bind_store(&self, store_code: &str) -> Result<()> {
        let url = format!(
            "{}/entity/ms.settings/_/setPreferences",
            self.config.base_url
        );
        let body = serde_json::json!({ "data": { "store": store_code } });

        let resp = self
            .client
            .put(&url)
            .header("frontend", "1")
            .header("Origin", self.config.base_url.clone())
            .header("Referer", format!("{}/", self.config.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| ShelfwatchError::Session(format!("setPreferences failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(ShelfwatchError::Session(format!(
                "setPreferences returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Pull the session cookie's Expires attribute out of Set-Cookie header
/// values. Any parse failure yields None; the caller substitutes a fixed
/// fallback TTL instead of failing the handshake.
fn session_expiry<'a>(cookies: impl Iterator<Item = &'a str>) -> Option<DateTime<Utc>> {
    for cookie in cookies {
        let mut parts = cookie.split(';').map(str::trim);
        let Some(first) = parts.next() else { continue };
        if !first.to_ascii_lowercase().starts_with("jsessionid=") {
            continue;
        }
        for attr in parts {
            let Some((name, value)) = attr.split_once('=') else {
                continue;
            };
            if name.eq_ignore_ascii_case("expires") {
                return DateTime::parse_from_rfc2822(value)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc));
            }
        }
    }
    None
}
