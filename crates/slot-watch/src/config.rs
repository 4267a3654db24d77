use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{WatchError, WatchResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Identifier of the person the appointments are searched for
    pub subject_id: i64,

    /// Postal code used to look up nearby locations
    pub region_code: i64,

    /// Base URL of the reservation API
    #[serde(default = "default_reservation_base_url")]
    pub reservation_base_url: String,

    /// Link appended to every notification
    #[serde(default = "default_booking_url")]
    pub booking_url: String,

    /// Extra headers sent with every reservation API request (auth cookies etc.)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    pub telegram: TelegramConfig,

    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token; `TELEGRAM_TOKEN` overrides it when set
    pub token: String,

    /// Chat (numeric id or @channel) that receives the alerts
    pub chat_id: String,

    #[serde(default = "default_telegram_api")]
    pub api_base_url: String,
}

/// Pacing of the poll driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fetch rounds per location per sweep, each one remote page of dates
    #[serde(default = "default_fetch_rounds")]
    pub fetch_rounds: u32,

    /// Upper bound of the random pause before every timeslot request (ms)
    #[serde(default = "default_request_jitter_ms")]
    pub request_jitter_ms: u64,

    /// Fixed pause between sweeps (seconds)
    #[serde(default = "default_sweep_pause_secs")]
    pub sweep_pause_secs: u64,

    /// Upper bound of the random pause added to `sweep_pause_secs` (seconds)
    #[serde(default = "default_sweep_jitter_secs")]
    pub sweep_jitter_secs: u64,

    /// Days added on top of a location's earliest queryable offset
    #[serde(default = "default_start_margin_days")]
    pub start_margin_days: i64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fetch_rounds: default_fetch_rounds(),
            request_jitter_ms: default_request_jitter_ms(),
            sweep_pause_secs: default_sweep_pause_secs(),
            sweep_jitter_secs: default_sweep_jitter_secs(),
            start_margin_days: default_start_margin_days(),
        }
    }
}

impl PollingConfig {
    pub fn request_jitter(&self) -> Duration {
        Duration::from_millis(self.request_jitter_ms)
    }

    pub fn sweep_pause(&self) -> Duration {
        Duration::from_secs(self.sweep_pause_secs)
    }

    pub fn sweep_jitter(&self) -> Duration {
        Duration::from_secs(self.sweep_jitter_secs)
    }
}

fn default_reservation_base_url() -> String {
    "https://emvolio.gov.gr/app/api/CovidService".to_string()
}

fn default_booking_url() -> String {
    "https://emvolio.gov.gr/app".to_string()
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_fetch_rounds() -> u32 {
    2 // roughly one week of dates per round
}

fn default_request_jitter_ms() -> u64 {
    500
}

fn default_sweep_pause_secs() -> u64 {
    10
}

fn default_sweep_jitter_secs() -> u64 {
    10
}

fn default_start_margin_days() -> i64 {
    1
}

impl Config {
    pub fn load(path: &Path) -> WatchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
            config.telegram.token = token;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> WatchResult<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn validate(&self) -> WatchResult<()> {
        if self.telegram.token.trim().is_empty() {
            return Err(WatchError::config("telegram.token must not be empty"));
        }
        if self.telegram.chat_id.trim().is_empty() {
            return Err(WatchError::config("telegram.chat_id must not be empty"));
        }
        if self.polling.fetch_rounds == 0 {
            return Err(WatchError::config("polling.fetch_rounds must be at least 1"));
        }
        Ok(())
    }

    pub fn example() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        headers.insert("cookie".to_string(), "your-session-cookie".to_string());

        Config {
            subject_id: 1234567,
            region_code: 11528,
            reservation_base_url: default_reservation_base_url(),
            booking_url: default_booking_url(),
            headers,
            telegram: TelegramConfig {
                token: "123456:bot-token".to_string(),
                chat_id: "@your-channel".to_string(),
                api_base_url: default_telegram_api(),
            },
            polling: PollingConfig::default(),
        }
    }
}
