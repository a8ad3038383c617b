use crate::Timeframe;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub project_name: String,
    pub database: DatabaseConfig,
    pub feeds: FeedConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL, or `memory` for the in-process store.
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Coin reference endpoint; when absent batch ingestion validates against
    /// the locally stored coins.
    #[serde(default)]
    pub coins_url: Option<String>,
    pub klines: KlineEndpoints,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KlineEndpoints {
    #[serde(default)]
    pub m15: String,
    #[serde(default)]
    pub h1: String,
    #[serde(default)]
    pub h4: String,
}

impl KlineEndpoints {
    pub fn url(&self, timeframe: Timeframe) -> &str {
        match timeframe {
            Timeframe::M15 => &self.m15,
            Timeframe::H1 => &self.h1,
            Timeframe::H4 => &self.h4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub match_interval_secs: u64,
    pub cleanup_interval_secs: u64,
    pub timeframe: Timeframe,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            match_interval_secs: 15 * 60,
            cleanup_interval_secs: 2 * 60 * 60,
            timeframe: Timeframe::M15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub price_activation_offset_secs: i64,
    pub vwap_activation_offset_secs: i64,
    pub price_notify_delay_secs: u64,
    pub vwap_notify_delay_secs: u64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            price_activation_offset_secs: 0,
            vwap_activation_offset_secs: 3 * 60 * 60,
            price_notify_delay_secs: 10,
            vwap_notify_delay_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Shift applied to the report time printed in VWAP reports.
    #[serde(default)]
    pub report_offset_secs: i64,
    #[serde(default)]
    pub alerts_mobile_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    /// Bot used to relay the failure when the primary bot cannot deliver.
    pub fallback_bot_token: Option<String>,
    pub chat_ids: Vec<String>,
    /// Upper bound on a single Bot API request.
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            fallback_bot_token: None,
            chat_ids: Vec::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    10
}
