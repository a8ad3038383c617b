use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;

/// One fixed-interval OHLCV snapshot as served by the kline feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(default)]
    pub symbol: String,
    #[serde(rename = "openTime")]
    pub open_time: i64,
    #[serde(rename = "highPrice")]
    pub high: f64,
    #[serde(rename = "lowPrice")]
    pub low: f64,
    #[serde(rename = "closePrice")]
    pub close: f64,
    #[serde(rename = "baseVolume")]
    pub base_volume: f64,
}

impl Candle {
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Symbol to candles, each sequence in open-time order.
pub type Snapshots = HashMap<String, Vec<Candle>>;

/// Price-level alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    pub id: String,
    #[serde(default)]
    pub alert_name: String,
    #[serde(default)]
    pub action: String,
    pub symbol: String,
    #[serde(default)]
    pub price: Option<f64>,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tv_screens_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_time_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default)]
    pub exchanges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tv_link: Option<String>,
}

/// Alert rule that fires when the VWAP anchored at `anchor_time` is inside the
/// range of the latest candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VwapAlertRule {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    pub id: String,
    pub symbol: String,
    pub is_active: bool,
    #[serde(default)]
    pub anchor_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_time_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_time_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(default)]
    pub tv_screens_urls: Vec<String>,
    #[serde(default)]
    pub exchanges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tv_link: Option<String>,
}

/// Symbol reference metadata used to enrich alerts at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coin {
    pub symbol: String,
    #[serde(default)]
    pub exchanges: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub image_url: String,
}

/// Candidate record submitted for batch creation of price alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertBase {
    pub symbol: String,
    pub alert_name: String,
    #[serde(default)]
    pub action: String,
    pub price: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tv_screens_urls: Vec<String>,
}

/// Operator-recorded VWAP computation start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPoint {
    pub symbol: String,
    pub anchor_time: i64,
    pub timestamp: i64,
}

/// Behaviour shared by every rule type held in an alert repository.
pub trait RuleRecord: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Store namespace; physical collections are `"<NAMESPACE>.<collection>"`.
    const NAMESPACE: &'static str;

    fn id(&self) -> &str;
    fn symbol(&self) -> &str;
    fn is_active(&self) -> bool;
    fn activation_time(&self) -> Option<i64>;

    /// Key under which cleanup keeps only the latest triggered copy.
    fn cleanup_key(&self) -> String;
}

impl RuleRecord for AlertRule {
    const NAMESPACE: &'static str = "alerts";

    fn id(&self) -> &str {
        &self.id
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn activation_time(&self) -> Option<i64> {
        self.activation_time
    }

    fn cleanup_key(&self) -> String {
        self.alert_name.clone()
    }
}

impl RuleRecord for VwapAlertRule {
    const NAMESPACE: &'static str = "vwap-alerts";

    fn id(&self) -> &str {
        &self.id
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    fn activation_time(&self) -> Option<i64> {
        self.activation_time
    }

    fn cleanup_key(&self) -> String {
        match self.anchor_time {
            Some(anchor) => format!("{}:{}", self.symbol, anchor),
            None => self.symbol.clone(),
        }
    }
}
