//! Alert matching against candle snapshots.
//!
//! Everything here is synchronous and free of I/O: callers hand in the
//! snapshots, the rules and the clock reading, and get back freshly minted
//! triggered copies ready to be inserted into the `triggered` collection.

use crate::{
    config::MatchingConfig,
    model::{AlertRule, Candle, RuleRecord, Snapshots, VwapAlertRule},
    time::unix_ms_to_time,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Forward offsets applied to the activation time stamped on triggered copies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchSettings {
    pub price_activation_offset: Duration,
    pub vwap_activation_offset: Duration,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            price_activation_offset: Duration::zero(),
            vwap_activation_offset: Duration::hours(3),
        }
    }
}

impl From<&MatchingConfig> for MatchSettings {
    fn from(config: &MatchingConfig) -> Self {
        Self {
            price_activation_offset: Duration::seconds(config.price_activation_offset_secs),
            vwap_activation_offset: Duration::seconds(config.vwap_activation_offset_secs),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    settings: MatchSettings,
}

impl MatchingEngine {
    pub fn new(settings: MatchSettings) -> Self {
        Self { settings }
    }

    /// Emits one triggered copy per candle whose `[low, high]` contains the
    /// rule price. A rule touched by several candles in the window yields
    /// several copies.
    pub fn match_price(
        &self,
        snapshots: &Snapshots,
        rules: &[AlertRule],
        now: DateTime<Utc>,
    ) -> Vec<AlertRule> {
        let activation_time = (now + self.settings.price_activation_offset).timestamp_millis();
        let activation_time_str = unix_ms_to_time(activation_time);
        let mut triggered = Vec::new();

        for rule in rules.iter().filter(|rule| rule.is_active) {
            let Some(price) = rule.price else {
                continue;
            };
            let Some(candles) = snapshots.get(&rule.symbol) else {
                continue;
            };

            for candle in candles
                .iter()
                .filter(|candle| candle.low <= price && price <= candle.high)
            {
                debug!(
                    symbol = %rule.symbol,
                    price,
                    high = candle.high,
                    low = candle.low,
                    "Price alert matched"
                );
                triggered.push(AlertRule {
                    storage_id: None,
                    id: Uuid::new_v4().to_string(),
                    activation_time: Some(activation_time),
                    activation_time_str: Some(activation_time_str.clone()),
                    high: Some(candle.high),
                    low: Some(candle.low),
                    ..rule.clone()
                });
            }
        }

        triggered
    }

    /// Emits at most one triggered copy per rule, when the VWAP anchored at
    /// the rule's anchor time lies strictly inside the last candle's range.
    pub fn match_vwap(
        &self,
        snapshots: &Snapshots,
        rules: &[VwapAlertRule],
        now: DateTime<Utc>,
    ) -> Vec<VwapAlertRule> {
        let activation_time = (now + self.settings.vwap_activation_offset).timestamp_millis();
        let activation_time_str = unix_ms_to_time(activation_time);
        let mut triggered = Vec::new();

        for rule in rules.iter().filter(|rule| rule.is_active) {
            let Some(anchor_time) = rule.anchor_time else {
                continue;
            };
            let Some(candles) = snapshots.get(&rule.symbol) else {
                continue;
            };
            let Some(last) = candles.last() else {
                continue;
            };
            let Some(vwap) = anchored_vwap(candles, anchor_time) else {
                continue;
            };

            if vwap > last.low && vwap < last.high {
                debug!(
                    symbol = %rule.symbol,
                    anchor_time,
                    vwap,
                    high = last.high,
                    low = last.low,
                    "VWAP alert matched"
                );
                triggered.push(VwapAlertRule {
                    storage_id: None,
                    id: Uuid::new_v4().to_string(),
                    activation_time: Some(activation_time),
                    activation_time_str: Some(activation_time_str.clone()),
                    high: Some(last.high),
                    low: Some(last.low),
                    anchor_price: Some(vwap),
                    ..rule.clone()
                });
            }
        }

        triggered
    }
}

/// Cumulative VWAP over the candles opened in `[anchor_time, last.open_time]`,
/// using the typical price weighted by base volume.
///
/// Returns `None` when no candle falls in the window or the window carries no
/// volume.
pub fn anchored_vwap(candles: &[Candle], anchor_time: i64) -> Option<f64> {
    let last_open = candles.last()?.open_time;

    let (price_volume, volume) = candles
        .iter()
        .filter(|candle| candle.open_time >= anchor_time && candle.open_time <= last_open)
        .fold((0.0, 0.0), |(price_volume, volume), candle| {
            (
                price_volume + candle.typical_price() * candle.base_volume,
                volume + candle.base_volume,
            )
        });

    if volume <= 0.0 {
        return None;
    }

    Some(price_volume / volume)
}

/// Keeps the first rule seen for each symbol, preserving input order.
pub fn dedup_by_symbol<R: RuleRecord>(rules: Vec<R>) -> Vec<R> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| seen.insert(rule.symbol().to_string()))
        .collect()
}
