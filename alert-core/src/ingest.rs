//! Validation and materialization of batch-submitted price alerts.

use crate::model::{AlertBase, AlertRule, Coin};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

const DEFAULT_DESCRIPTION: &str = "Yet nothing to say";

/// Alerts built from a batch, plus the candidate symbols that had no coin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatedAlerts {
    pub alerts: Vec<AlertRule>,
    pub unmatched: Vec<String>,
}

/// Candidate symbols that do not appear in the coin reference set, in
/// candidate order.
pub fn find_corrupted_symbols(candidates: &[AlertBase], coins: &[Coin]) -> Vec<String> {
    let known: HashSet<&str> = coins.iter().map(|coin| coin.symbol.as_str()).collect();
    candidates
        .iter()
        .filter(|base| !known.contains(base.symbol.as_str()))
        .map(|base| base.symbol.clone())
        .collect()
}

/// Joins each candidate with its coin. Candidates without a coin are skipped
/// and reported in [`CreatedAlerts::unmatched`].
pub fn create_alerts(bases: &[AlertBase], coins: &[Coin], now: DateTime<Utc>) -> CreatedAlerts {
    let by_symbol: HashMap<&str, &Coin> = coins
        .iter()
        .map(|coin| (coin.symbol.as_str(), coin))
        .collect();
    let creation_time = now.timestamp_millis();
    let mut created = CreatedAlerts::default();

    for base in bases {
        let Some(coin) = by_symbol.get(base.symbol.as_str()) else {
            warn!(symbol = %base.symbol, "Coin not found, alert skipped");
            created.unmatched.push(base.symbol.clone());
            continue;
        };

        let tv_link = trading_view_link(&base.symbol, &coin.exchanges);
        created.alerts.push(AlertRule {
            storage_id: None,
            id: Uuid::new_v4().to_string(),
            alert_name: base.alert_name.clone(),
            action: base.action.clone(),
            symbol: base.symbol.clone(),
            price: Some(base.price),
            is_active: true,
            description: Some(
                base.description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            ),
            tv_screens_urls: base.tv_screens_urls.clone(),
            creation_time: Some(creation_time),
            activation_time: None,
            activation_time_str: None,
            high: None,
            low: None,
            exchanges: coin.exchanges.clone(),
            category: Some(coin.category.clone()),
            image_url: Some(coin.image_url.clone()),
            tv_link: (!tv_link.is_empty()).then_some(tv_link),
        });
    }

    created
}

/// TradingView chart URL for a perpetual listed on one of the supported
/// exchanges, preferring Bybit, then Binance, then BingX. Empty when none
/// applies.
pub fn trading_view_link(symbol: &str, exchanges: &[String]) -> String {
    let listed = |name: &str| exchanges.iter().any(|exchange| exchange == name);

    if listed("Bybit") {
        format!("https://www.tradingview.com/chart?symbol=BYBIT:{}.P", symbol)
    } else if listed("Binance") {
        format!("https://www.tradingview.com/chart?symbol=BINANCE:{}.P", symbol)
    } else if listed("BingX SF") {
        format!("https://www.tradingview.com/chart?symbol=BINGX:{}.PS", symbol)
    } else if listed("BingX PF") {
        format!("https://www.tradingview.com/chart?symbol=BINGX:{}.P", symbol)
    } else {
        String::new()
    }
}
