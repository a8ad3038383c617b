//! Market snapshot and coin reference feeds.

use crate::{
    config::{FeedConfig, KlineEndpoints},
    model::{Candle, Coin, Snapshots},
    report::ErrorReporter,
    AlertError, Result, Timeframe,
};
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use serde_json::Value;
use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};
use tracing::{error, info, warn};

/// Source of candle snapshots. Fail-soft: errors surface as an empty map.
#[async_trait]
pub trait SnapshotSource: Send + Sync + Debug {
    async fn fetch_snapshots(&self, timeframe: Timeframe) -> Snapshots;
}

/// Source of the coin reference set. Fails closed.
#[async_trait]
pub trait CoinSource: Send + Sync + Debug {
    async fn fetch_coins(&self) -> Result<Vec<Coin>>;
}

#[derive(Debug, Deserialize)]
struct SymbolKlines {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(rename = "klineData", default)]
    kline_data: Option<Vec<Candle>>,
}

#[derive(Debug, Deserialize)]
struct CoinsResponse {
    coins: Vec<Coin>,
}

#[derive(Debug)]
pub struct HttpSnapshotFeed {
    client: Client,
    endpoints: KlineEndpoints,
    reporter: Arc<dyn ErrorReporter>,
}

impl HttpSnapshotFeed {
    pub fn new(config: &FeedConfig, reporter: Arc<dyn ErrorReporter>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoints: config.klines.clone(),
            reporter,
        })
    }

    async fn try_fetch(&self, timeframe: Timeframe) -> Result<Snapshots> {
        let url = self.endpoints.url(timeframe);
        if url.is_empty() {
            return Err(AlertError::Configuration(format!(
                "No kline endpoint configured for {}",
                timeframe
            )));
        }

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AlertError::Feed(format!(
                "Kline feed returned HTTP {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        parse_kline_response(body)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotFeed {
    async fn fetch_snapshots(&self, timeframe: Timeframe) -> Snapshots {
        match self.try_fetch(timeframe).await {
            Ok(snapshots) => {
                info!("Fetched {} kline snapshots for {}", snapshots.len(), timeframe);
                snapshots
            }
            Err(e) => {
                error!("Failed to fetch kline data for {}: {}", timeframe, e);
                self.reporter
                    .report("fetchSnapshots", &e.to_string())
                    .await;
                HashMap::new()
            }
        }
    }
}

/// Unwraps `{ "<timeframe key>": [ { "symbol": ..., "klineData": [...] } ] }`.
///
/// Only the first key in document order is read. Entries without a symbol or
/// candle list, or that fail to decode, are skipped; candles inherit the entry
/// symbol when they carry none.
pub fn parse_kline_response(body: Value) -> Result<Snapshots> {
    let entries = body
        .as_object()
        .and_then(|object| object.values().next())
        .and_then(Value::as_array)
        .ok_or_else(|| AlertError::Feed("Invalid kline response format".to_string()))?;

    let mut snapshots = Snapshots::new();
    for entry in entries {
        let parsed = match serde_json::from_value::<SymbolKlines>(entry.clone()) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Skipping malformed kline entry: {}", e);
                continue;
            }
        };
        let (Some(symbol), Some(mut candles)) = (parsed.symbol, parsed.kline_data) else {
            continue;
        };
        for candle in candles.iter_mut().filter(|c| c.symbol.is_empty()) {
            candle.symbol = symbol.clone();
        }
        snapshots.insert(symbol, candles);
    }

    Ok(snapshots)
}

#[derive(Debug)]
pub struct HttpCoinSource {
    client: Client,
    url: String,
}

impl HttpCoinSource {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CoinSource for HttpCoinSource {
    async fn fetch_coins(&self) -> Result<Vec<Coin>> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AlertError::Feed(format!(
                "Coin feed returned HTTP {}",
                response.status()
            )));
        }

        let body: CoinsResponse = response.json().await?;
        Ok(body.coins)
    }
}
