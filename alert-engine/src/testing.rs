use crate::{
    cycle::{CycleSettings, MatchCycle},
    service::AlertService,
};
use alert_core::{
    matching::MatchSettings,
    model::{AlertRule, Candle, Coin, VwapAlertRule},
    report::ErrorReporter,
    Result,
};
use alert_notifier::{manager::NotificationManager, Notification, NotificationChannel};
use alert_store::{
    anchor::AnchorPointRepository, coin::CoinRepository, memory::MemoryStore,
    repository::AlertRepository, DocumentStore,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingChannel {
    pub sent: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "Recording"
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct RecordingReporter {
    pub reports: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl ErrorReporter for RecordingReporter {
    async fn report(&self, scope: &str, error: &str) {
        self.reports
            .lock()
            .push((scope.to_string(), error.to_string()));
    }
}

pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub alerts: Arc<AlertRepository<AlertRule>>,
    pub vwap_alerts: Arc<AlertRepository<VwapAlertRule>>,
    pub coins: Arc<CoinRepository>,
    channel: RecordingChannel,
    reporter: RecordingReporter,
}

impl Harness {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let reporter = RecordingReporter::default();
        let shared: Arc<dyn DocumentStore> = store.clone();
        let reporter_handle: Arc<dyn ErrorReporter> = Arc::new(reporter.clone());

        let alerts = AlertRepository::initialize(shared.clone(), reporter_handle.clone())
            .await
            .unwrap();
        let vwap_alerts = AlertRepository::initialize(shared.clone(), reporter_handle.clone())
            .await
            .unwrap();
        let coins = CoinRepository::initialize(shared, reporter_handle)
            .await
            .unwrap();

        Self {
            store,
            alerts: Arc::new(alerts),
            vwap_alerts: Arc::new(vwap_alerts),
            coins: Arc::new(coins),
            channel: RecordingChannel::default(),
            reporter,
        }
    }

    pub fn cycle(&self) -> MatchCycle {
        let mut manager = NotificationManager::new();
        manager.add_channel(Box::new(self.channel.clone()));

        MatchCycle::new(
            MatchSettings::default(),
            CycleSettings {
                project_name: "Alerts".to_string(),
                price_notify_delay: Duration::from_secs(10),
                vwap_notify_delay: Duration::ZERO,
                report_offset: chrono::Duration::hours(3),
                alerts_mobile_url: None,
            },
            self.alerts.clone(),
            self.vwap_alerts.clone(),
            Arc::new(manager),
            Arc::new(self.reporter.clone()),
        )
    }

    pub fn service(&self) -> AlertService {
        AlertService::new(
            self.alerts.clone(),
            self.vwap_alerts.clone(),
            self.coins.clone(),
            self.coins.clone(),
            AnchorPointRepository::new(self.store.clone()),
            Arc::new(self.reporter.clone()),
        )
    }

    pub async fn seed_coins(&self, symbols: &[&str]) {
        let coins: Vec<Coin> = symbols.iter().map(|symbol| coin(symbol)).collect();
        self.coins.add_many_coins(&coins).await.unwrap();
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.channel.sent.lock().clone()
    }

    pub fn reported(&self) -> Vec<(String, String)> {
        self.reporter.reports.lock().clone()
    }
}

pub(crate) fn coin(symbol: &str) -> Coin {
    Coin {
        symbol: symbol.to_string(),
        exchanges: vec!["Binance".to_string()],
        category: "major".to_string(),
        image_url: format!("https://img/{}.png", symbol),
    }
}

/// Rule whose id and name are both `name`.
pub(crate) fn price_rule(name: &str, symbol: &str, price: f64, active: bool) -> AlertRule {
    AlertRule {
        storage_id: None,
        id: name.to_string(),
        alert_name: name.to_string(),
        action: String::new(),
        symbol: symbol.to_string(),
        price: Some(price),
        is_active: active,
        description: None,
        tv_screens_urls: Vec::new(),
        creation_time: Some(1),
        activation_time: None,
        activation_time_str: None,
        high: None,
        low: None,
        exchanges: Vec::new(),
        category: None,
        image_url: None,
        tv_link: None,
    }
}

pub(crate) fn vwap_rule(id: &str, symbol: &str, anchor_time: i64) -> VwapAlertRule {
    VwapAlertRule {
        storage_id: None,
        id: id.to_string(),
        symbol: symbol.to_string(),
        is_active: true,
        anchor_time: Some(anchor_time),
        anchor_time_str: None,
        anchor_price: None,
        creation_time: Some(1),
        activation_time: None,
        activation_time_str: None,
        high: None,
        low: None,
        tv_screens_urls: Vec::new(),
        exchanges: Vec::new(),
        category: None,
        image_url: None,
        tv_link: None,
    }
}

pub(crate) fn candle(symbol: &str, open_time: i64, low: f64, high: f64, close: f64, volume: f64) -> Candle {
    Candle {
        symbol: symbol.to_string(),
        open_time,
        high,
        low,
        close,
        base_volume: volume,
    }
}
