use alert_core::{
    matching::MatchSettings,
    model::{AlertBase, Candle, Coin, Snapshots},
    report::{ErrorReporter, NoopReporter},
    Collection, Result,
};
use alert_engine::{AlertService, CycleSettings, MatchCycle};
use alert_notifier::{manager::NotificationManager, Notification, NotificationChannel};
use alert_store::{
    anchor::AnchorPointRepository, coin::CoinRepository, memory::MemoryStore,
    repository::AlertRepository, DocumentStore,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};

#[derive(Debug, Default, Clone)]
struct Inbox {
    sent: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl NotificationChannel for Inbox {
    async fn send(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "Inbox"
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

fn candle(open_time: i64, low: f64, high: f64) -> Candle {
    Candle {
        symbol: "BTCUSDT".to_string(),
        open_time,
        high,
        low,
        close: (low + high) / 2.0,
        base_volume: 1.0,
    }
}

#[tokio::test(start_paused = true)]
async fn test_batch_match_archive_and_cleanup() {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let reporter: Arc<dyn ErrorReporter> = Arc::new(NoopReporter);

    let alerts = Arc::new(
        AlertRepository::initialize(store.clone(), reporter.clone())
            .await
            .unwrap(),
    );
    let vwap_alerts = Arc::new(
        AlertRepository::initialize(store.clone(), reporter.clone())
            .await
            .unwrap(),
    );
    let coins = Arc::new(
        CoinRepository::initialize(store.clone(), reporter.clone())
            .await
            .unwrap(),
    );
    coins
        .add_coin(&Coin {
            symbol: "BTCUSDT".to_string(),
            exchanges: vec!["Bybit".to_string()],
            category: "major".to_string(),
            image_url: String::new(),
        })
        .await
        .unwrap();

    let service = AlertService::new(
        alerts.clone(),
        vwap_alerts.clone(),
        coins.clone(),
        coins.clone(),
        AnchorPointRepository::new(store.clone()),
        reporter.clone(),
    );

    let inbox = Inbox::default();
    let mut manager = NotificationManager::new();
    manager.add_channel(Box::new(inbox.clone()));
    let cycle = MatchCycle::new(
        MatchSettings::default(),
        CycleSettings {
            project_name: "Levels".to_string(),
            price_notify_delay: Duration::from_secs(10),
            vwap_notify_delay: Duration::ZERO,
            report_offset: chrono::Duration::hours(3),
            alerts_mobile_url: None,
        },
        alerts.clone(),
        vwap_alerts.clone(),
        Arc::new(manager),
        reporter,
    );

    let batch = service
        .add_alerts_batch(
            "working",
            vec![
                AlertBase {
                    symbol: "BTCUSDT".to_string(),
                    alert_name: "range top".to_string(),
                    action: "sell".to_string(),
                    price: 105.0,
                    description: None,
                    tv_screens_urls: Vec::new(),
                },
                AlertBase {
                    symbol: "BTCUSDT".to_string(),
                    alert_name: "far away".to_string(),
                    action: "buy".to_string(),
                    price: 50.0,
                    description: None,
                    tv_screens_urls: Vec::new(),
                },
            ],
        )
        .await;
    assert!(batch.success);
    let created = batch.data.unwrap().alerts;
    assert!(created[0].tv_link.as_deref().unwrap_or_default().contains("BYBIT"));

    let snapshots = Snapshots::from([(
        "BTCUSDT".to_string(),
        vec![candle(1_000, 100.0, 110.0), candle(2_000, 101.0, 109.0)],
    )]);

    // Two cycles over the same window trigger the same rule twice.
    for _ in 0..2 {
        let mut report = cycle.run_match_cycle(&snapshots).await;
        assert_eq!(report.price_triggered, 2);
        report.wait_for_notifications().await;
    }
    assert_eq!(inbox.sent.lock().len(), 2);
    assert_eq!(alerts.get_alerts(Collection::Triggered).len(), 4);

    let cleaned = service.clean_triggered_alerts().await;
    assert_eq!(cleaned.data.map(|report| report.alerts), Some(3));
    assert_eq!(alerts.get_alerts(Collection::Triggered).len(), 1);

    let far_away = created
        .iter()
        .find(|rule| rule.alert_name == "far away")
        .map(|rule| rule.id.clone())
        .unwrap();
    let moved = service
        .move_many("working", "archived", &[far_away])
        .await;
    assert!(moved.success);
    assert_eq!(alerts.get_alerts(Collection::Working).len(), 1);
    assert_eq!(alerts.get_alerts(Collection::Archived).len(), 1);
}
