use alert_core::{
    config::ServiceConfig,
    matching::{dedup_by_symbol, MatchSettings, MatchingEngine},
    model::{AlertRule, Snapshots, VwapAlertRule},
    report::ErrorReporter,
    Collection,
};
use alert_notifier::{manager::NotificationManager, Notification};
use alert_store::repository::AlertRepository;
use chrono::{DateTime, Utc};
use std::{sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Delays and report options for the notifications a cycle schedules.
#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub project_name: String,
    pub price_notify_delay: Duration,
    pub vwap_notify_delay: Duration,
    pub report_offset: chrono::Duration,
    pub alerts_mobile_url: Option<String>,
}

impl From<&ServiceConfig> for CycleSettings {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            project_name: config.project_name.clone(),
            price_notify_delay: Duration::from_secs(config.matching.price_notify_delay_secs),
            vwap_notify_delay: Duration::from_secs(config.matching.vwap_notify_delay_secs),
            report_offset: chrono::Duration::seconds(config.notification.report_offset_secs),
            alerts_mobile_url: config.notification.alerts_mobile_url.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub price_triggered: usize,
    pub vwap_triggered: usize,
    pub errors: Vec<String>,
    /// Notification tasks still sleeping off their delay.
    pub notifications: Vec<JoinHandle<()>>,
}

impl CycleReport {
    pub async fn wait_for_notifications(&mut self) {
        for handle in self.notifications.drain(..) {
            if let Err(e) = handle.await {
                warn!("Notification task ended abnormally: {}", e);
            }
        }
    }
}

/// One pass of the matching pipeline: price rules first, then VWAP rules.
#[derive(Debug)]
pub struct MatchCycle {
    engine: MatchingEngine,
    alerts: Arc<AlertRepository<AlertRule>>,
    vwap_alerts: Arc<AlertRepository<VwapAlertRule>>,
    notifier: Arc<NotificationManager>,
    reporter: Arc<dyn ErrorReporter>,
    settings: CycleSettings,
}

impl MatchCycle {
    pub fn new(
        match_settings: MatchSettings,
        settings: CycleSettings,
        alerts: Arc<AlertRepository<AlertRule>>,
        vwap_alerts: Arc<AlertRepository<VwapAlertRule>>,
        notifier: Arc<NotificationManager>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            engine: MatchingEngine::new(match_settings),
            alerts,
            vwap_alerts,
            notifier,
            reporter,
            settings,
        }
    }

    /// Matches, persists triggered copies and schedules notifications.
    /// Failures are logged, reported and collected; nothing is propagated.
    pub async fn run_match_cycle(&self, snapshots: &Snapshots) -> CycleReport {
        let mut report = CycleReport::default();

        if snapshots.is_empty() {
            warn!("Received empty kline data, skipping match cycle");
            return report;
        }

        let now = Utc::now();
        self.run_price(snapshots, now, &mut report).await;
        self.run_vwap(snapshots, now, &mut report).await;

        info!(
            price = report.price_triggered,
            vwap = report.vwap_triggered,
            errors = report.errors.len(),
            "Match cycle finished"
        );
        report
    }

    async fn run_price(&self, snapshots: &Snapshots, now: DateTime<Utc>, report: &mut CycleReport) {
        let rules = self.alerts.active_alerts(Collection::Working);
        if rules.is_empty() {
            info!("No active alerts found");
            return;
        }

        let triggered = self.engine.match_price(snapshots, &rules, now);
        if triggered.is_empty() {
            info!("No matching alerts found");
            return;
        }

        if let Err(e) = self
            .alerts
            .add_many_alerts(Collection::Triggered, &triggered)
            .await
        {
            self.record_failure("checkKlineAgainstAlerts", e.to_string(), report)
                .await;
            return;
        }
        report.price_triggered = triggered.len();

        let notifier = Arc::clone(&self.notifier);
        let project = self.settings.project_name.clone();
        report.notifications.push(schedule(
            self.settings.price_notify_delay,
            async move {
                let notification = Notification::triggered_alerts(&project, &triggered, Utc::now());
                notifier.send_all(&notification).await;
            },
        ));
    }

    async fn run_vwap(&self, snapshots: &Snapshots, now: DateTime<Utc>, report: &mut CycleReport) {
        let rules = self.vwap_alerts.active_alerts(Collection::Working);
        if rules.is_empty() {
            info!("No active VWAP alerts found");
            return;
        }

        let triggered = dedup_by_symbol(self.engine.match_vwap(snapshots, &rules, now));
        if triggered.is_empty() {
            info!("No matching VWAP alerts found");
            return;
        }

        if let Err(e) = self
            .vwap_alerts
            .add_many_alerts(Collection::Triggered, &triggered)
            .await
        {
            self.record_failure("checkKlineAgainstVwapAlerts", e.to_string(), report)
                .await;
            return;
        }
        report.vwap_triggered = triggered.len();

        let notifier = Arc::clone(&self.notifier);
        let settings = self.settings.clone();
        report.notifications.push(schedule(
            self.settings.vwap_notify_delay,
            async move {
                let notification = Notification::triggered_vwap_alerts(
                    &settings.project_name,
                    &triggered,
                    Utc::now(),
                    settings.report_offset,
                    settings.alerts_mobile_url.as_deref(),
                );
                notifier.send_all(&notification).await;
            },
        ));
    }

    async fn record_failure(&self, scope: &str, error: String, report: &mut CycleReport) {
        error!("{} failed: {}", scope, error);
        self.reporter.report(scope, &error).await;
        report.errors.push(error);
    }
}

fn schedule<F>(delay: Duration, send: F) -> JoinHandle<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        send.await;
    })
}
