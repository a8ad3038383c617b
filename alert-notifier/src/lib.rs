pub mod format;
pub mod manager;
pub mod reporter;
pub mod telegram;

use alert_core::{
    model::{AlertRule, VwapAlertRule},
    Result,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    TriggeredAlerts,
    TriggeredVwapAlerts,
    ErrorReport,
}

/// Rendered message plus the records it was built from. `message` is
/// Telegram-flavoured HTML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

impl Notification {
    pub fn triggered_alerts(project: &str, alerts: &[AlertRule], now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now,
            kind: NotificationKind::TriggeredAlerts,
            title: format!("{}: triggered alerts", project),
            message: format::triggered_alerts(project, alerts, now),
            data: serde_json::to_value(alerts).ok(),
        }
    }

    pub fn triggered_vwap_alerts(
        project: &str,
        alerts: &[VwapAlertRule],
        now: DateTime<Utc>,
        report_offset: Duration,
        mobile_url: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now,
            kind: NotificationKind::TriggeredVwapAlerts,
            title: format!("{}: VWAP alerts", project),
            message: format::triggered_vwap_alerts(project, alerts, now + report_offset, mobile_url),
            data: serde_json::to_value(alerts).ok(),
        }
    }

    pub fn error_report(project: &str, scope: &str, error: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: now,
            kind: NotificationKind::ErrorReport,
            title: format!("{}:{}() error", project, scope),
            message: format::error_report(project, scope, error, now),
            data: None,
        }
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync + Debug {
    async fn send(&self, notification: &Notification) -> Result<()>;
    fn name(&self) -> &str;
    fn is_enabled(&self) -> bool;
}
