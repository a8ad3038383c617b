use crate::{manager::NotificationManager, Notification};
use alert_core::report::ErrorReporter;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Formats operational errors and pushes them through the notification
/// channels.
#[derive(Debug, Clone)]
pub struct NotifierErrorReporter {
    project: String,
    manager: Arc<NotificationManager>,
}

impl NotifierErrorReporter {
    pub fn new(project: impl Into<String>, manager: Arc<NotificationManager>) -> Self {
        Self {
            project: project.into(),
            manager,
        }
    }
}

#[async_trait]
impl ErrorReporter for NotifierErrorReporter {
    async fn report(&self, scope: &str, error: &str) {
        debug!(scope, "Reporting error");
        let notification = Notification::error_report(&self.project, scope, error, Utc::now());
        self.manager.send_all(&notification).await;
    }
}
