use crate::{Notification, NotificationChannel};
use tracing::{debug, error, info};

#[derive(Debug, Default)]
pub struct NotificationManager {
    channels: Vec<Box<dyn NotificationChannel>>,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel(&mut self, channel: Box<dyn NotificationChannel>) {
        info!("Notification channel {} registered", channel.name());
        self.channels.push(channel);
    }

    /// Sends through every enabled channel. Channel failures are logged and
    /// never returned.
    pub async fn send_all(&self, notification: &Notification) {
        for channel in self.channels.iter().filter(|c| c.is_enabled()) {
            debug!("Sending notification via {}", channel.name());
            if let Err(e) = channel.send(notification).await {
                error!("Failed to send via {}: {}", channel.name(), e);
            }
        }
    }

    pub fn enabled_channels(&self) -> Vec<String> {
        self.channels
            .iter()
            .filter(|c| c.is_enabled())
            .map(|c| c.name().to_string())
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alert_core::{AlertError, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Default, Clone)]
    pub(crate) struct RecordingChannel {
        pub sent: Arc<Mutex<Vec<Notification>>>,
        pub fail: bool,
        pub disabled: bool,
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        async fn send(&self, notification: &Notification) -> Result<()> {
            if self.fail {
                return Err(AlertError::Notification("channel down".to_string()));
            }
            self.sent.lock().push(notification.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            if self.fail {
                "Failing"
            } else {
                "Recording"
            }
        }

        fn is_enabled(&self) -> bool {
            !self.disabled
        }
    }

    #[tokio::test]
    async fn test_send_all_skips_disabled_and_survives_failures() {
        let recording = RecordingChannel::default();
        let disabled = RecordingChannel {
            disabled: true,
            ..Default::default()
        };
        let failing = RecordingChannel {
            fail: true,
            ..Default::default()
        };

        let mut manager = NotificationManager::new();
        manager.add_channel(Box::new(failing));
        manager.add_channel(Box::new(disabled.clone()));
        manager.add_channel(Box::new(recording.clone()));

        manager
            .send_all(&Notification::error_report("Alerts", "scope", "boom", Utc::now()))
            .await;

        assert_eq!(recording.sent.lock().len(), 1);
        assert!(disabled.sent.lock().is_empty());
        assert_eq!(manager.enabled_channels(), vec!["Failing", "Recording"]);
    }
}
