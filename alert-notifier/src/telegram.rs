use crate::{Notification, NotificationChannel};
use alert_core::{config::TelegramConfig, AlertError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug)]
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: Client,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            api_base: TELEGRAM_API.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn send_message(&self, bot_token: &str, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, bot_token);

        let response = self
            .client
            .post(&url)
            .json(&SendMessageParams::html(chat_id, text))
            .send()
            .await
            .map_err(|e| AlertError::Notification(format!("Telegram API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AlertError::Notification(format!(
                "Telegram API returned error: {}",
                error_text
            )));
        }

        Ok(())
    }

    /// Sends with the primary bot; if that fails, the fallback bot relays the
    /// failure together with the original text.
    async fn deliver(&self, chat_id: &str, text: &str) -> Result<()> {
        let Err(primary) = self.send_message(&self.config.bot_token, chat_id, text).await else {
            return Ok(());
        };
        error!("Error sending message with primary bot: {}", primary);

        let Some(fallback_token) = self.config.fallback_bot_token.as_deref() else {
            return Err(primary);
        };

        let relay = fallback_text(&primary.to_string(), text);
        if let Err(e) = self.send_message(fallback_token, chat_id, &relay).await {
            error!("Error sending message with fallback bot: {}", e);
        } else {
            warn!("Primary bot failed, fallback bot relayed the message to {}", chat_id);
        }
        Err(primary)
    }
}

fn fallback_text(error: &str, original: &str) -> String {
    format!("Error: {}\nOriginal message: {}", error, original)
}

#[async_trait]
impl NotificationChannel for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        for chat_id in &self.config.chat_ids {
            match self.deliver(chat_id, &notification.message).await {
                Ok(()) => info!("Telegram notification sent to chat {}", chat_id),
                Err(e) => error!("Failed to send Telegram notification to {}: {}", chat_id, e),
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "Telegram"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.bot_token.is_empty() && !self.config.chat_ids.is_empty()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SendMessageParams {
    chat_id: String,
    text: String,
    parse_mode: Option<String>,
    disable_web_page_preview: Option<bool>,
}

impl SendMessageParams {
    fn html(chat_id: &str, text: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            parse_mode: Some("HTML".to_string()),
            disable_web_page_preview: Some(true),
        }
    }
}
