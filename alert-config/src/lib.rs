use alert_core::{config::ServiceConfig, AlertError, Result};
use config::{Config, Environment, File};
use std::path::Path;
use tracing::info;

/// Environment variables override file values, e.g.
/// `PRICE_ALERTS__DATABASE__URL`.
pub const ENV_PREFIX: &str = "PRICE_ALERTS";

pub struct ConfigManager {
    service_config: ServiceConfig,
}

impl ConfigManager {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let service_config = load(Some(path), ENV_PREFIX)?;

        info!("Configuration loaded from {}", path.display());

        Ok(Self { service_config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    pub fn from_env_with_prefix(prefix: &str) -> Result<Self> {
        let service_config = load(None, prefix)?;

        info!("Configuration loaded from environment");

        Ok(Self { service_config })
    }

    pub fn get_config(&self) -> &ServiceConfig {
        &self.service_config
    }

    pub fn validate(&self) -> Result<()> {
        validate(&self.service_config)?;
        info!("Configuration validation passed");
        Ok(())
    }
}

fn load(path: Option<&Path>, env_prefix: &str) -> Result<ServiceConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("notification.telegram.chat_ids"),
        )
        .build()
        .and_then(|config| config.try_deserialize::<ServiceConfig>())
        .map_err(|e| AlertError::Configuration(e.to_string()))
}

fn validate(config: &ServiceConfig) -> Result<()> {
    let invalid = |reason: &str| Err(AlertError::Configuration(reason.to_string()));

    if config.project_name.trim().is_empty() {
        return invalid("Project name not configured");
    }
    if config.database.url.is_empty() {
        return invalid("Database URL not configured");
    }
    if config.feeds.klines.url(config.schedule.timeframe).is_empty() {
        return Err(AlertError::Configuration(format!(
            "No kline endpoint configured for scheduled timeframe {}",
            config.schedule.timeframe
        )));
    }
    if config.schedule.match_interval_secs == 0 || config.schedule.cleanup_interval_secs == 0 {
        return invalid("Job intervals must be positive");
    }
    let telegram = &config.notification.telegram;
    if telegram.enabled && telegram.bot_token.is_empty() {
        return invalid("Telegram is enabled but no bot token is configured");
    }

    Ok(())
}
