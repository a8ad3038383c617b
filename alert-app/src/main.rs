use alert_config::ConfigManager;
use alert_core::{
    config::{NotificationConfig, ServiceConfig},
    feed::{CoinSource, HttpCoinSource, HttpSnapshotFeed, SnapshotSource},
    matching::MatchSettings,
    report::{ErrorReporter, NoopReporter},
};
use alert_engine::{
    scheduler::{spawn_cleanup_job, spawn_match_job},
    AlertService, CycleSettings, MatchCycle,
};
use alert_notifier::{
    manager::NotificationManager, reporter::NotifierErrorReporter, telegram::TelegramNotifier,
};
use alert_store::{
    anchor::AnchorPointRepository, coin::CoinRepository, memory::MemoryStore,
    postgres::PgDocumentStore, repository::AlertRepository, DocumentStore,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const MEMORY_STORE_URL: &str = "memory";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", env = "PRICE_ALERTS_CONFIG")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Disable notifications and error reports
    #[arg(long)]
    no_notifications: bool,

    /// Run a single match cycle and exit
    #[arg(long)]
    once: bool,

    /// Use the in-process store instead of PostgreSQL
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.debug, args.json_logs);

    info!("Starting price alert service");

    let config_manager = if args.config.exists() {
        ConfigManager::from_file(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    } else {
        warn!("{} not found, reading configuration from the environment", args.config.display());
        ConfigManager::from_env().context("Failed to load configuration from the environment")?
    };
    config_manager.validate()?;
    let config = config_manager.get_config().clone();

    let store = init_store(&config, args.memory).await?;

    let notifier = Arc::new(if args.no_notifications {
        NotificationManager::new()
    } else {
        init_notifications(&config.notification)?
    });
    let reporter: Arc<dyn ErrorReporter> = if args.no_notifications {
        Arc::new(NoopReporter)
    } else {
        Arc::new(NotifierErrorReporter::new(
            config.project_name.clone(),
            notifier.clone(),
        ))
    };

    let alerts = Arc::new(
        AlertRepository::initialize(store.clone(), reporter.clone())
            .await
            .context("Failed to load alert rules")?,
    );
    let vwap_alerts = Arc::new(
        AlertRepository::initialize(store.clone(), reporter.clone())
            .await
            .context("Failed to load VWAP alert rules")?,
    );
    let coins = Arc::new(
        CoinRepository::initialize(store.clone(), reporter.clone())
            .await
            .context("Failed to load coins")?,
    );
    info!("Repositories initialized");

    let coin_source: Arc<dyn CoinSource> = match &config.feeds.coins_url {
        Some(url) => Arc::new(HttpCoinSource::new(url.clone(), config.feeds.timeout_secs)?),
        None => coins.clone(),
    };
    let feed: Arc<dyn SnapshotSource> =
        Arc::new(HttpSnapshotFeed::new(&config.feeds, reporter.clone())?);

    let service = Arc::new(AlertService::new(
        alerts.clone(),
        vwap_alerts.clone(),
        coins,
        coin_source,
        AnchorPointRepository::new(store),
        reporter.clone(),
    ));
    let cycle = Arc::new(MatchCycle::new(
        MatchSettings::from(&config.matching),
        CycleSettings::from(&config),
        alerts,
        vwap_alerts,
        notifier,
        reporter,
    ));

    let timeframe = config.schedule.timeframe;

    if args.once {
        let snapshots = feed.fetch_snapshots(timeframe).await;
        let mut report = cycle.run_match_cycle(&snapshots).await;
        report.wait_for_notifications().await;
        info!(
            price = report.price_triggered,
            vwap = report.vwap_triggered,
            "Single match cycle complete"
        );
        if !report.errors.is_empty() {
            warn!("Match cycle finished with {} errors", report.errors.len());
        }
        return Ok(());
    }

    let match_job = spawn_match_job(
        cycle,
        feed,
        timeframe,
        Duration::from_secs(config.schedule.match_interval_secs),
    );
    let cleanup_job = spawn_cleanup_job(
        service,
        Duration::from_secs(config.schedule.cleanup_interval_secs),
    );

    // Set up graceful shutdown
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }

    match_job.abort();
    cleanup_job.abort();

    info!("Price alert service stopped");

    Ok(())
}

fn init_logging(debug: bool, json: bool) {
    let env_filter = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn init_store(config: &ServiceConfig, force_memory: bool) -> Result<Arc<dyn DocumentStore>> {
    if force_memory || config.database.url == MEMORY_STORE_URL {
        warn!("Using the in-process store; nothing will be persisted");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgDocumentStore::connect(&config.database)
        .await
        .context("Failed to connect to the database")?;
    store.run_migrations().await?;

    info!("Database initialized successfully");
    Ok(Arc::new(store))
}

fn init_notifications(config: &NotificationConfig) -> Result<NotificationManager> {
    let mut manager = NotificationManager::new();

    if config.telegram.enabled {
        let telegram = TelegramNotifier::new(config.telegram.clone())
            .context("Failed to build the Telegram client")?;
        manager.add_channel(Box::new(telegram));
    }

    info!(channels = ?manager.enabled_channels(), "Notification manager initialized");
    Ok(manager)
}
