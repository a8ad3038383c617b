use crate::{cycle::MatchCycle, service::AlertService};
use alert_core::{feed::SnapshotSource, Timeframe};
use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info};

/// Fetches snapshots and runs a match cycle every `period`, starting
/// immediately. Runs never overlap within one process; a run that overruns
/// its period delays the next tick instead of queueing several.
pub fn spawn_match_job(
    cycle: Arc<MatchCycle>,
    feed: Arc<dyn SnapshotSource>,
    timeframe: Timeframe,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Match job scheduled every {:?} on {}", period, timeframe);

        loop {
            ticker.tick().await;
            debug!("Match job running");
            let snapshots = feed.fetch_snapshots(timeframe).await;
            // Notification tasks are detached; they finish on their own.
            let _ = cycle.run_match_cycle(&snapshots).await;
        }
    })
}

pub fn spawn_cleanup_job(service: Arc<AlertService>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Cleanup job scheduled every {:?}", period);

        loop {
            ticker.tick().await;
            info!("Cleaning triggered alerts");
            let _ = service.clean_triggered_alerts().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{candle, price_rule, Harness};
    use alert_core::{model::Snapshots, Collection};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingFeed {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for CountingFeed {
        async fn fetch_snapshots(&self, _timeframe: Timeframe) -> Snapshots {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Snapshots::from([(
                "BTCUSDT".to_string(),
                vec![candle("BTCUSDT", 1_000, 90.0, 110.0, 100.0, 1.0)],
            )])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_job_runs_on_every_tick() {
        let harness = Harness::new().await;
        harness
            .alerts
            .add_alert(Collection::Working, &price_rule("a", "BTCUSDT", 100.0, true))
            .await
            .unwrap();
        let feed = Arc::new(CountingFeed::default());

        let handle = spawn_match_job(
            Arc::new(harness.cycle()),
            feed.clone(),
            Timeframe::M15,
            Duration::from_secs(900),
        );

        tokio::time::sleep(Duration::from_secs(1_801)).await;
        handle.abort();

        assert_eq!(feed.calls.load(Ordering::SeqCst), 3);
        assert_eq!(harness.alerts.get_alerts(Collection::Triggered).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_job_trims_triggered_collection() {
        let harness = Harness::new().await;
        let mut older = price_rule("old", "BTCUSDT", 100.0, true);
        older.alert_name = "same".to_string();
        older.activation_time = Some(1);
        let mut newer = price_rule("new", "BTCUSDT", 100.0, true);
        newer.alert_name = "same".to_string();
        newer.activation_time = Some(2);
        harness
            .alerts
            .add_many_alerts(Collection::Triggered, &[older, newer])
            .await
            .unwrap();

        let handle = spawn_cleanup_job(Arc::new(harness.service()), Duration::from_secs(7_200));
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.abort();

        let left = harness.alerts.get_alerts(Collection::Triggered);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, "new");
    }
}
