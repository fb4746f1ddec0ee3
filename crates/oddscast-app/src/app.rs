//! Application wiring and the trigger loop.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::sink::LogSink;
use chrono::Utc;
use oddscast_alert::{
    build_summary, deliver_summaries, AlertSink, SubscriberStore, SummaryGuard, SwingEvaluator,
    UnsubTokens,
};
use oddscast_chart::ChartService;
use oddscast_engine::Aggregator;
use oddscast_feed::{ExchangeFeed, ForecastFeed, Normalizer};
use oddscast_store::{FileLock, SnapshotStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Main application.
pub struct Application {
    config: AppConfig,
    store: SnapshotStore,
    aggregator: Aggregator,
    chart: ChartService,
    evaluator: SwingEvaluator,
    subscribers: SubscriberStore,
    summary_guard: SummaryGuard,
    sink: Arc<dyn AlertSink>,
}

impl Application {
    /// Wire every component from configuration. No I/O happens here beyond
    /// HTTP client construction.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let store = SnapshotStore::new(&config.data.snapshot_log);
        let timeout = Duration::from_secs(config.feeds.timeout_secs);

        let primary = Arc::new(ForecastFeed::new(
            config.feeds.forecast_url.clone(),
            timeout,
            config.feeds.excluded_terms.clone(),
        )?);
        let secondary = Arc::new(ExchangeFeed::new(
            config.feeds.exchange_url.clone(),
            config.feeds.series_ticker.clone(),
            timeout,
            config.feeds.excluded_terms.clone(),
        )?);
        let normalizer: Normalizer = config.feeds.normalizer.clone().into();

        let aggregator = Aggregator::new(
            store.clone(),
            primary,
            secondary,
            normalizer,
            config.fusion.clone(),
        );
        let chart = ChartService::new(store.clone(), config.chart.clone());
        let evaluator = SwingEvaluator::new(config.alerts.swing.clone());
        let subscribers = SubscriberStore::new(&config.data.subscriber_file);
        let summary_guard = SummaryGuard::new(config.alerts.summary_hour_utc);
        let sink: Arc<dyn AlertSink> = Arc::new(LogSink::new(UnsubTokens::new(
            config.alerts.unsubscribe_secret.clone(),
        )));

        Ok(Self {
            config,
            store,
            aggregator,
            chart,
            evaluator,
            subscribers,
            summary_guard,
            sink,
        })
    }

    /// The chart query surface, shared with read-side callers.
    pub fn chart(&self) -> &ChartService {
        &self.chart
    }

    /// Run the application.
    ///
    /// Attempts leadership via a non-blocking lock on the shared trigger
    /// lock file. The winner runs the trigger loop until ctrl-c; everyone
    /// else logs and stands by so that only one process appends snapshots.
    pub async fn run(mut self) -> AppResult<()> {
        let leader = FileLock::try_acquire(Path::new(&self.config.data.leader_lock))?;
        let Some(_leader) = leader else {
            info!(
                lock = %self.config.data.leader_lock,
                "Another process holds the trigger lock, standing by"
            );
            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received");
            return Ok(());
        };

        info!(
            tick_interval_secs = self.config.scheduler.tick_interval_secs,
            log = %self.config.data.snapshot_log,
            "Trigger lock acquired, entering trigger loop"
        );

        // The first interval tick fires immediately, covering the
        // once-at-startup tick.
        let mut tick_interval = tokio::time::interval(Duration::from_secs(
            self.config.scheduler.tick_interval_secs,
        ));
        let mut summary_interval = tokio::time::interval(Duration::from_secs(
            self.config.scheduler.summary_check_secs,
        ));

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    self.run_tick().await;
                }

                _ = summary_interval.tick() => {
                    self.maybe_send_summary().await;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One trigger-loop iteration: aggregate, persist, evaluate swings.
    /// Failures are logged and absorbed; the loop always continues.
    async fn run_tick(&mut self) {
        let outcome = match self.aggregator.tick().await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return,
            Err(e) => {
                error!(%e, "Tick failed, will retry on the next interval");
                return;
            }
        };

        let Some(previous) = outcome.previous.as_ref() else {
            info!("First snapshot persisted, nothing to compare yet");
            return;
        };

        let subscribers = self.subscribers.load();
        let delivered = self
            .evaluator
            .evaluate(
                previous,
                &outcome.appended,
                &subscribers,
                self.sink.as_ref(),
                Utc::now(),
            )
            .await;
        if delivered > 0 {
            info!(delivered, "Swing notifications dispatched");
        }
    }

    /// Send the daily summary when it is due. The guard is consulted first
    /// so the usual minute check never touches the log.
    async fn maybe_send_summary(&self) {
        let now = Utc::now();
        if !self.summary_guard.try_claim(now) {
            return;
        }

        let snapshots = match self.store.read_all() {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(%e, "Snapshot log unreadable, skipping today's summary");
                return;
            }
        };
        let Some(summary) = build_summary(&snapshots, now) else {
            info!("No snapshot history yet, skipping today's summary");
            return;
        };

        let subscribers = self.subscribers.load();
        let delivered = deliver_summaries(self.sink.as_ref(), &subscribers, &summary).await;
        info!(
            delivered,
            standings = summary.standings.len(),
            "Daily summary dispatched"
        );
    }
}
