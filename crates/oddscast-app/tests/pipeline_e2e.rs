//! End-to-end pipeline test: three aggregation ticks feed the store, the
//! chart service, and the swing evaluator, with scripted feeds and a
//! recording sink. Soft normalization is disabled so stored values are
//! exact.

use chrono::{DateTime, Duration, TimeZone, Utc};
use oddscast_alert::{RecordingSink, SubscriberStore, SwingConfig, SwingEvaluator};
use oddscast_chart::{ChartConfig, ChartService};
use oddscast_engine::{Aggregator, FusionConfig};
use oddscast_feed::{MockBookFeed, MockProbabilityFeed, NormalizerConfig, ProbabilityQuote};
use oddscast_store::SnapshotStore;
use std::sync::Arc;
use tempfile::TempDir;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap()
}

fn quote(probability: f64) -> Vec<ProbabilityQuote> {
    vec![ProbabilityQuote {
        label: "Jane Doe".to_string(),
        probability,
    }]
}

#[tokio::test]
async fn test_full_pipeline_dampens_charts_and_debounces() {
    let temp_dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(temp_dir.path().join("snapshots.jsonl"));

    // Entity jumps +10 on tick 2; the cap (3.0/tick) spreads it out.
    let primary = Arc::new(MockProbabilityFeed::new());
    primary.push(Ok(quote(40.0)));
    primary.push(Ok(quote(50.0)));
    primary.push(Ok(quote(48.0)));
    let secondary = Arc::new(MockBookFeed::new());
    for _ in 0..3 {
        secondary.push(Ok(Vec::new()));
    }

    let config = FusionConfig {
        soft_normalize_strength: 0.0,
        ..FusionConfig::default()
    };
    let mut aggregator = Aggregator::new(
        store.clone(),
        primary,
        secondary,
        NormalizerConfig::default().into(),
        config,
    );

    let evaluator = SwingEvaluator::new(SwingConfig::default());
    let sink = RecordingSink::new();
    let subscriber_store = SubscriberStore::new(temp_dir.path().join("subscribers.jsonl"));
    subscriber_store
        .add("voter@example.com", 2.0, base())
        .unwrap();
    let subscribers = subscriber_store.load();

    for i in 0..3 {
        let now = base() + Duration::minutes(i * 3);
        let outcome = aggregator.tick_at(now).await.unwrap().expect("tick appends");

        if let Some(previous) = outcome.previous.as_ref() {
            evaluator
                .evaluate(previous, &outcome.appended, &subscribers, &sink, now)
                .await;
        }
    }

    // Spike dampening against the persisted history: 40, then 50 capped to
    // 43, then 48 capped to 43 + 3 = 46.
    let stored = store.read_all().unwrap();
    assert_eq!(stored.len(), 3);
    let values: Vec<f64> = stored
        .iter()
        .map(|s| s.probability_of("Jane Doe").unwrap())
        .collect();
    assert_eq!(values, vec![40.0, 43.0, 46.0]);

    // Tick 2's swing (40 -> 43) notifies; tick 3's equal-sized swing falls
    // inside the debounce window and is suppressed.
    let deliveries = sink.swing_deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "voter@example.com");
    assert_eq!(deliveries[0].1[0].delta, 3.0);
    assert_eq!(deliveries[0].1[0].previous_value, 40.0);
    assert_eq!(deliveries[0].1[0].new_value, 43.0);

    // An "all" chart query spans all three ticks gap-free, clamp visible.
    let chart = ChartService::new(store, ChartConfig::default());
    let now = base() + Duration::minutes(6);
    let payload = chart.query_at("all", 0.0, now);
    assert!(payload.gaps.is_empty());
    assert_eq!(payload.snapshots.len(), 3);
    let first = payload.snapshots[0].probability_of("Jane Doe").unwrap();
    let last = payload.snapshots[2].probability_of("Jane Doe").unwrap();
    assert_eq!(first, 40.0);
    assert!(last > 40.0 && last <= 46.0, "smoothed clamp visible: {last}");

    // Repeat query within the TTL serves the identical cached payload.
    let again = chart.query_at("all", 0.0, now);
    assert!(Arc::ptr_eq(&payload, &again));
}
