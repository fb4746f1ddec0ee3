//! Daily standings summary.
//!
//! Once a day, the latest snapshot is paired with the one nearest to 24
//! hours earlier and rendered as per-entity standings with a 24h delta.
//! The last-sent guard lives only in process memory; a restart on the send
//! day can re-send, which beats a durable marker nobody cleans up.

use crate::sink::AlertSink;
use crate::subscribers::Subscriber;
use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use oddscast_core::time::utc_timestamp;
use oddscast_core::Snapshot;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

/// One entity's line in the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Standing {
    pub entity: String,
    pub probability: f64,
    /// Change against the snapshot nearest to 24h ago; `None` for entities
    /// with no baseline (new entrants).
    pub delta_24h: Option<f64>,
}

/// The summary payload handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    #[serde(with = "utc_timestamp")]
    pub as_of: DateTime<Utc>,
    /// Standings sorted by descending probability.
    pub standings: Vec<Standing>,
}

/// Build a summary from chronologically ordered snapshots. `None` when the
/// history is empty.
pub fn build_summary(snapshots: &[Snapshot], now: DateTime<Utc>) -> Option<DailySummary> {
    let current = snapshots.last()?;
    let cutoff = now - Duration::hours(24);
    // Latest snapshot at or before the cutoff; absent for young histories.
    let baseline = snapshots.iter().rev().find(|s| s.timestamp <= cutoff);

    let mut standings: Vec<Standing> = current
        .entries
        .iter()
        .map(|entry| Standing {
            entity: entry.name.clone(),
            probability: entry.probability,
            delta_24h: baseline
                .and_then(|b| b.probability_of(&entry.name))
                .map(|old| entry.probability - old),
        })
        .collect();
    standings.sort_by(|a, b| {
        b.probability
            .partial_cmp(&a.probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Some(DailySummary {
        as_of: current.timestamp,
        standings,
    })
}

/// Deliver one summary to every subscriber, isolating failures. Returns
/// the number delivered.
pub async fn deliver_summaries(
    sink: &dyn AlertSink,
    subscribers: &[Subscriber],
    summary: &DailySummary,
) -> usize {
    let mut delivered = 0usize;
    for subscriber in subscribers {
        match sink.deliver_summary(subscriber, summary).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                warn!(email = %subscriber.email, %e, "Summary delivery failed, continuing");
            }
        }
    }
    delivered
}

/// Once-per-day guard for the summary send.
///
/// Claims succeed at or after the configured UTC hour, at most once per
/// calendar day.
#[derive(Debug)]
pub struct SummaryGuard {
    hour_utc: u32,
    last_sent: Mutex<Option<NaiveDate>>,
}

impl SummaryGuard {
    pub fn new(hour_utc: u32) -> Self {
        Self {
            hour_utc,
            last_sent: Mutex::new(None),
        }
    }

    /// Claim today's send. The claim is taken before delivery, so a
    /// partially failed send is not retried within the day.
    pub fn try_claim(&self, now: DateTime<Utc>) -> bool {
        if now.hour() < self.hour_utc {
            return false;
        }
        let today = now.date_naive();
        let mut last_sent = self.last_sent.lock();
        if *last_sent == Some(today) {
            return false;
        }
        *last_sent = Some(today);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use chrono::TimeZone;
    use oddscast_core::EntityQuote;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 30, hour, minute, 0).unwrap()
    }

    fn day_before(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 29, hour, 0, 0).unwrap()
    }

    fn snap(ts: DateTime<Utc>, values: &[(&str, f64)]) -> Snapshot {
        Snapshot::new(
            ts,
            values
                .iter()
                .map(|(name, p)| EntityQuote::new(*name, *p, false))
                .collect(),
        )
    }

    fn subscriber(email: &str) -> Subscriber {
        Subscriber {
            email: email.to_string(),
            threshold: 5.0,
            subscribed_at: at(0, 0),
        }
    }

    #[test]
    fn test_summary_computes_24h_deltas() {
        let snapshots = vec![
            snap(day_before(10), &[("Jane Doe", 38.0), ("Bob Smith", 25.0)]),
            snap(day_before(13), &[("Jane Doe", 39.0), ("Bob Smith", 24.0)]),
            snap(at(12, 0), &[("Bob Smith", 22.0), ("Jane Doe", 41.5), ("Newcomer", 6.0)]),
        ];

        let summary = build_summary(&snapshots, at(13, 30)).unwrap();
        assert_eq!(summary.as_of, at(12, 0));
        // Sorted descending; baseline is the day-before 13:00 snapshot
        // (latest at or before the 24h cutoff).
        assert_eq!(summary.standings[0].entity, "Jane Doe");
        assert_eq!(summary.standings[0].delta_24h, Some(2.5));
        assert_eq!(summary.standings[1].entity, "Bob Smith");
        assert_eq!(summary.standings[1].delta_24h, Some(-2.0));
        assert_eq!(summary.standings[2].entity, "Newcomer");
        assert_eq!(summary.standings[2].delta_24h, None);
    }

    #[test]
    fn test_summary_without_baseline_or_history() {
        assert!(build_summary(&[], at(13, 0)).is_none());

        // Young history: every delta is None.
        let snapshots = vec![snap(at(12, 0), &[("Jane Doe", 41.5)])];
        let summary = build_summary(&snapshots, at(13, 0)).unwrap();
        assert_eq!(summary.standings[0].delta_24h, None);
    }

    #[test]
    fn test_guard_claims_once_per_day_after_hour() {
        let guard = SummaryGuard::new(13);
        assert!(!guard.try_claim(at(12, 59)), "before the hour");
        assert!(guard.try_claim(at(13, 0)));
        assert!(!guard.try_claim(at(13, 1)), "already claimed today");
        assert!(!guard.try_claim(at(18, 0)));

        let next_day = Utc.with_ymd_and_hms(2026, 1, 31, 13, 0, 0).unwrap();
        assert!(guard.try_claim(next_day));
    }

    #[tokio::test]
    async fn test_delivery_failure_is_isolated() {
        let sink = RecordingSink::new();
        sink.fail_for("broken@example.com");
        let subscribers = vec![
            subscriber("broken@example.com"),
            subscriber("fine@example.com"),
        ];
        let snapshots = vec![snap(at(12, 0), &[("Jane Doe", 41.5)])];
        let summary = build_summary(&snapshots, at(13, 0)).unwrap();

        let delivered = deliver_summaries(&sink, &subscribers, &summary).await;
        assert_eq!(delivered, 1);
        assert_eq!(sink.summary_deliveries()[0].0, "fine@example.com");
    }
}
