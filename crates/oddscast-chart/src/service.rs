//! Chart query service with a short-TTL result cache.

use crate::config::ChartConfig;
use crate::pipeline::{downsample, ChartPayload, Window};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use oddscast_store::SnapshotStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cache key: window plus the exact tolerance bit pattern.
type CacheKey = (Window, u64);

struct CacheEntry {
    payload: Arc<ChartPayload>,
    computed_at: Instant,
}

/// Serves downsampled chart payloads over the snapshot store.
///
/// Concurrent-safe: reads take no store lock, and repeat queries for the
/// same (window, tolerance) within the TTL return the identical cached
/// payload. Invalid parameters and unreadable stores degrade to an empty
/// payload rather than an error.
pub struct ChartService {
    store: SnapshotStore,
    config: ChartConfig,
    cache: DashMap<CacheKey, CacheEntry>,
}

impl ChartService {
    pub fn new(store: SnapshotStore, config: ChartConfig) -> Self {
        Self {
            store,
            config,
            cache: DashMap::new(),
        }
    }

    /// Answer a chart query at the current instant.
    pub fn query(&self, window: &str, tolerance: f64) -> Arc<ChartPayload> {
        self.query_at(window, tolerance, Utc::now())
    }

    /// Answer a chart query with an explicit `now` (the window anchor).
    pub fn query_at(&self, window: &str, tolerance: f64, now: DateTime<Utc>) -> Arc<ChartPayload> {
        let Some(window) = Window::parse(window) else {
            warn!(window, "Unknown chart window selector, returning empty payload");
            return Arc::new(ChartPayload::default());
        };
        if !tolerance.is_finite() || tolerance < 0.0 {
            warn!(tolerance, "Invalid chart tolerance, returning empty payload");
            return Arc::new(ChartPayload::default());
        }

        let key: CacheKey = (window, tolerance.to_bits());
        let ttl = Duration::from_secs(self.config.cache_ttl_secs);
        if let Some(entry) = self.cache.get(&key) {
            if entry.computed_at.elapsed() < ttl {
                debug!(?window, tolerance, "Chart cache hit");
                return entry.payload.clone();
            }
        }

        // Sweep expired entries on each miss so one-off tolerances from
        // external queries cannot grow the map without bound.
        self.cache
            .retain(|_, entry| entry.computed_at.elapsed() < ttl);

        let snapshots = match self.store.read_all() {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(%e, "Snapshot store unreadable, returning empty chart payload");
                return Arc::new(ChartPayload::default());
            }
        };

        let payload = Arc::new(downsample(snapshots, window, tolerance, now, &self.config));
        self.cache.insert(
            key,
            CacheEntry {
                payload: payload.clone(),
                computed_at: Instant::now(),
            },
        );
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use oddscast_core::{EntityQuote, Snapshot};
    use tempfile::TempDir;

    fn seeded_service(count: i64) -> (TempDir, ChartService) {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("snapshots.jsonl"));
        let base = Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap();
        for i in 0..count {
            store
                .append(&Snapshot::new(
                    base + ChronoDuration::minutes(i * 3),
                    vec![EntityQuote::new("Jane Doe", 40.0 + (i % 2) as f64, true)],
                ))
                .unwrap();
        }
        let service = ChartService::new(store, ChartConfig::default());
        (temp_dir, service)
    }

    fn now_after(count: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap() + ChronoDuration::minutes(count * 3)
    }

    #[test]
    fn test_repeat_query_returns_cached_payload() {
        let (_dir, service) = seeded_service(10);
        let now = now_after(10);

        let first = service.query_at("all", 0.5, now);
        let second = service.query_at("all", 0.5, now);
        assert!(Arc::ptr_eq(&first, &second), "hit must be the identical payload");

        // Different parameters compute independently.
        let other = service.query_at("all", 1.5, now);
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_invalid_parameters_degrade_to_empty() {
        let (_dir, service) = seeded_service(10);
        let now = now_after(10);

        assert!(service.query_at("fortnight", 0.5, now).snapshots.is_empty());
        assert!(service.query_at("all", -1.0, now).snapshots.is_empty());
        assert!(service.query_at("all", f64::NAN, now).snapshots.is_empty());
    }

    #[test]
    fn test_expired_entries_are_evicted_on_miss() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("snapshots.jsonl"));
        let config = ChartConfig {
            cache_ttl_secs: 0,
            ..ChartConfig::default()
        };
        let service = ChartService::new(store, config);

        // Every entry expires immediately, so distinct tolerances must not
        // accumulate in the map.
        let now = now_after(0);
        for i in 0..5 {
            service.query_at("all", 0.5 + f64::from(i), now);
        }
        assert_eq!(service.cache.len(), 1);
    }

    #[test]
    fn test_missing_store_is_empty_payload() {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("absent.jsonl"));
        let service = ChartService::new(store, ChartConfig::default());
        let payload = service.query("all", 0.5);
        assert!(payload.snapshots.is_empty());
        assert!(payload.gaps.is_empty());
    }

    #[test]
    fn test_query_spans_history() {
        let (_dir, service) = seeded_service(10);
        let payload = service.query_at("all", 0.0, now_after(10));
        assert_eq!(payload.snapshots.len(), 10);
        assert!(payload.gaps.is_empty());
    }
}
