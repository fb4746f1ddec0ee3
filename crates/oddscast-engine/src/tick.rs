//! Tick orchestration.
//!
//! One tick: fetch both feeds concurrently, key their labels to canonical
//! entities, fuse, soft-normalize, dampen against the last persisted
//! snapshot, and append the result to the store. The in-memory dampening
//! reference updates only after the append succeeds, so it always matches
//! what a reader of the log would see.

use crate::error::EngineResult;
use crate::fusion::{dampen_spikes, fuse_entity, soft_normalize, FusionConfig};
use chrono::{DateTime, Utc};
use oddscast_core::{EntityQuote, Snapshot};
use oddscast_feed::{BookFeed, BookQuote, Normalizer, ProbabilityFeed};
use oddscast_store::SnapshotStore;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// What one successful tick produced, for downstream alert evaluation.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// The snapshot that was the latest before this tick, if any.
    pub previous: Option<Snapshot>,
    /// The snapshot this tick appended.
    pub appended: Snapshot,
    /// Entities whose last trade printed outside its own bid/ask band.
    pub stale_prints: u32,
}

struct PrimaryEntry {
    probability: f64,
    label: String,
}

/// The market aggregation engine. Owns the last-value cache; nothing else
/// reads or writes it.
pub struct Aggregator {
    store: SnapshotStore,
    primary: Arc<dyn ProbabilityFeed>,
    secondary: Arc<dyn BookFeed>,
    normalizer: Normalizer,
    config: FusionConfig,
    /// Last successfully persisted snapshot, the dampening reference.
    last_persisted: Option<Snapshot>,
    cache_primed: bool,
}

impl Aggregator {
    pub fn new(
        store: SnapshotStore,
        primary: Arc<dyn ProbabilityFeed>,
        secondary: Arc<dyn BookFeed>,
        normalizer: Normalizer,
        config: FusionConfig,
    ) -> Self {
        Self {
            store,
            primary,
            secondary,
            normalizer,
            config,
            last_persisted: None,
            cache_primed: false,
        }
    }

    /// Run one aggregation tick at the current instant.
    pub async fn tick(&mut self) -> EngineResult<Option<TickOutcome>> {
        self.tick_at(Utc::now()).await
    }

    /// Run one aggregation tick stamped with `now`.
    ///
    /// Returns `Ok(None)` when the tick is skipped (every feed failed, or
    /// nothing fused to a positive value); feed errors never propagate.
    /// A store append failure does, before the cache is touched.
    pub async fn tick_at(&mut self, now: DateTime<Utc>) -> EngineResult<Option<TickOutcome>> {
        let (primary_result, secondary_result) =
            tokio::join!(self.primary.fetch(), self.secondary.fetch());

        let primary_quotes = match primary_result {
            Ok(quotes) => Some(quotes),
            Err(e) => {
                warn!(feed = self.primary.name(), %e, "Primary feed failed, continuing without it");
                None
            }
        };
        let book_quotes = match secondary_result {
            Ok(quotes) => Some(quotes),
            Err(e) => {
                warn!(feed = self.secondary.name(), %e, "Secondary feed failed, continuing without it");
                None
            }
        };

        if primary_quotes.is_none() && book_quotes.is_none() {
            warn!("All feeds failed, skipping tick to avoid polluting the series");
            return Ok(None);
        }

        let mut primaries: HashMap<String, PrimaryEntry> = HashMap::new();
        for quote in primary_quotes.unwrap_or_default() {
            let key = self.normalizer.canonical_key(&quote.label);
            if key.is_empty() {
                continue;
            }
            primaries.insert(
                key,
                PrimaryEntry {
                    probability: quote.probability,
                    label: quote.label,
                },
            );
        }

        let mut books: HashMap<String, BookQuote> = HashMap::new();
        for quote in book_quotes.unwrap_or_default() {
            let key = self.normalizer.canonical_key(&quote.label);
            if key.is_empty() {
                continue;
            }
            books.insert(key, quote);
        }

        // BTreeSet so entity iteration order is stable across ticks.
        let keys: BTreeSet<&String> = primaries.keys().chain(books.keys()).collect();

        let mut entries = Vec::with_capacity(keys.len());
        let mut stale_prints = 0u32;
        for key in keys {
            let primary = primaries.get(key);
            let book = books.get(key);

            let fused = fuse_entity(primary.map(|p| p.probability), book, &self.config);
            if fused.stale_print {
                stale_prints += 1;
                warn!(
                    entity = %key,
                    last = book.map(|b| b.last_price).unwrap_or_default(),
                    "Last trade outside its own bid/ask band, throttled blend applied"
                );
            }
            if fused.value <= 0.0 {
                continue;
            }

            // Display name prefers the primary feed's label.
            let label = primary
                .map(|p| p.label.as_str())
                .or(book.map(|b| b.label.as_str()))
                .unwrap_or(key);
            entries.push(EntityQuote::new(
                self.normalizer.display_name(label),
                fused.value,
                fused.secondary_active,
            ));
        }

        if entries.is_empty() {
            warn!("Feeds returned no fusable entities, skipping tick");
            return Ok(None);
        }

        soft_normalize(&mut entries, self.config.soft_normalize_strength);

        self.prime_cache();
        let dampened = dampen_spikes(&mut entries, self.last_persisted.as_ref(), self.config.dampening_cap);

        for entry in &mut entries {
            entry.probability = (entry.probability * 10.0).round() / 10.0;
        }

        let mut snapshot = Snapshot::new(now, entries);
        snapshot.sort_entries();

        // Fatal on failure: the cache must never diverge from the log.
        self.store.append(&snapshot)?;
        let previous = self.last_persisted.replace(snapshot.clone());

        info!(
            entries = snapshot.entries.len(),
            stale_prints,
            dampened,
            "Tick appended snapshot"
        );

        Ok(Some(TickOutcome {
            previous,
            appended: snapshot,
            stale_prints,
        }))
    }

    /// Load the dampening reference from the store on first use.
    fn prime_cache(&mut self) {
        if self.cache_primed {
            return;
        }
        self.cache_primed = true;
        match self.store.read_all() {
            Ok(snapshots) => self.last_persisted = snapshots.into_iter().last(),
            Err(e) => warn!(%e, "Could not read store for dampening reference, starting cold"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oddscast_feed::{FeedError, MockBookFeed, MockProbabilityFeed, ProbabilityQuote};
    use tempfile::TempDir;

    struct Fixture {
        _temp_dir: TempDir,
        store: SnapshotStore,
        primary: Arc<MockProbabilityFeed>,
        secondary: Arc<MockBookFeed>,
        aggregator: Aggregator,
    }

    fn fixture(config: FusionConfig) -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(temp_dir.path().join("snapshots.jsonl"));
        let primary = Arc::new(MockProbabilityFeed::new());
        let secondary = Arc::new(MockBookFeed::new());
        let aggregator = Aggregator::new(
            store.clone(),
            primary.clone(),
            secondary.clone(),
            Normalizer::default(),
            config,
        );
        Fixture {
            _temp_dir: temp_dir,
            store,
            primary,
            secondary,
            aggregator,
        }
    }

    fn no_normalization() -> FusionConfig {
        FusionConfig {
            soft_normalize_strength: 0.0,
            ..FusionConfig::default()
        }
    }

    fn prob(label: &str, probability: f64) -> ProbabilityQuote {
        ProbabilityQuote {
            label: label.to_string(),
            probability,
        }
    }

    fn down() -> FeedError {
        FeedError::Http("connection refused".to_string())
    }

    fn at(minute: u32) -> DateTime<Utc> {
        use chrono::TimeZone;
        Utc.with_ymd_and_hms(2026, 1, 30, 12, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_all_feeds_failing_skips_tick() {
        let mut f = fixture(FusionConfig::default());
        f.primary.push(Err(down()));
        f.secondary.push(Err(down()));

        let outcome = f.aggregator.tick_at(at(0)).await.unwrap();
        assert!(outcome.is_none());
        assert_eq!(f.store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_single_feed_failure_degrades_to_other() {
        let mut f = fixture(no_normalization());
        f.primary.push(Ok(vec![prob("Will Jane Doe win?", 41.5)]));
        f.secondary.push(Err(down()));

        let outcome = f.aggregator.tick_at(at(0)).await.unwrap().unwrap();
        assert_eq!(outcome.appended.entries.len(), 1);
        assert_eq!(outcome.appended.entries[0].name, "Jane Doe");
        assert_eq!(outcome.appended.entries[0].probability, 41.5);
        assert!(!outcome.appended.entries[0].secondary_source_active);
        assert_eq!(f.store.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_labels_fuse_across_feeds_by_canonical_key() {
        let mut f = fixture(no_normalization());
        f.primary.push(Ok(vec![prob("Will Jane Doe win the primary?", 40.0)]));
        f.secondary.push(Ok(vec![BookQuote {
            label: "Jane Doe for District 9".to_string(),
            last_price: 42.0,
            bid: 40.0,
            ask: 44.0,
        }]));

        let outcome = f.aggregator.tick_at(at(0)).await.unwrap().unwrap();
        assert_eq!(outcome.appended.entries.len(), 1, "one fused entity, not two");
        let entry = &outcome.appended.entries[0];
        assert_eq!(entry.name, "Jane Doe");
        assert!(entry.secondary_source_active);
        // 0.40*40 + 0.42*42 + 0.12*42 + 0.06*42 = 41.2
        assert_eq!(entry.probability, 41.2);
        assert_eq!(outcome.stale_prints, 0);
    }

    #[tokio::test]
    async fn test_stale_print_counted_in_outcome() {
        let mut f = fixture(no_normalization());
        f.primary.push(Ok(vec![prob("Jane Doe", 40.0)]));
        f.secondary.push(Ok(vec![BookQuote {
            label: "Jane Doe".to_string(),
            last_price: 60.0,
            bid: 40.0,
            ask: 44.0,
        }]));

        let outcome = f.aggregator.tick_at(at(0)).await.unwrap().unwrap();
        assert_eq!(outcome.stale_prints, 1);
    }

    #[tokio::test]
    async fn test_dampens_against_persisted_history_on_first_tick() {
        let f = fixture(no_normalization());
        // Seed the log as if a previous process wrote it.
        f.store
            .append(&Snapshot::new(
                at(0),
                vec![EntityQuote::new("Jane Doe", 10.0, false)],
            ))
            .unwrap();

        let mut f = f;
        f.primary.push(Ok(vec![prob("Jane Doe", 20.0)]));
        f.secondary.push(Err(down()));

        let outcome = f.aggregator.tick_at(at(3)).await.unwrap().unwrap();
        assert_eq!(outcome.appended.entries[0].probability, 13.0);
        assert_eq!(
            outcome.previous.unwrap().entries[0].probability,
            10.0,
            "previous snapshot comes from the store"
        );
    }

    #[tokio::test]
    async fn test_cache_updates_only_after_append() {
        let mut f = fixture(no_normalization());
        f.primary.push(Ok(vec![prob("Jane Doe", 40.0)]));
        f.secondary.push(Err(down()));
        f.primary.push(Ok(vec![prob("Jane Doe", 50.0)]));
        f.secondary.push(Err(down()));

        let first = f.aggregator.tick_at(at(0)).await.unwrap().unwrap();
        assert!(first.previous.is_none());
        assert_eq!(first.appended.entries[0].probability, 40.0);

        let second = f.aggregator.tick_at(at(3)).await.unwrap().unwrap();
        // +10 jump clamps to previous persisted + 3.
        assert_eq!(second.appended.entries[0].probability, 43.0);
        assert_eq!(second.previous.unwrap(), first.appended);

        let stored = f.store.read_all().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].entries[0].probability, 43.0);
    }

    #[tokio::test]
    async fn test_output_sorted_descending_and_rounded() {
        let mut f = fixture(no_normalization());
        f.primary.push(Ok(vec![
            prob("Low Polling", 7.04),
            prob("Jane Doe", 41.46),
            prob("Bob Smith", 22.0),
        ]));
        f.secondary.push(Err(down()));

        let outcome = f.aggregator.tick_at(at(0)).await.unwrap().unwrap();
        let probs: Vec<f64> = outcome
            .appended
            .entries
            .iter()
            .map(|e| e.probability)
            .collect();
        assert_eq!(probs, vec![41.5, 22.0, 7.0]);
    }

    #[tokio::test]
    async fn test_zero_fused_entities_are_dropped() {
        let mut f = fixture(no_normalization());
        f.primary.push(Ok(vec![prob("Jane Doe", 41.5), prob("Ghost", 0.0)]));
        f.secondary.push(Err(down()));

        let outcome = f.aggregator.tick_at(at(0)).await.unwrap().unwrap();
        assert_eq!(outcome.appended.entries.len(), 1);
        assert_eq!(outcome.appended.entries[0].name, "Jane Doe");
    }
}
