//! The downsampling pipeline.
//!
//! A pure function of (snapshots, window, tolerance, now). Order matters:
//! gaps are detected on the raw filtered series before smoothing, EMA runs
//! before simplification, and density backfill runs last over the union of
//! every entity's kept points.

use crate::config::ChartConfig;
use crate::rdp;
use chrono::{DateTime, Duration, Utc};
use oddscast_core::time::utc_timestamp;
use oddscast_core::Snapshot;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Query time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    /// Trailing 24 hours.
    Day,
    /// Trailing 7 days.
    Week,
    /// Everything stored.
    All,
}

impl Window {
    /// Parse the wire selector. Unknown selectors are invalid queries, not
    /// errors; the caller degrades to an empty payload.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1d" => Some(Self::Day),
            "7d" => Some(Self::Week),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Day => Some(now - Duration::hours(24)),
            Self::Week => Some(now - Duration::days(7)),
            Self::All => None,
        }
    }
}

/// A real discontinuity in the raw series. Charts render these as breaks;
/// nothing ever interpolates across one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gap {
    #[serde(with = "utc_timestamp")]
    pub start: DateTime<Utc>,
    #[serde(with = "utc_timestamp")]
    pub end: DateTime<Utc>,
}

/// What a chart query returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartPayload {
    pub snapshots: Vec<Snapshot>,
    pub gaps: Vec<Gap>,
}

/// Downsample `snapshots` for rendering.
pub fn downsample(
    mut snapshots: Vec<Snapshot>,
    window: Window,
    tolerance: f64,
    now: DateTime<Utc>,
    config: &ChartConfig,
) -> ChartPayload {
    // Store order is chronological by invariant, but merged or imported
    // files may not be.
    snapshots.sort_by_key(|s| s.timestamp);

    if let Some(cutoff) = window.cutoff(now) {
        snapshots.retain(|s| s.timestamp >= cutoff);
    }
    if snapshots.is_empty() {
        return ChartPayload::default();
    }

    let gaps = detect_gaps(&snapshots, config.gap_threshold_secs);
    smooth(&mut snapshots, config.ema_alpha);

    let kept = kept_indices(&snapshots, tolerance);
    let kept = backfill_density(&snapshots, kept, config.density_interval_secs);

    ChartPayload {
        snapshots: kept.into_iter().map(|i| snapshots[i].clone()).collect(),
        gaps,
    }
}

/// Consecutive spacing beyond the threshold on the raw series.
fn detect_gaps(snapshots: &[Snapshot], threshold_secs: i64) -> Vec<Gap> {
    snapshots
        .windows(2)
        .filter(|w| (w[1].timestamp - w[0].timestamp).num_seconds() > threshold_secs)
        .map(|w| Gap {
            start: w[0].timestamp,
            end: w[1].timestamp,
        })
        .collect()
}

/// Per-entity exponential moving average, in place. The first observation
/// seeds the average unsmoothed; smoothed values round to one decimal to
/// match the stored granularity.
fn smooth(snapshots: &mut [Snapshot], alpha: f64) {
    let mut state: HashMap<String, f64> = HashMap::new();
    for snapshot in snapshots {
        for entry in &mut snapshot.entries {
            let smoothed = match state.get(&entry.name) {
                Some(&running) => alpha * entry.probability + (1.0 - alpha) * running,
                None => entry.probability,
            };
            state.insert(entry.name.clone(), smoothed);
            entry.probability = (smoothed * 10.0).round() / 10.0;
        }
    }
}

/// Simplify each entity's polyline independently and union the survivors,
/// always keeping the series' global endpoints.
///
/// The time axis normalizes to 0-100 over the window, the same scale as
/// probability, so one tolerance governs both axes.
fn kept_indices(snapshots: &[Snapshot], tolerance: f64) -> BTreeSet<usize> {
    let mut kept = BTreeSet::new();
    kept.insert(0);
    kept.insert(snapshots.len() - 1);

    let t_first = snapshots[0].timestamp.timestamp() as f64;
    let t_last = snapshots[snapshots.len() - 1].timestamp.timestamp() as f64;
    let t_range = if t_last > t_first { t_last - t_first } else { 1.0 };

    let entities: BTreeSet<&str> = snapshots
        .iter()
        .flat_map(|s| s.entries.iter().map(|e| e.name.as_str()))
        .collect();

    for entity in entities {
        let mut points: Vec<rdp::Point> = Vec::new();
        let mut index_map: Vec<usize> = Vec::new();
        for (i, snapshot) in snapshots.iter().enumerate() {
            if let Some(probability) = snapshot.probability_of(entity) {
                let x = ((snapshot.timestamp.timestamp() as f64 - t_first) / t_range) * 100.0;
                points.push((x, probability));
                index_map.push(i);
            }
        }
        if points.len() > 2 {
            for ri in rdp::simplify(&points, tolerance) {
                kept.insert(index_map[ri]);
            }
        }
    }

    kept
}

/// Reinsert originally sampled points so no kept-to-kept spacing exceeds
/// the interval. Only points that actually exist are inserted; real gaps
/// stay gaps.
fn backfill_density(
    snapshots: &[Snapshot],
    kept: BTreeSet<usize>,
    interval_secs: i64,
) -> BTreeSet<usize> {
    // A non-positive interval means no density floor.
    if interval_secs <= 0 {
        return kept;
    }

    let ordered: Vec<usize> = kept.iter().copied().collect();
    let mut filled = kept;

    for pair in ordered.windows(2) {
        let (i1, i2) = (pair[0], pair[1]);
        let t1 = snapshots[i1].timestamp;
        let spacing = (snapshots[i2].timestamp - t1).num_seconds();
        if spacing <= interval_secs {
            continue;
        }
        let needed = spacing / interval_secs;
        let mut scan = i1 + 1;
        for j in 1..=needed {
            let target = t1 + Duration::seconds(j * interval_secs);
            while scan < i2 && snapshots[scan].timestamp < target {
                scan += 1;
            }
            if scan < i2 {
                filled.insert(scan);
            }
        }
    }

    filled
}
