//! Snapshot and quote types shared across the workspace.
//!
//! The JSON field names (`candidates`, `hasSecondarySource`) are the wire
//! contract of the snapshot log and must not change without a data
//! migration.

use crate::time::utc_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entity's fused probability estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityQuote {
    /// Cleaned display name.
    pub name: String,
    /// Fused probability in percent, 0-100.
    pub probability: f64,
    /// Whether a two-sided secondary book contributed to this value.
    #[serde(rename = "hasSecondarySource", default)]
    pub secondary_source_active: bool,
}

impl EntityQuote {
    pub fn new(name: impl Into<String>, probability: f64, secondary_source_active: bool) -> Self {
        Self {
            name: name.into(),
            probability,
            secondary_source_active,
        }
    }
}

/// One timestamped set of per-entity probability estimates.
///
/// Immutable once appended to the store. The entity set may vary from one
/// snapshot to the next; consumers must not assume a fixed schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Capture instant, always UTC.
    #[serde(with = "utc_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Entries, ordered by descending probability when written by the engine.
    #[serde(rename = "candidates")]
    pub entries: Vec<EntityQuote>,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>, entries: Vec<EntityQuote>) -> Self {
        Self { timestamp, entries }
    }

    /// Look up the probability stored for `name`, if present.
    pub fn probability_of(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.probability)
    }

    /// Sort entries in place by descending probability.
    pub fn sort_entries(&mut self) {
        self.entries.sort_by(|a, b| {
            b.probability
                .partial_cmp(&a.probability)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_snapshot() -> Snapshot {
        Snapshot::new(
            Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap(),
            vec![
                EntityQuote::new("Alice Johnson", 41.5, true),
                EntityQuote::new("Bob Smith", 22.0, false),
            ],
        )
    }

    #[test]
    fn test_wire_format_field_names() {
        let json = serde_json::to_string(&make_snapshot()).unwrap();
        assert!(json.contains("\"candidates\""));
        assert!(json.contains("\"hasSecondarySource\":true"));
        assert!(json.contains("\"timestamp\":\"2026-01-30T12:00:00.000000Z\""));
    }

    #[test]
    fn test_legacy_line_without_zone_or_flag() {
        let line = r#"{"timestamp":"2026-01-30T12:00:00","candidates":[{"name":"Alice Johnson","probability":41.5}]}"#;
        let snapshot: Snapshot = serde_json::from_str(line).unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert!(!snapshot.entries[0].secondary_source_active);
        assert_eq!(
            snapshot.timestamp,
            Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_probability_lookup() {
        let snapshot = make_snapshot();
        assert_eq!(snapshot.probability_of("Bob Smith"), Some(22.0));
        assert_eq!(snapshot.probability_of("Nobody"), None);
    }

    #[test]
    fn test_sort_entries_descending() {
        let mut snapshot = make_snapshot();
        snapshot.entries.reverse();
        snapshot.sort_entries();
        assert_eq!(snapshot.entries[0].name, "Alice Johnson");
    }
}
