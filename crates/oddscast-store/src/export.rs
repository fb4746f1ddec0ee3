//! CSV rendering of snapshot history.
//!
//! Columns are the sorted union of entity names across the slice; a
//! snapshot that lacks an entity leaves its cell empty rather than
//! repeating a stale value.

use chrono::SecondsFormat;
use oddscast_core::Snapshot;
use std::collections::BTreeSet;

/// Render snapshots as CSV with a `Timestamp` column plus one column per
/// entity ever seen in the slice.
pub fn export_csv(snapshots: &[Snapshot]) -> String {
    let names: BTreeSet<&str> = snapshots
        .iter()
        .flat_map(|s| s.entries.iter().map(|e| e.name.as_str()))
        .collect();

    let mut out = String::new();
    out.push_str("Timestamp");
    for name in &names {
        out.push(',');
        out.push_str(&escape_field(name));
    }
    out.push('\n');

    for snapshot in snapshots {
        out.push_str(
            &snapshot
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        );
        for name in &names {
            out.push(',');
            if let Some(probability) = snapshot.probability_of(name) {
                out.push_str(&format!("{probability}"));
            }
        }
        out.push('\n');
    }
    out
}

/// Quote a field per RFC 4180 when it contains a delimiter, quote, or
/// line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
