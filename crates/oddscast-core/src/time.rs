//! UTC timestamp parsing and the serde codec for the snapshot log.
//!
//! New records are always written as RFC 3339 with an explicit `Z` suffix.
//! Reads stay tolerant: historical lines exist with a numeric offset or with
//! no zone marker at all, and the latter are treated as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse an ISO-8601 instant, assuming UTC when no zone suffix is present.
pub fn parse_flexible(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde codec for snapshot timestamps: `Z`-suffixed RFC 3339 out,
/// zone-optional ISO-8601 in.
pub mod utc_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_flexible(&raw)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_with_z_suffix() {
        let dt = parse_flexible("2026-01-30T12:34:56.789012Z").unwrap();
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.minute(), 34);
    }

    #[test]
    fn test_parse_with_numeric_offset() {
        let dt = parse_flexible("2026-01-30T12:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_without_zone_assumes_utc() {
        let dt = parse_flexible("2026-01-30T12:00:00.500").unwrap();
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse_flexible("not-a-timestamp").is_none());
        assert!(parse_flexible("").is_none());
    }
}
