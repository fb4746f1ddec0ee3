//! Subscriber records and their flat NDJSON file.
//!
//! The file is small and unindexed: adds append one line, removals rewrite
//! the file. Lines that do not parse are skipped on read and preserved
//! verbatim on rewrite — the store never destroys data it cannot read.

use crate::error::{AlertError, AlertResult};
use chrono::{DateTime, Utc};
use oddscast_core::time::utc_timestamp;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Inclusive threshold bounds, in percentage points.
pub const MIN_THRESHOLD: f64 = 1.0;
pub const MAX_THRESHOLD: f64 = 20.0;

/// One alert subscriber. Email is the unique key, case-folded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    /// Personal swing threshold in percentage points.
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(rename = "subscribedAt", with = "utc_timestamp")]
    pub subscribed_at: DateTime<Utc>,
}

fn default_threshold() -> f64 {
    5.0
}

/// Flat NDJSON subscriber file.
#[derive(Debug, Clone)]
pub struct SubscriberStore {
    path: PathBuf,
}

impl SubscriberStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every parseable subscriber. A missing or unreadable file reads
    /// as empty; bad lines are skipped with a warning.
    pub fn load(&self) -> Vec<Subscriber> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(?e, path = %self.path.display(), "Subscriber file unreadable");
                return Vec::new();
            }
        };

        let mut subscribers = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Subscriber>(line) {
                Ok(subscriber) => subscribers.push(subscriber),
                Err(_) => warn!(line = line_no + 1, "Skipping unreadable subscriber line"),
            }
        }
        subscribers
    }

    /// Add a subscriber, validating email shape, threshold range, and
    /// uniqueness. Appends one line on success.
    pub fn add(&self, email: &str, threshold: f64, now: DateTime<Utc>) -> AlertResult<Subscriber> {
        let email = canonical_email(email);
        if !valid_email(&email) {
            return Err(AlertError::InvalidEmail(email));
        }
        if !(MIN_THRESHOLD..=MAX_THRESHOLD).contains(&threshold) {
            return Err(AlertError::InvalidThreshold(threshold));
        }
        if self.load().iter().any(|s| s.email == email) {
            return Err(AlertError::AlreadySubscribed(email));
        }

        let subscriber = Subscriber {
            email,
            threshold,
            subscribed_at: now,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut line = serde_json::to_string(&subscriber)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(subscriber)
    }

    /// Remove a subscriber by rewriting the file without their record.
    /// Returns whether a record was removed. Unparseable lines survive the
    /// rewrite untouched.
    pub fn remove(&self, email: &str) -> AlertResult<bool> {
        let email = canonical_email(email);
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let mut kept: Vec<&str> = Vec::new();
        let mut found = false;
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Subscriber>(line) {
                Ok(subscriber) if subscriber.email == email => found = true,
                _ => kept.push(line),
            }
        }

        if found {
            let mut contents = kept.join("\n");
            if !contents.is_empty() {
                contents.push('\n');
            }
            std::fs::write(&self.path, contents)?;
        }
        Ok(found)
    }
}

fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only: one `@`, a dotted domain, no whitespace. Real
/// verification happens out of band.
fn valid_email(email: &str) -> bool {
    if email.is_empty() || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 30, 12, 0, 0).unwrap()
    }

    fn store() -> (TempDir, SubscriberStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SubscriberStore::new(temp_dir.path().join("subscribers.jsonl"));
        (temp_dir, store)
    }

    #[test]
    fn test_add_and_load_round_trip() {
        let (_dir, store) = store();
        store.add("Voter@Example.COM", 5.0, now()).unwrap();
        store.add("other@example.com", 2.5, now()).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].email, "voter@example.com", "email is case-folded");
        assert_eq!(loaded[1].threshold, 2.5);
    }

    #[test]
    fn test_wire_format_uses_subscribed_at_key() {
        let (_dir, store) = store();
        store.add("voter@example.com", 5.0, now()).unwrap();
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"subscribedAt\""));
    }

    #[test]
    fn test_add_rejects_invalid_input() {
        let (_dir, store) = store();
        assert!(matches!(
            store.add("not-an-email", 5.0, now()),
            Err(AlertError::InvalidEmail(_))
        ));
        assert!(matches!(
            store.add("a b@example.com", 5.0, now()),
            Err(AlertError::InvalidEmail(_))
        ));
        assert!(matches!(
            store.add("voter@nodot", 5.0, now()),
            Err(AlertError::InvalidEmail(_))
        ));
        assert!(matches!(
            store.add("voter@example.com", 0.5, now()),
            Err(AlertError::InvalidThreshold(_))
        ));
        assert!(matches!(
            store.add("voter@example.com", 25.0, now()),
            Err(AlertError::InvalidThreshold(_))
        ));
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_duplicate_rejected_case_insensitively() {
        let (_dir, store) = store();
        store.add("voter@example.com", 5.0, now()).unwrap();
        assert!(matches!(
            store.add("VOTER@example.com", 3.0, now()),
            Err(AlertError::AlreadySubscribed(_))
        ));
    }

    #[test]
    fn test_remove_preserves_unparseable_lines() {
        let (_dir, store) = store();
        store.add("keep@example.com", 5.0, now()).unwrap();
        {
            use std::io::Write as _;
            let mut file = OpenOptions::new()
                .append(true)
                .open(store.path())
                .unwrap();
            file.write_all(b"this is not json\n").unwrap();
        }
        store.add("drop@example.com", 5.0, now()).unwrap();

        assert!(store.remove("DROP@example.com ").unwrap());
        assert!(!store.remove("drop@example.com").unwrap(), "second remove is a no-op");

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("keep@example.com"));
        assert!(raw.contains("this is not json"), "bad line must survive the rewrite");
        assert!(!raw.contains("drop@example.com"));
        assert_eq!(store.load().len(), 1);
    }

    #[test]
    fn test_missing_file_loads_empty_and_removes_nothing() {
        let (_dir, store) = store();
        assert!(store.load().is_empty());
        assert!(!store.remove("anyone@example.com").unwrap());
    }
}
