//! Append-only snapshot log.
//!
//! One JSON object per line. Writers (possibly in different processes) hold
//! an exclusive advisory lock on a sidecar file for the duration of each
//! append, and every record goes out as a single write on an append-mode
//! handle, so readers can never observe an interleaved or partial line from
//! a completed append. Readers take no lock at all and instead skip any
//! line that does not parse.

use crate::error::StoreResult;
use crate::lock::FileLock;
use chrono::Utc;
use oddscast_core::Snapshot;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Outcome of a [`SnapshotStore::repair`] pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Non-blank lines examined.
    pub total: usize,
    /// Lines kept.
    pub kept: usize,
    /// Lines discarded as unreadable.
    pub removed: usize,
    /// Backup of the pre-repair file, present only when lines were removed.
    pub backup_path: Option<PathBuf>,
}

/// Durable, concurrent-safe append-only log of snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    log_path: PathBuf,
    lock_path: PathBuf,
}

/// Classification of a single raw log line.
enum ParsedLine {
    Blank,
    Valid(Snapshot),
}

impl SnapshotStore {
    /// Create a store over the given log path. The sidecar lock file lives
    /// next to the log with a `.lock` suffix.
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        let log_path = log_path.into();
        let lock_path = sidecar(&log_path, ".lock");
        Self {
            log_path,
            lock_path,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Append one snapshot under the inter-process write lock.
    ///
    /// Blocks until the lock is available. The record is flushed and synced
    /// to stable storage before the lock is released; any I/O failure is
    /// propagated to the caller.
    pub fn append(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let _lock = FileLock::acquire(&self.lock_path)?;

        let mut line = serde_json::to_string(snapshot)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_all()?;

        debug!(
            path = %self.log_path.display(),
            entries = snapshot.entries.len(),
            "Appended snapshot"
        );
        Ok(())
    }

    /// Read every parseable snapshot, in file (append) order.
    ///
    /// Lines that are blank, contain embedded NUL bytes (the partial-write
    /// corruption signature), are not valid UTF-8, or fail JSON parsing are
    /// logged and skipped; they never abort the remainder of the read. A
    /// missing log file reads as empty.
    pub fn read_all(&self) -> StoreResult<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        self.for_each_line(|line_no, parsed| match parsed {
            Ok(ParsedLine::Valid(snapshot)) => snapshots.push(snapshot),
            Ok(ParsedLine::Blank) => {}
            Err(reason) => {
                warn!(line = line_no, reason, "Skipping unreadable snapshot line");
            }
        })?;
        Ok(snapshots)
    }

    /// Count parseable lines without keeping records in memory.
    pub fn count(&self) -> StoreResult<usize> {
        let mut count = 0usize;
        self.for_each_line(|_, parsed| {
            if let Ok(ParsedLine::Valid(_)) = parsed {
                count += 1;
            }
        })?;
        Ok(count)
    }

    /// Rewrite the log keeping only readable lines, under the write lock.
    ///
    /// When any line is dropped, the original file is first copied to a
    /// timestamped backup and the cleaned log replaces the original via an
    /// atomic rename. A clean log is left untouched, so repair is idempotent
    /// and safe to run at any time.
    pub fn repair(&self) -> StoreResult<RepairReport> {
        let _lock = FileLock::acquire(&self.lock_path)?;

        let file = match File::open(&self.log_path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(RepairReport {
                    total: 0,
                    kept: 0,
                    removed: 0,
                    backup_path: None,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut kept_lines: Vec<Vec<u8>> = Vec::new();
        let mut total = 0usize;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            match parse_line(&buf) {
                Ok(ParsedLine::Blank) => {}
                Ok(ParsedLine::Valid(_)) => {
                    total += 1;
                    kept_lines.push(trim_line(&buf).to_vec());
                }
                Err(reason) => {
                    total += 1;
                    warn!(reason, "Repair dropping unreadable line");
                }
            }
        }

        let kept = kept_lines.len();
        let removed = total - kept;
        if removed == 0 {
            info!(total, "Snapshot log is clean, nothing to repair");
            return Ok(RepairReport {
                total,
                kept,
                removed,
                backup_path: None,
            });
        }

        let backup_path = sidecar(
            &self.log_path,
            &format!(".corrupt-{}", Utc::now().format("%Y%m%d-%H%M%S")),
        );
        std::fs::copy(&self.log_path, &backup_path)?;

        let tmp_path = sidecar(&self.log_path, ".tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for line in &kept_lines {
                tmp.write_all(line)?;
                tmp.write_all(b"\n")?;
            }
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.log_path)?;

        info!(
            total,
            kept,
            removed,
            backup = %backup_path.display(),
            "Repaired snapshot log"
        );
        Ok(RepairReport {
            total,
            kept,
            removed,
            backup_path: Some(backup_path),
        })
    }

    /// Stream the log line by line, classifying each.
    ///
    /// Byte-level reads so a line of invalid UTF-8 cannot abort the stream.
    /// A mid-stream I/O error is logged and ends the walk early, leaving the
    /// caller with everything read up to that point.
    fn for_each_line<F>(&self, mut visit: F) -> StoreResult<()>
    where
        F: FnMut(usize, Result<ParsedLine, &'static str>),
    {
        let file = match File::open(&self.log_path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut line_no = 0usize;
        loop {
            buf.clear();
            line_no += 1;
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => visit(line_no, parse_line(&buf)),
                Err(e) => {
                    error!(?e, line = line_no, "Snapshot log read failed mid-stream");
                    break;
                }
            }
        }
        Ok(())
    }
}

fn parse_line(raw: &[u8]) -> Result<ParsedLine, &'static str> {
    let trimmed = trim_line(raw);
    if trimmed.is_empty() {
        return Ok(ParsedLine::Blank);
    }
    if trimmed.contains(&0) {
        return Err("embedded NUL bytes");
    }
    let text = std::str::from_utf8(trimmed).map_err(|_| "invalid UTF-8")?;
    serde_json::from_str(text)
        .map(ParsedLine::Valid)
        .map_err(|_| "malformed JSON")
}

fn trim_line(raw: &[u8]) -> &[u8] {
    let start = raw
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(raw.len());
    let end = raw
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &raw[start.min(end)..end]
}

/// Derive a sibling path by appending `suffix` to the full file name.
fn sidecar(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}
