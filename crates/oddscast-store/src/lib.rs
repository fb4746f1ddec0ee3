//! Durable snapshot persistence for oddscast.
//!
//! Uses JSON Lines format (.jsonl) for robustness:
//! - Each line is a complete snapshot record
//! - Partial file corruption only affects individual lines
//! - Readers take no lock; writers serialize via an advisory sidecar lock
//! - Can be repaired in place, with a backup, after a crash mid-write

pub mod error;
pub mod export;
pub mod lock;
pub mod log;

pub use error::{StoreError, StoreResult};
pub use export::export_csv;
pub use lock::FileLock;
pub use log::{RepairReport, SnapshotStore};
