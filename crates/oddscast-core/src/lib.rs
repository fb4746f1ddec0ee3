//! Core domain types for the oddscast probability tracker.
//!
//! This crate provides the fundamental types shared across the workspace:
//! - `Snapshot`: one timestamped set of per-entity probability estimates
//! - `EntityQuote`: a single entity's fused probability
//! - `time`: the tolerant UTC timestamp codec used by the snapshot log

pub mod time;
pub mod types;

pub use time::parse_flexible;
pub use types::{EntityQuote, Snapshot};
