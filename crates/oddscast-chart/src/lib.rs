//! Chart downsampling for oddscast.
//!
//! Renders arbitrarily long snapshot histories as compact series: window
//! filter, gap detection on the raw series, per-entity EMA smoothing,
//! per-entity polyline simplification, then a minimum-density backfill so
//! charts never starve for points. The pipeline is a pure function of
//! (stored data, window, tolerance, now); the service layer adds a short
//! TTL cache keyed by query parameters.

pub mod config;
pub mod pipeline;
pub mod rdp;
pub mod service;

pub use config::ChartConfig;
pub use pipeline::{downsample, ChartPayload, Gap, Window};
pub use service::ChartService;
