//! oddscast service binary.
//!
//! Wires the snapshot store, the two quote feeds, the aggregation engine,
//! the chart service, and the alert evaluator into one process: a leader
//! elected by an advisory file lock runs the trigger loop, everyone else
//! stands by. Maintenance commands (repair, export, subscriber management)
//! share the same configuration.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod sink;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use logging::init_logging;
pub use sink::LogSink;
