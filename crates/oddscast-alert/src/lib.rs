//! Swing alerting for oddscast.
//!
//! Compares each newly appended snapshot with its predecessor, filters the
//! deltas through a global floor, a shared per-entity debounce window, and
//! each subscriber's personal threshold, and hands qualifying payloads to a
//! delivery collaborator. Also owns the subscriber file, unsubscribe token
//! verification, and the once-a-day standings summary. No delivery I/O
//! happens here; everything goes through the [`AlertSink`] seam.

pub mod error;
pub mod evaluator;
pub mod sink;
pub mod subscribers;
pub mod summary;
pub mod token;

pub use error::{AlertError, AlertResult};
pub use evaluator::{Swing, SwingConfig, SwingEvaluator};
pub use sink::{AlertSink, BoxFuture, RecordingSink};
pub use subscribers::{Subscriber, SubscriberStore};
pub use summary::{build_summary, deliver_summaries, DailySummary, Standing, SummaryGuard};
pub use token::UnsubTokens;
