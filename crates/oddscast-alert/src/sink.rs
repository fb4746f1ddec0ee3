//! Delivery seam.
//!
//! The evaluator and summary sender hand structured payloads to an
//! [`AlertSink`]; transport and templating live behind it, outside this
//! workspace's scope. [`RecordingSink`] is the test double.

use crate::error::{AlertError, AlertResult};
use crate::evaluator::Swing;
use crate::subscribers::Subscriber;
use crate::summary::DailySummary;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// External delivery collaborator.
pub trait AlertSink: Send + Sync {
    /// Deliver one subscriber's qualifying swings.
    fn deliver_swings<'a>(
        &'a self,
        subscriber: &'a Subscriber,
        swings: &'a [Swing],
    ) -> BoxFuture<'a, AlertResult<()>>;

    /// Deliver one subscriber's daily standings summary.
    fn deliver_summary<'a>(
        &'a self,
        subscriber: &'a Subscriber,
        summary: &'a DailySummary,
    ) -> BoxFuture<'a, AlertResult<()>>;
}

/// Records every delivery; can be told to fail for specific recipients.
#[derive(Debug, Default)]
pub struct RecordingSink {
    swings: Mutex<Vec<(String, Vec<Swing>)>>,
    summaries: Mutex<Vec<(String, DailySummary)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future delivery to `email` fail.
    pub fn fail_for(&self, email: &str) {
        self.failing.lock().insert(email.to_string());
    }

    pub fn swing_deliveries(&self) -> Vec<(String, Vec<Swing>)> {
        self.swings.lock().clone()
    }

    pub fn summary_deliveries(&self) -> Vec<(String, DailySummary)> {
        self.summaries.lock().clone()
    }

    fn check(&self, email: &str) -> AlertResult<()> {
        if self.failing.lock().contains(email) {
            return Err(AlertError::Delivery(format!("forced failure for {email}")));
        }
        Ok(())
    }
}

impl AlertSink for RecordingSink {
    fn deliver_swings<'a>(
        &'a self,
        subscriber: &'a Subscriber,
        swings: &'a [Swing],
    ) -> BoxFuture<'a, AlertResult<()>> {
        Box::pin(async move {
            self.check(&subscriber.email)?;
            self.swings
                .lock()
                .push((subscriber.email.clone(), swings.to_vec()));
            Ok(())
        })
    }

    fn deliver_summary<'a>(
        &'a self,
        subscriber: &'a Subscriber,
        summary: &'a DailySummary,
    ) -> BoxFuture<'a, AlertResult<()>> {
        Box::pin(async move {
            self.check(&subscriber.email)?;
            self.summaries
                .lock()
                .push((subscriber.email.clone(), summary.clone()));
            Ok(())
        })
    }
}
