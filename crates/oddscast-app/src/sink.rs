//! Log-backed alert delivery.
//!
//! Outbound mail transport is out of scope for this service; qualifying
//! payloads are emitted as structured log events for the delivery worker
//! to pick up, each carrying the recipient's unsubscribe token.

use oddscast_alert::sink::BoxFuture;
use oddscast_alert::{AlertError, AlertResult, AlertSink, DailySummary, Subscriber, Swing, UnsubTokens};
use tracing::info;

/// Delivers alert payloads as structured log events.
pub struct LogSink {
    tokens: UnsubTokens,
}

impl LogSink {
    pub fn new(tokens: UnsubTokens) -> Self {
        Self { tokens }
    }
}

impl AlertSink for LogSink {
    fn deliver_swings<'a>(
        &'a self,
        subscriber: &'a Subscriber,
        swings: &'a [Swing],
    ) -> BoxFuture<'a, AlertResult<()>> {
        Box::pin(async move {
            let payload = serde_json::to_string(swings)
                .map_err(|e| AlertError::Delivery(e.to_string()))?;
            info!(
                email = %subscriber.email,
                threshold = subscriber.threshold,
                unsubscribe_token = %self.tokens.token_for(&subscriber.email),
                %payload,
                "Swing alert"
            );
            Ok(())
        })
    }

    fn deliver_summary<'a>(
        &'a self,
        subscriber: &'a Subscriber,
        summary: &'a DailySummary,
    ) -> BoxFuture<'a, AlertResult<()>> {
        Box::pin(async move {
            let payload = serde_json::to_string(summary)
                .map_err(|e| AlertError::Delivery(e.to_string()))?;
            info!(
                email = %subscriber.email,
                unsubscribe_token = %self.tokens.token_for(&subscriber.email),
                %payload,
                "Daily summary"
            );
            Ok(())
        })
    }
}
