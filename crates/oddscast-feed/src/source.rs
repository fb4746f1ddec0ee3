//! Feed trait seams and quote types.
//!
//! The traits abstract the two quote transports, allowing:
//! - Dependency injection for testing
//! - Separation of payload mapping from HTTP plumbing
//! - Additional sources later without touching the engine

use crate::error::{FeedError, FeedResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One entity probability from the primary (forecast-market) feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityQuote {
    /// Raw label as published by the feed.
    pub label: String,
    /// Probability in percent, 0-100.
    pub probability: f64,
}

/// One entity order book from the secondary (exchange) feed.
///
/// Exchange prices arrive in cents and map 1:1 to percentage points.
#[derive(Debug, Clone, PartialEq)]
pub struct BookQuote {
    /// Raw label as published by the feed.
    pub label: String,
    /// Most recent trade price. Zero when the market has never traded.
    pub last_price: f64,
    /// Best yes-side bid. Zero when the side is empty.
    pub bid: f64,
    /// Best yes-side ask. Zero when the side is empty.
    pub ask: f64,
}

/// Source of per-entity outright probabilities.
pub trait ProbabilityFeed: Send + Sync {
    /// Feed name for logging.
    fn name(&self) -> &str;

    /// Fetch current quotes. Errors are values; implementations must never
    /// panic on unreachable or malformed upstreams.
    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<ProbabilityQuote>>>;
}

/// Source of per-entity order-book quotes.
pub trait BookFeed: Send + Sync {
    /// Feed name for logging.
    fn name(&self) -> &str;

    /// Fetch current books. Same error contract as [`ProbabilityFeed`].
    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<BookQuote>>>;
}

/// Scripted probability feed for tests.
///
/// Responses are consumed in push order; an exhausted queue yields an
/// error, standing in for an unreachable upstream.
#[derive(Debug, Default)]
pub struct MockProbabilityFeed {
    responses: Mutex<VecDeque<FeedResult<Vec<ProbabilityQuote>>>>,
}

impl MockProbabilityFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: FeedResult<Vec<ProbabilityQuote>>) {
        self.responses.lock().push_back(response);
    }
}

impl ProbabilityFeed for MockProbabilityFeed {
    fn name(&self) -> &str {
        "mock-probability"
    }

    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<ProbabilityQuote>>> {
        Box::pin(async move {
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Http("mock feed exhausted".to_string())))
        })
    }
}

/// Scripted book feed for tests. Same queue semantics as
/// [`MockProbabilityFeed`].
#[derive(Debug, Default)]
pub struct MockBookFeed {
    responses: Mutex<VecDeque<FeedResult<Vec<BookQuote>>>>,
}

impl MockBookFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: FeedResult<Vec<BookQuote>>) {
        self.responses.lock().push_back(response);
    }
}

impl BookFeed for MockBookFeed {
    fn name(&self) -> &str {
        "mock-book"
    }

    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<BookQuote>>> {
        Box::pin(async move {
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(FeedError::Http("mock feed exhausted".to_string())))
        })
    }
}
