//! HTTP client for the primary forecast-market feed.
//!
//! The upstream is a play-money forecast API exposing one multiple-choice
//! market; each answer carries an outright probability in [0, 1].

use crate::error::{FeedError, FeedResult};
use crate::source::{BoxFuture, ProbabilityFeed, ProbabilityQuote};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Default timeout for feed requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Catch-all answer the forecast API appends to multiple-choice markets;
/// never a real entity.
const CATCH_ALL_LABEL: &str = "Other";

#[derive(Debug, Deserialize)]
struct ForecastMarket {
    #[serde(default)]
    answers: Vec<ForecastAnswer>,
}

#[derive(Debug, Deserialize)]
struct ForecastAnswer {
    #[serde(default)]
    text: String,
    /// Probability in [0, 1].
    #[serde(default)]
    probability: f64,
}

/// Client for the forecast-market API (primary feed).
pub struct ForecastFeed {
    client: Client,
    market_url: String,
    excluded_terms: Vec<String>,
}

impl ForecastFeed {
    /// Create a new forecast feed client.
    ///
    /// `market_url` is the full market endpoint
    /// (e.g., "https://api.manifold.markets/v0/slug/<market-slug>").
    /// Labels containing any of `excluded_terms` (case-insensitive) are
    /// dropped before they reach the engine.
    pub fn new(
        market_url: impl Into<String>,
        timeout: Duration,
        excluded_terms: Vec<String>,
    ) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            market_url: market_url.into(),
            excluded_terms: excluded_terms.iter().map(|t| t.to_lowercase()).collect(),
        })
    }

    async fn fetch_quotes(&self) -> FeedResult<Vec<ProbabilityQuote>> {
        debug!(url = %self.market_url, "Fetching forecast market");

        let response = self
            .client
            .get(&self.market_url)
            .send()
            .await
            .map_err(|e| FeedError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Http(format!("HTTP {status}: {body}")));
        }

        let market: ForecastMarket = response
            .json()
            .await
            .map_err(|e| FeedError::Payload(format!("Failed to parse forecast market: {e}")))?;

        Ok(map_answers(market, &self.excluded_terms))
    }
}

impl ProbabilityFeed for ForecastFeed {
    fn name(&self) -> &str {
        "forecast"
    }

    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<ProbabilityQuote>>> {
        Box::pin(self.fetch_quotes())
    }
}

/// Map a market payload to quotes, dropping the catch-all answer and
/// excluded labels. Probabilities scale to percent, rounded to one decimal.
fn map_answers(market: ForecastMarket, excluded_terms: &[String]) -> Vec<ProbabilityQuote> {
    market
        .answers
        .into_iter()
        .filter(|answer| {
            answer.text != CATCH_ALL_LABEL && !is_excluded(&answer.text, excluded_terms)
        })
        .map(|answer| ProbabilityQuote {
            probability: (answer.probability * 1000.0).round() / 10.0,
            label: answer.text,
        })
        .collect()
}

fn is_excluded(label: &str, excluded_terms: &[String]) -> bool {
    let lowered = label.to_lowercase();
    excluded_terms.iter().any(|term| lowered.contains(term))
}
