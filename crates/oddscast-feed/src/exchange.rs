//! HTTP client for the secondary exchange feed.
//!
//! The upstream is a regulated event exchange listing one yes/no market per
//! entity under a shared series ticker. Prices arrive in cents (0-100) and
//! map 1:1 to percentage points.

use crate::error::{FeedError, FeedResult};
use crate::forecast::DEFAULT_TIMEOUT;
use crate::source::{BookFeed, BookQuote, BoxFuture};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    markets: Vec<ExchangeMarket>,
}

#[derive(Debug, Deserialize)]
struct ExchangeMarket {
    #[serde(default)]
    subtitle: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    last_price: f64,
    #[serde(default)]
    yes_bid: f64,
    #[serde(default)]
    yes_ask: f64,
}

impl ExchangeMarket {
    /// Prefer the subtitle (entity name) over the full market title.
    fn label(&self) -> Option<&str> {
        self.subtitle
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.title.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Client for the exchange markets API (secondary feed).
pub struct ExchangeFeed {
    client: Client,
    markets_url: String,
    series_ticker: String,
    excluded_terms: Vec<String>,
}

impl ExchangeFeed {
    /// Create a new exchange feed client.
    ///
    /// `markets_url` is the markets listing endpoint
    /// (e.g., "https://api.elections.kalshi.com/trade-api/v2/markets");
    /// the series ticker and an open-status filter go out as query
    /// parameters.
    pub fn new(
        markets_url: impl Into<String>,
        series_ticker: impl Into<String>,
        timeout: Duration,
        excluded_terms: Vec<String>,
    ) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Http(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            markets_url: markets_url.into(),
            series_ticker: series_ticker.into(),
            excluded_terms: excluded_terms.iter().map(|t| t.to_lowercase()).collect(),
        })
    }

    /// Create a client with the default request timeout.
    pub fn with_default_timeout(
        markets_url: impl Into<String>,
        series_ticker: impl Into<String>,
        excluded_terms: Vec<String>,
    ) -> FeedResult<Self> {
        Self::new(markets_url, series_ticker, DEFAULT_TIMEOUT, excluded_terms)
    }

    async fn fetch_books(&self) -> FeedResult<Vec<BookQuote>> {
        debug!(
            url = %self.markets_url,
            series = %self.series_ticker,
            "Fetching exchange markets"
        );

        let response = self
            .client
            .get(&self.markets_url)
            .query(&[
                ("series_ticker", self.series_ticker.as_str()),
                ("status", "open"),
            ])
            .send()
            .await
            .map_err(|e| FeedError::Http(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Http(format!("HTTP {status}: {body}")));
        }

        let payload: MarketsResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Payload(format!("Failed to parse markets response: {e}")))?;

        Ok(map_markets(payload, &self.excluded_terms))
    }
}

impl BookFeed for ExchangeFeed {
    fn name(&self) -> &str {
        "exchange"
    }

    fn fetch(&self) -> BoxFuture<'_, FeedResult<Vec<BookQuote>>> {
        Box::pin(self.fetch_books())
    }
}

/// Map a markets payload to book quotes, skipping unlabeled markets and
/// excluded labels.
fn map_markets(payload: MarketsResponse, excluded_terms: &[String]) -> Vec<BookQuote> {
    let mut quotes = Vec::with_capacity(payload.markets.len());
    for market in &payload.markets {
        let Some(label) = market.label() else {
            warn!("Skipping exchange market with no label");
            continue;
        };
        let lowered = label.to_lowercase();
        if excluded_terms.iter().any(|term| lowered.contains(term)) {
            continue;
        }
        quotes.push(BookQuote {
            label: label.to_string(),
            last_price: market.last_price,
            bid: market.yes_bid,
            ask: market.yes_ask,
        });
    }
    quotes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> MarketsResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_map_markets_prefers_subtitle() {
        let payload = parse(
            r#"{
                "markets": [
                    {"subtitle": "Jane Doe", "title": "Will Jane Doe win?",
                     "last_price": 42, "yes_bid": 40, "yes_ask": 44},
                    {"subtitle": "", "title": "Will Bob Smith win?",
                     "last_price": 10, "yes_bid": 0, "yes_ask": 15}
                ]
            }"#,
        );

        let quotes = map_markets(payload, &[]);
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].label, "Jane Doe");
        assert_eq!(quotes[0].bid, 40.0);
        assert_eq!(quotes[0].ask, 44.0);
        assert_eq!(quotes[1].label, "Will Bob Smith win?");
    }

    #[test]
    fn test_map_markets_skips_unlabeled_and_excluded() {
        let payload = parse(
            r#"{
                "markets": [
                    {"last_price": 5},
                    {"subtitle": "Incumbent Smith", "last_price": 80,
                     "yes_bid": 78, "yes_ask": 82}
                ]
            }"#,
        );

        let quotes = map_markets(payload, &["smith".to_string()]);
        assert!(quotes.is_empty());
    }

    #[test]
    fn test_missing_markets_is_empty_not_error() {
        assert!(map_markets(parse("{}"), &[]).is_empty());
    }
}
