//! External quote feeds for oddscast.
//!
//! Two polled REST sources feed the aggregation engine: a forecast-market
//! API supplying outright probabilities (primary) and an exchange API
//! supplying last/bid/ask order books (secondary). Both sit behind
//! dyn-compatible traits so the engine and tests can swap transports, and
//! the label `Normalizer` reduces each source's market-question phrasing to
//! one canonical key per entity.

pub mod error;
pub mod exchange;
pub mod forecast;
pub mod normalize;
pub mod source;

pub use error::{FeedError, FeedResult};
pub use exchange::ExchangeFeed;
pub use forecast::ForecastFeed;
pub use normalize::{Normalizer, NormalizerConfig};
pub use source::{
    BookFeed, BookQuote, BoxFuture, MockBookFeed, MockProbabilityFeed, ProbabilityFeed,
    ProbabilityQuote,
};
