//! Market aggregation engine for oddscast.
//!
//! One tick pulls quotes from the primary and secondary feeds, fuses them
//! into a per-entity probability with stale-print and thin-market guards,
//! soft-normalizes and spike-dampens the result, and appends it to the
//! snapshot store. Feed failures degrade the tick; store failures abort it.

pub mod error;
pub mod fusion;
pub mod tick;

pub use error::{EngineError, EngineResult};
pub use fusion::{
    dampen_spikes, fuse_entity, liquidity_price, soft_normalize, two_sided, FusedValue,
    FusionConfig, FusionWeights,
};
pub use tick::{Aggregator, TickOutcome};
