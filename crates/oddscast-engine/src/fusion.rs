//! Per-entity fusion math.
//!
//! Pure functions over raw feed quotes: the weighted blend of primary
//! probability with secondary book prices, the liquidity-adjusted fair
//! price, soft normalization toward a sum-to-100 distribution, and spike
//! dampening against the last persisted snapshot. The tick orchestration in
//! [`crate::tick`] strings these together.

use oddscast_core::{EntityQuote, Snapshot};
use oddscast_feed::BookQuote;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Scale applied to the last trade's offset from the midpoint.
const LIQUIDITY_SHIFT_SCALE: f64 = 6.0;
/// Hard bound on the liquidity shift, in percentage points.
const LIQUIDITY_MAX_SHIFT: f64 = 3.0;
/// Wider spreads damp the shift; this floor keeps some responsiveness.
const SPREAD_DAMPING_FLOOR: f64 = 0.2;

/// Blend weights for one fusion pass. Must sum to 1 to keep the result on
/// the probability scale; not enforced, operators own their config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Primary feed's outright probability.
    pub primary: f64,
    /// Secondary feed's last trade price.
    pub last_trade: f64,
    /// Secondary feed's bid/ask midpoint.
    pub midpoint: f64,
    /// Liquidity-adjusted price ([`liquidity_price`]).
    pub liquidity: f64,
}

/// Fusion parameters. All tunable; the weight constants carry no stated
/// derivation and are heuristics, not law.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Weights when the secondary last trade sits inside its own band.
    #[serde(default = "default_normal_weights")]
    pub normal: FusionWeights,
    /// Weights when the last trade prints outside [bid, ask]: weight moves
    /// from the stale print toward midpoint and liquidity terms.
    #[serde(default = "default_throttled_weights")]
    pub throttled: FusionWeights,
    /// Fraction of the distance toward the fully renormalized distribution
    /// applied per tick.
    #[serde(default = "default_soft_normalize_strength")]
    pub soft_normalize_strength: f64,
    /// Maximum per-entity change per tick, in percentage points.
    #[serde(default = "default_dampening_cap")]
    pub dampening_cap: f64,
}

fn default_normal_weights() -> FusionWeights {
    FusionWeights {
        primary: 0.40,
        last_trade: 0.42,
        midpoint: 0.12,
        liquidity: 0.06,
    }
}

fn default_throttled_weights() -> FusionWeights {
    FusionWeights {
        primary: 0.40,
        last_trade: 0.10,
        midpoint: 0.32,
        liquidity: 0.18,
    }
}

fn default_soft_normalize_strength() -> f64 {
    0.30
}

fn default_dampening_cap() -> f64 {
    3.0
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            normal: default_normal_weights(),
            throttled: default_throttled_weights(),
            soft_normalize_strength: default_soft_normalize_strength(),
            dampening_cap: default_dampening_cap(),
        }
    }
}

/// Result of fusing one entity's quotes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedValue {
    /// Blended probability, before normalization and dampening.
    pub value: f64,
    /// Whether a two-sided secondary book contributed.
    pub secondary_active: bool,
    /// Whether the stale-print throttled weights were used.
    pub stale_print: bool,
}

/// A book is usable only when both sides have orders and the spread is
/// positive; anything else says nothing about fair value.
pub fn two_sided(bid: f64, ask: f64) -> bool {
    bid > 0.0 && ask > 0.0 && ask > bid
}

/// Liquidity-adjusted fair price inside a two-sided book.
///
/// Nudges the midpoint toward wherever the last trade sits in the band,
/// damped by spread width so one thin print cannot drag the estimate, and
/// clamped into [bid, ask]. A book with no usable spread or no trade yet
/// yields the plain midpoint.
pub fn liquidity_price(last: f64, bid: f64, ask: f64) -> f64 {
    let mid = (bid + ask) / 2.0;
    let spread = ask - bid;
    if spread <= 0.0 || last <= 0.0 {
        return mid;
    }

    let position_in_spread = ((last - bid) / spread).clamp(0.0, 1.0);
    let offset_from_mid = position_in_spread - 0.5;
    let spread_factor = (1.0 - (spread / 10.0) * 0.8).max(SPREAD_DAMPING_FLOOR);
    let shift =
        (offset_from_mid * LIQUIDITY_SHIFT_SCALE * spread_factor).clamp(-LIQUIDITY_MAX_SHIFT, LIQUIDITY_MAX_SHIFT);

    (mid + shift).clamp(bid, ask)
}

/// Fuse one entity's primary probability with its secondary book.
///
/// Without a two-sided book the primary value stands alone. With one, the
/// blend uses the normal weights, or the throttled set when the last trade
/// prints outside the current band (a stale print says little about fair
/// value now). A missing primary quote contributes 0 to the blend.
pub fn fuse_entity(
    primary: Option<f64>,
    book: Option<&BookQuote>,
    config: &FusionConfig,
) -> FusedValue {
    let primary_prob = primary.unwrap_or(0.0);

    let Some(book) = book.filter(|b| two_sided(b.bid, b.ask)) else {
        return FusedValue {
            value: primary_prob,
            secondary_active: false,
            stale_print: false,
        };
    };

    let midpoint = (book.bid + book.ask) / 2.0;
    let liquidity = liquidity_price(book.last_price, book.bid, book.ask);
    // A zero last price means the market has never traded; only an actual
    // print outside the band is stale.
    let stale_print =
        book.last_price > 0.0 && (book.last_price < book.bid || book.last_price > book.ask);
    let w = if stale_print {
        &config.throttled
    } else {
        &config.normal
    };

    FusedValue {
        value: w.primary * primary_prob
            + w.last_trade * book.last_price
            + w.midpoint * midpoint
            + w.liquidity * liquidity,
        secondary_active: true,
        stale_print,
    }
}

/// Move each value a fixed fraction toward the sum-to-100 renormalized
/// distribution. Corrects gross drift without erasing the raw signal; a
/// zero total is left untouched.
pub fn soft_normalize(entries: &mut [EntityQuote], strength: f64) {
    let total: f64 = entries.iter().map(|e| e.probability).sum();
    if total <= 0.0 {
        return;
    }
    for entry in entries {
        let fully_normalized = (entry.probability / total) * 100.0;
        entry.probability += (fully_normalized - entry.probability) * strength;
    }
}

/// Clamp per-entity tick-over-tick change to `previous ± cap`.
///
/// `previous` must be the last *persisted* snapshot; entities without a
/// previous value pass through unclamped. Returns how many entries were
/// clamped.
pub fn dampen_spikes(entries: &mut [EntityQuote], previous: Option<&Snapshot>, cap: f64) -> u32 {
    let Some(previous) = previous else {
        return 0;
    };

    let mut dampened = 0;
    for entry in entries {
        let Some(prev_prob) = previous.probability_of(&entry.name) else {
            continue;
        };
        let delta = entry.probability - prev_prob;
        if delta.abs() > cap {
            let clamped = prev_prob + cap.copysign(delta);
            info!(
                entity = %entry.name,
                from = prev_prob,
                fused = entry.probability,
                clamped,
                "Spike dampened"
            );
            entry.probability = clamped;
            dampened += 1;
        }
    }
    dampened
}
