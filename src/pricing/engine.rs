//! Effective price computation for listings and bids.
//!
//! Both sides of the market resolve to one canonical price. Spot-linked
//! prices are `spot * weight_oz + premium`, clamped asymmetrically: asks
//! never fall below their floor, bids never rise above their ceiling. Every
//! degraded resolution (unknown metal, missing spot price, unparsable
//! weight) produces a usable fallback price, tagged so callers and tests can
//! tell it apart from a normal quote. Pricing must never block a purchase.

use crate::models::{Bid, Bucket, Listing, Metal, PricingMode, SpotPrices};
use crate::pricing::weight::Weight;
use rust_decimal::Decimal;
use tracing::warn;

/// Why a price was resolved via fallback instead of a live spot quote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    UnknownMetal,
    SpotUnavailable,
    UnparsableWeight,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::UnknownMetal => "unknown_metal",
            FallbackReason::SpotUnavailable => "spot_unavailable",
            FallbackReason::UnparsableWeight => "unparsable_weight",
        }
    }
}

/// The resolved price, tagged with how it was obtained
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectivePrice {
    /// Priced normally (static price, or a live spot computation)
    Quoted(Decimal),
    /// Priced via a degraded path; still safe to transact at
    Fallback {
        price: Decimal,
        reason: FallbackReason,
    },
}

impl EffectivePrice {
    pub fn value(&self) -> Decimal {
        match self {
            EffectivePrice::Quoted(price) => *price,
            EffectivePrice::Fallback { price, .. } => *price,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, EffectivePrice::Fallback { .. })
    }
}

/// Effective price of a listing (ask).
///
/// Static mode returns the listing price as-is. Spot mode computes
/// `spot * weight_oz + premium` clamped to the floor; if the metal or spot
/// price cannot be resolved the listing falls back to its static price (or
/// floor) rather than failing.
pub fn effective_ask_price(listing: &Listing, bucket: &Bucket, spot: &SpotPrices) -> EffectivePrice {
    match listing.mode() {
        PricingMode::Static => EffectivePrice::Quoted(round_price(listing.price)),
        PricingMode::PremiumToSpot => {
            match spot_computed(
                listing.pricing_metal.as_deref(),
                listing.spot_premium,
                bucket,
                spot,
            ) {
                Ok((computed, weight_fallback)) => {
                    let effective = round_price(computed.max(listing.floor_price));
                    match weight_fallback {
                        Some(reason) => EffectivePrice::Fallback {
                            price: effective,
                            reason,
                        },
                        None => EffectivePrice::Quoted(effective),
                    }
                }
                Err(reason) => {
                    let price = round_price(pick_fallback(listing.price, listing.floor_price));
                    warn!(
                        listing_id = %listing.id,
                        reason = reason.as_str(),
                        %price,
                        "ask priced via fallback"
                    );
                    EffectivePrice::Fallback { price, reason }
                }
            }
        }
    }
}

/// Effective price of a bid.
///
/// Static mode returns the bid price unconditionally, ignoring any ceiling.
/// Spot mode clamps to the ceiling only when one is set (ceiling > 0).
pub fn effective_bid_price(bid: &Bid, bucket: &Bucket, spot: &SpotPrices) -> EffectivePrice {
    match bid.mode() {
        PricingMode::Static => EffectivePrice::Quoted(round_price(bid.price)),
        PricingMode::PremiumToSpot => {
            match spot_computed(bid.pricing_metal.as_deref(), bid.spot_premium, bucket, spot) {
                Ok((computed, weight_fallback)) => {
                    let clamped = if bid.ceiling_price > Decimal::ZERO {
                        computed.min(bid.ceiling_price)
                    } else {
                        computed
                    };
                    let effective = round_price(clamped);
                    match weight_fallback {
                        Some(reason) => EffectivePrice::Fallback {
                            price: effective,
                            reason,
                        },
                        None => EffectivePrice::Quoted(effective),
                    }
                }
                Err(reason) => {
                    let price = round_price(pick_fallback(bid.price, bid.ceiling_price));
                    warn!(
                        bid_id = %bid.id,
                        reason = reason.as_str(),
                        %price,
                        "bid priced via fallback"
                    );
                    EffectivePrice::Fallback { price, reason }
                }
            }
        }
    }
}

/// Resolve the spot-linked component: `spot * weight_oz + premium`.
///
/// Returns the computed price plus an optional weight-fallback tag, or the
/// reason the spot path is unusable.
fn spot_computed(
    metal_override: Option<&str>,
    premium: Decimal,
    bucket: &Bucket,
    spot: &SpotPrices,
) -> Result<(Decimal, Option<FallbackReason>), FallbackReason> {
    let metal_name = metal_override.unwrap_or(&bucket.metal);
    let metal = Metal::from_str(metal_name).ok_or(FallbackReason::UnknownMetal)?;
    let spot_price = spot
        .get(&metal)
        .copied()
        .ok_or(FallbackReason::SpotUnavailable)?;

    let (weight, weight_fallback) = match Weight::parse(&bucket.weight) {
        Some(weight) => (weight, None),
        None => {
            warn!(
                bucket_id = %bucket.id,
                weight = %bucket.weight,
                "unparsable bucket weight, assuming 1 troy oz"
            );
            (Weight::one_troy_oz(), Some(FallbackReason::UnparsableWeight))
        }
    };

    Ok((spot_price * weight.troy_oz() + premium, weight_fallback))
}

/// Prefer the static price when one is set, otherwise the clamp bound
fn pick_fallback(static_price: Decimal, bound: Decimal) -> Decimal {
    if static_price > Decimal::ZERO {
        static_price
    } else {
        bound
    }
}

fn round_price(price: Decimal) -> Decimal {
    price.round_dp(2)
}
