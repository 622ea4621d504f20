//! Greedy fill planning.
//!
//! Given a requested quantity and a pool of priced candidate listings, the
//! planner consumes listings cheapest-first, splitting the request across
//! sellers. Planning is pure; the matching service applies a plan
//! transactionally and retries from scratch when a concurrent fill
//! invalidates it.

use rust_decimal::Decimal;
use uuid::Uuid;

/// A listing priced and ready for matching
#[derive(Debug, Clone)]
pub struct Candidate {
    pub listing_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i64,
    pub price: Decimal,
}

/// One slice of a fill: quantity taken from a single listing at its price
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub listing_id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i64,
    pub price_each: Decimal,
}

/// The planned outcome of a match
#[derive(Debug, Clone)]
pub struct FillPlan {
    pub requested: i64,
    pub filled: i64,
    pub fills: Vec<Fill>,
    /// True when exclusions (self-trade, price limit) left nothing to buy.
    /// Distinct from insufficient inventory, where fills exist but
    /// `filled < requested`.
    pub no_eligible: bool,
}

impl FillPlan {
    pub fn remaining(&self) -> i64 {
        self.requested - self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled >= self.requested
    }

    fn empty(requested: i64, no_eligible: bool) -> Self {
        Self {
            requested,
            filled: 0,
            fills: Vec::new(),
            no_eligible,
        }
    }
}

/// Plan a greedy fill of `requested` units for `buyer_id`.
///
/// Candidates priced above `price_limit` (when given) and candidates sold by
/// the buyer are excluded. The rest are consumed in ascending
/// `(price, listing_id)` order; the id comparison makes equal-priced fills
/// deterministic.
pub fn plan_fills(
    requested: i64,
    buyer_id: Uuid,
    price_limit: Option<Decimal>,
    candidates: &[Candidate],
) -> FillPlan {
    if requested <= 0 {
        return FillPlan::empty(requested, false);
    }

    let mut eligible: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| c.quantity > 0)
        .filter(|c| c.seller_id != buyer_id)
        .filter(|c| price_limit.map_or(true, |limit| c.price <= limit))
        .collect();

    if eligible.is_empty() {
        return FillPlan::empty(requested, true);
    }

    eligible.sort_by(|a, b| {
        a.price
            .cmp(&b.price)
            .then_with(|| a.listing_id.cmp(&b.listing_id))
    });

    let mut fills = Vec::new();
    let mut needed = requested;
    for candidate in eligible {
        if needed == 0 {
            break;
        }
        let take = needed.min(candidate.quantity);
        fills.push(Fill {
            listing_id: candidate.listing_id,
            seller_id: candidate.seller_id,
            quantity: take,
            price_each: candidate.price,
        });
        needed -= take;
    }

    FillPlan {
        requested,
        filled: requested - needed,
        fills,
        no_eligible: false,
    }
}

/// Group a plan's fills by seller, preserving fill order within each group.
/// One order is created per distinct seller.
pub fn fills_by_seller(fills: &[Fill]) -> Vec<(Uuid, Vec<&Fill>)> {
    let mut groups: Vec<(Uuid, Vec<&Fill>)> = Vec::new();
    for fill in fills {
        match groups.iter_mut().find(|(seller, _)| *seller == fill.seller_id) {
            Some((_, group)) => group.push(fill),
            None => groups.push((fill.seller_id, vec![fill])),
        }
    }
    groups
}
