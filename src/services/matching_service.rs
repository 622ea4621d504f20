//! Transactional order matching.
//!
//! Planning is delegated to the pure greedy planner; this service loads and
//! prices the candidate pool, then applies the plan inside a single
//! transaction. Listing quantity and bid remaining-quantity are only ever
//! consumed through conditional single-statement decrements, so a
//! concurrent fill cannot cause a lost update: the loser's decrement
//! matches no row, the transaction rolls back, and the whole match re-plans
//! against fresh state (bounded retries, then fatal).

use crate::clock::Clock;
use crate::database::retry_on_contention;
use crate::error::{AppError, AppResult};
use crate::matching::{fills_by_seller, plan_fills, Candidate, Fill, FillPlan};
use crate::models::{Bid, BidStatus, Bucket, Listing, Order, SpotPrices};
use crate::pricing::{effective_ask_price, effective_bid_price};
use crate::repositories::{
    BidRepository, BucketRepository, ListingRepository, OrderRepository, PriceLockRepository,
};
use crate::services::spot_price::SpotPriceCache;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Result of filling a bid
#[derive(Debug)]
pub struct BidFillOutcome {
    pub bid_id: Uuid,
    pub requested: i64,
    pub filled: i64,
    pub remaining: i64,
    pub status: BidStatus,
    pub fills: Vec<Fill>,
    pub orders: Vec<Order>,
    /// True when exclusions left nothing to match against (e.g. the buyer
    /// is the only seller); distinct from insufficient inventory
    pub no_eligible: bool,
}

/// Options for a direct buy
#[derive(Debug, Clone, Default)]
pub struct BuyOptions {
    /// Match across the bucket's whole year family
    pub any_year: bool,
    /// Restrict to these packaging styles
    pub packaging: Option<Vec<String>>,
}

/// Result of a direct buy
#[derive(Debug)]
pub enum BuyOutcome {
    /// Exclusions removed every candidate; the buyer is effectively the
    /// only seller here
    NoEligibleListings,
    /// The full requested quantity was sourced
    Filled { orders: Vec<Order>, fills: Vec<Fill> },
    /// Some quantity was sourced; the rest of the market is dry
    PartiallyFilled {
        orders: Vec<Order>,
        fills: Vec<Fill>,
        remaining: i64,
    },
}

enum AutoFillStep {
    Filled(BidFillOutcome),
    BidExhausted,
    ListingExhausted,
}

/// Service executing greedy fills against the shared store
pub struct MatchingService {
    pool: PgPool,
    listing_repo: Arc<ListingRepository>,
    bid_repo: Arc<BidRepository>,
    bucket_repo: Arc<BucketRepository>,
    order_repo: Arc<OrderRepository>,
    lock_repo: Arc<PriceLockRepository>,
    spot_cache: Arc<SpotPriceCache>,
    clock: Arc<dyn Clock>,
}

impl MatchingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        listing_repo: Arc<ListingRepository>,
        bid_repo: Arc<BidRepository>,
        bucket_repo: Arc<BucketRepository>,
        order_repo: Arc<OrderRepository>,
        lock_repo: Arc<PriceLockRepository>,
        spot_cache: Arc<SpotPriceCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            listing_repo,
            bid_repo,
            bucket_repo,
            order_repo,
            lock_repo,
            spot_cache,
            clock,
        }
    }

    /// Fill a bid from the cheapest eligible listings in its bucket.
    ///
    /// Partial fills are a normal outcome, reported as data. Self-trades
    /// are excluded; listings priced above the bid's effective price are
    /// excluded.
    pub async fn fill_bid(&self, bid_id: Uuid) -> AppResult<BidFillOutcome> {
        retry_on_contention(|| self.try_fill_bid(bid_id)).await
    }

    async fn try_fill_bid(&self, bid_id: Uuid) -> AppResult<BidFillOutcome> {
        let bid = self
            .bid_repo
            .find_by_id(bid_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bid not found".into()))?;

        if !bid.is_open() {
            return Err(AppError::Validation("Bid is not open".into()));
        }

        let bucket = self
            .bucket_repo
            .find_by_id(bid.bucket_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bucket not found".into()))?;

        let spot = self.spot_cache.spot_prices().await;
        let bid_price = effective_bid_price(&bid, &bucket, &spot).value();

        let listings = self
            .listing_repo
            .find_active_by_buckets(&[bucket.id], None, None)
            .await?;
        let candidates = ask_candidates(&listings, &bucket, &spot);

        let plan = plan_fills(
            bid.remaining_quantity,
            bid.buyer_id,
            Some(bid_price),
            &candidates,
        );

        if plan.fills.is_empty() {
            return Ok(BidFillOutcome {
                bid_id,
                requested: plan.requested,
                filled: 0,
                remaining: plan.requested,
                status: bid.status_enum(),
                fills: Vec::new(),
                orders: Vec::new(),
                no_eligible: plan.no_eligible,
            });
        }

        let orders = self.apply_plan(bid.buyer_id, &plan, Some(&bid)).await?;

        let status = if plan.is_complete() {
            BidStatus::Filled
        } else {
            BidStatus::PartiallyFilled
        };

        info!(
            bid_id = %bid_id,
            filled = plan.filled,
            remaining = plan.remaining(),
            orders = orders.len(),
            "bid filled"
        );

        Ok(BidFillOutcome {
            bid_id,
            requested: plan.requested,
            filled: plan.filled,
            remaining: plan.remaining(),
            status,
            fills: plan.fills,
            orders,
            no_eligible: false,
        })
    }

    /// Fill a direct buy of `quantity` units from a bucket, cheapest first.
    ///
    /// The buyer's own listings are skipped, and an active price lock held
    /// by this buyer on a listing overrides that listing's live price.
    pub async fn fill_buy_order(
        &self,
        buyer_id: Uuid,
        bucket_id: Uuid,
        quantity: i64,
        options: BuyOptions,
    ) -> AppResult<BuyOutcome> {
        if quantity <= 0 {
            return Err(AppError::Validation(
                "Buy quantity must be positive".into(),
            ));
        }

        retry_on_contention(|| self.try_fill_buy(buyer_id, bucket_id, quantity, &options)).await
    }

    async fn try_fill_buy(
        &self,
        buyer_id: Uuid,
        bucket_id: Uuid,
        quantity: i64,
        options: &BuyOptions,
    ) -> AppResult<BuyOutcome> {
        let bucket = self
            .bucket_repo
            .find_by_id(bucket_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bucket not found".into()))?;

        let bucket_ids = if options.any_year {
            self.bucket_repo.year_family_ids(&bucket).await?
        } else {
            vec![bucket.id]
        };

        let listings = self
            .listing_repo
            .find_active_by_buckets(&bucket_ids, Some(buyer_id), options.packaging.as_deref())
            .await?;

        let spot = self.spot_cache.spot_prices().await;
        let now = self.clock.now();

        // Year-family buckets share the pricing-relevant attributes (metal,
        // weight), so the requested bucket prices every candidate.
        let mut candidates = Vec::with_capacity(listings.len());
        for listing in &listings {
            let price = match self.lock_repo.find_active(listing.id, buyer_id, now).await? {
                Some(lock) => lock.locked_price,
                None => effective_ask_price(listing, &bucket, &spot).value(),
            };
            candidates.push(Candidate {
                listing_id: listing.id,
                seller_id: listing.seller_id,
                quantity: listing.quantity,
                price,
            });
        }

        let plan = plan_fills(quantity, buyer_id, None, &candidates);

        if plan.no_eligible {
            return Ok(BuyOutcome::NoEligibleListings);
        }

        let orders = self.apply_plan(buyer_id, &plan, None).await?;

        info!(
            buyer_id = %buyer_id,
            bucket_id = %bucket_id,
            filled = plan.filled,
            remaining = plan.remaining(),
            orders = orders.len(),
            "buy order filled"
        );

        if plan.is_complete() {
            Ok(BuyOutcome::Filled {
                orders,
                fills: plan.fills,
            })
        } else {
            let remaining = plan.remaining();
            Ok(BuyOutcome::PartiallyFilled {
                orders,
                fills: plan.fills,
                remaining,
            })
        }
    }

    /// Fill open bids from a newly created listing, best bid first.
    ///
    /// Bids are served in descending effective-price order (oldest first on
    /// ties) while the listing has stock and the bid's price covers the
    /// listing's effective ask. Fills execute at the listing's ask price.
    pub async fn auto_fill_listing(&self, listing_id: Uuid) -> AppResult<Vec<BidFillOutcome>> {
        let listing = self
            .listing_repo
            .find_by_id(listing_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".into()))?;

        if !listing.in_stock() {
            return Ok(Vec::new());
        }

        let bucket = self
            .bucket_repo
            .find_by_id(listing.bucket_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bucket not found".into()))?;

        let spot = self.spot_cache.spot_prices().await;
        let ask_price = effective_ask_price(&listing, &bucket, &spot).value();

        let bids = self
            .bid_repo
            .find_open_by_bucket(bucket.id, Some(listing.seller_id))
            .await?;

        let mut priced: Vec<(Bid, Decimal)> = bids
            .into_iter()
            .map(|bid| {
                let price = effective_bid_price(&bid, &bucket, &spot).value();
                (bid, price)
            })
            .filter(|(_, price)| *price >= ask_price)
            .collect();
        priced.sort_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| a.0.created_at.cmp(&b.0.created_at))
        });

        let mut outcomes = Vec::new();
        for (bid, _) in priced {
            let step = retry_on_contention(|| {
                self.try_auto_fill_step(listing.id, bid.id, ask_price)
            })
            .await?;

            match step {
                AutoFillStep::Filled(outcome) => outcomes.push(outcome),
                AutoFillStep::BidExhausted => continue,
                AutoFillStep::ListingExhausted => break,
            }
        }

        Ok(outcomes)
    }

    /// One auto-fill slice: re-reads both sides so a retry after contention
    /// sees current quantities.
    async fn try_auto_fill_step(
        &self,
        listing_id: Uuid,
        bid_id: Uuid,
        ask_price: Decimal,
    ) -> AppResult<AutoFillStep> {
        let listing = self
            .listing_repo
            .find_by_id(listing_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".into()))?;
        if !listing.in_stock() {
            return Ok(AutoFillStep::ListingExhausted);
        }

        let bid = self
            .bid_repo
            .find_by_id(bid_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bid not found".into()))?;
        if !bid.is_open() {
            return Ok(AutoFillStep::BidExhausted);
        }

        let take = bid.remaining_quantity.min(listing.quantity);
        let fill = Fill {
            listing_id: listing.id,
            seller_id: listing.seller_id,
            quantity: take,
            price_each: ask_price,
        };

        let mut tx = self.pool.begin().await?;
        if !self
            .listing_repo
            .take_quantity(&mut tx, listing.id, take)
            .await?
        {
            return Err(AppError::Contention(
                "listing quantity changed during auto-fill".into(),
            ));
        }
        if !self.bid_repo.apply_fill(&mut tx, bid.id, take).await? {
            return Err(AppError::Contention(
                "bid remaining quantity changed during auto-fill".into(),
            ));
        }
        let (order, _) = self
            .order_repo
            .create_with_items(&mut tx, bid.buyer_id, listing.seller_id, &[&fill])
            .await?;
        tx.commit().await?;

        let remaining = bid.remaining_quantity - take;
        info!(
            bid_id = %bid.id,
            listing_id = %listing.id,
            quantity = take,
            price = %ask_price,
            "bid auto-filled from new listing"
        );

        Ok(AutoFillStep::Filled(BidFillOutcome {
            bid_id: bid.id,
            requested: bid.remaining_quantity,
            filled: take,
            remaining,
            status: if remaining == 0 {
                BidStatus::Filled
            } else {
                BidStatus::PartiallyFilled
            },
            fills: vec![fill],
            orders: vec![order],
            no_eligible: false,
        }))
    }

    /// Apply a plan in one transaction: consume listing quantities, write
    /// one order per distinct seller, and (for bid fills) consume the bid's
    /// remaining quantity. Any conditional update that loses a race aborts
    /// the transaction with a contention error; nothing partial commits.
    async fn apply_plan(
        &self,
        buyer_id: Uuid,
        plan: &FillPlan,
        bid: Option<&Bid>,
    ) -> AppResult<Vec<Order>> {
        let mut tx = self.pool.begin().await?;
        let mut orders = Vec::new();

        for (seller_id, group) in fills_by_seller(&plan.fills) {
            for fill in &group {
                if !self
                    .listing_repo
                    .take_quantity(&mut tx, fill.listing_id, fill.quantity)
                    .await?
                {
                    return Err(AppError::Contention(
                        "listing quantity changed during fill".into(),
                    ));
                }
            }
            let (order, _) = self
                .order_repo
                .create_with_items(&mut tx, buyer_id, seller_id, &group)
                .await?;
            orders.push(order);
        }

        if let Some(bid) = bid {
            if !self.bid_repo.apply_fill(&mut tx, bid.id, plan.filled).await? {
                return Err(AppError::Contention(
                    "bid remaining quantity changed during fill".into(),
                ));
            }
        }

        tx.commit().await?;
        Ok(orders)
    }
}

/// Price a pool of listings into match candidates
fn ask_candidates(listings: &[Listing], bucket: &Bucket, spot: &SpotPrices) -> Vec<Candidate> {
    listings
        .iter()
        .map(|listing| Candidate {
            listing_id: listing.id,
            seller_id: listing.seller_id,
            quantity: listing.quantity,
            price: effective_ask_price(listing, bucket, spot).value(),
        })
        .collect()
}
