//! Bucket price history: best-ask computation and the step-function log.
//!
//! A bucket's "current best ask" is the minimum effective price over its
//! in-stock listings. Isolated buckets (unique or numbered-set items) are
//! priced as the midpoint of (lowest ask, highest active bid) when a bid
//! exists, reflecting negotiation-style pricing for one-of-a-kind items.
//!
//! The history log is append-only and uncompressed: a point is written only
//! when the price moved by at least the epsilon, so the series is a true
//! step function. Forward-fill for empty chart windows happens here at the
//! read boundary, never inside the log.

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::BucketPricePoint;
use crate::pricing::{effective_ask_price, effective_bid_price};
use crate::repositories::{
    BidRepository, BucketRepository, ListingRepository, PriceHistoryRepository,
};
use crate::services::spot_price::SpotPriceCache;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Price moves smaller than this are not recorded
const PRICE_EPSILON: Decimal = dec!(0.01);

/// Default retention for history points
pub const DEFAULT_RETENTION_DAYS: i64 = 365;

/// Service maintaining per-bucket best-ask history
pub struct PriceHistoryService {
    listing_repo: Arc<ListingRepository>,
    bid_repo: Arc<BidRepository>,
    bucket_repo: Arc<BucketRepository>,
    history_repo: Arc<PriceHistoryRepository>,
    spot_cache: Arc<SpotPriceCache>,
    clock: Arc<dyn Clock>,
}

impl PriceHistoryService {
    pub fn new(
        listing_repo: Arc<ListingRepository>,
        bid_repo: Arc<BidRepository>,
        bucket_repo: Arc<BucketRepository>,
        history_repo: Arc<PriceHistoryRepository>,
        spot_cache: Arc<SpotPriceCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            listing_repo,
            bid_repo,
            bucket_repo,
            history_repo,
            spot_cache,
            clock,
        }
    }

    /// Current best ask for a bucket, or None when nothing is in stock.
    ///
    /// `exclude_user` removes one user's own listings from consideration;
    /// `packaging` restricts to the given packaging styles.
    pub async fn current_best_ask(
        &self,
        bucket_id: Uuid,
        exclude_user: Option<Uuid>,
        packaging: Option<&[String]>,
    ) -> AppResult<Option<Decimal>> {
        let bucket = self
            .bucket_repo
            .find_by_id(bucket_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bucket not found".into()))?;

        let listings = self
            .listing_repo
            .find_active_by_buckets(&[bucket_id], exclude_user, packaging)
            .await?;

        let spot = self.spot_cache.spot_prices().await;

        let lowest_ask = listings
            .iter()
            .map(|listing| effective_ask_price(listing, &bucket, &spot).value())
            .min();

        let Some(lowest_ask) = lowest_ask else {
            return Ok(None);
        };

        if !bucket.isolated {
            return Ok(Some(lowest_ask));
        }

        // Isolated buckets negotiate: midpoint of best ask and the single
        // highest active bid, when one exists
        let bids = self.bid_repo.find_open_by_bucket(bucket_id, None).await?;
        let highest_bid = bids
            .iter()
            .map(|bid| effective_bid_price(bid, &bucket, &spot).value())
            .max();

        Ok(Some(isolated_price(lowest_ask, highest_bid)))
    }

    /// Append a history point unless the price is unchanged within epsilon.
    /// Returns whether a point was recorded.
    ///
    /// The check-then-insert is a benign race under concurrent writers: the
    /// worst case is one duplicate step in the log.
    pub async fn record_price_change(&self, bucket_id: Uuid, price: Decimal) -> AppResult<bool> {
        if let Some(last) = self.history_repo.last_point(bucket_id).await? {
            if (price - last.price).abs() < PRICE_EPSILON {
                return Ok(false);
            }
        }

        let point = self
            .history_repo
            .insert(bucket_id, price, self.clock.now())
            .await?;
        debug!(
            bucket_id = %bucket_id,
            price = %point.price,
            "bucket price change recorded"
        );
        Ok(true)
    }

    /// Every recorded point within the window, oldest first, unaggregated.
    /// Visual interpolation is the chart's job.
    pub async fn history(
        &self,
        bucket_id: Uuid,
        range_days: i64,
    ) -> AppResult<Vec<BucketPricePoint>> {
        let since = self.window_start(range_days)?;
        let points = self.history_repo.find_since(bucket_id, since).await?;
        Ok(points)
    }

    /// Window read with the chart boundary policy: when the window is empty
    /// but older points exist, the last point before the window is carried
    /// forward, stamped at the window start.
    pub async fn history_for_chart(
        &self,
        bucket_id: Uuid,
        range_days: i64,
    ) -> AppResult<Vec<BucketPricePoint>> {
        let since = self.window_start(range_days)?;
        let points = self.history_repo.find_since(bucket_id, since).await?;
        if !points.is_empty() {
            return Ok(points);
        }

        let carried = self
            .history_repo
            .last_before(bucket_id, since)
            .await?
            .map(|mut point| {
                point.recorded_at = since;
                point
            });

        Ok(carried.into_iter().collect())
    }

    /// Delete points older than the retention window, returning the count
    pub async fn cleanup(&self, retention_days: i64) -> AppResult<u64> {
        if retention_days <= 0 {
            return Err(AppError::Validation(
                "Retention must be a positive number of days".into(),
            ));
        }
        let cutoff = self.clock.now() - Duration::days(retention_days);
        let removed = self.history_repo.delete_before(cutoff).await?;
        if removed > 0 {
            debug!(removed, "price history points pruned");
        }
        Ok(removed)
    }

    fn window_start(&self, range_days: i64) -> AppResult<chrono::DateTime<chrono::Utc>> {
        if range_days <= 0 {
            return Err(AppError::Validation(
                "Range must be a positive number of days".into(),
            ));
        }
        Ok(self.clock.now() - Duration::days(range_days))
    }
}

/// Midpoint pricing for isolated buckets; plain lowest ask when no bid is
/// active. Only the single highest bid participates.
fn isolated_price(lowest_ask: Decimal, highest_bid: Option<Decimal>) -> Decimal {
    match highest_bid {
        Some(bid) => ((lowest_ask + bid) / dec!(2)).round_dp(2),
        None => lowest_ask,
    }
}
