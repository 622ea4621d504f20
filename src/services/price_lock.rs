//! Advisory price locks.
//!
//! A lock freezes the effective price of a listing for one user for a short
//! window (10-30s) so the price shown at checkout preview cannot move
//! before confirmation. Locks never reserve inventory: two users can hold
//! locks on the same listing at different prices, and a lock does not stop
//! anyone else from buying. Expiry is a wall-clock comparison at read time;
//! the maintenance sweep deletes expired rows later.

use crate::clock::Clock;
use crate::error::{AppError, AppResult};
use crate::models::{Metal, PriceLock, PricingMode};
use crate::pricing::effective_ask_price;
use crate::repositories::{BucketRepository, ListingRepository, PriceLockRepository};
use crate::services::spot_price::SpotPriceCache;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Bounds on a caller-supplied lock lifetime
const MIN_TTL_SECS: u64 = 10;
const MAX_TTL_SECS: u64 = 30;

/// Service issuing and reading price locks
pub struct PriceLockService {
    listing_repo: Arc<ListingRepository>,
    bucket_repo: Arc<BucketRepository>,
    lock_repo: Arc<PriceLockRepository>,
    spot_cache: Arc<SpotPriceCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl PriceLockService {
    pub fn new(
        listing_repo: Arc<ListingRepository>,
        bucket_repo: Arc<BucketRepository>,
        lock_repo: Arc<PriceLockRepository>,
        spot_cache: Arc<SpotPriceCache>,
        clock: Arc<dyn Clock>,
        ttl_secs: u64,
    ) -> Self {
        Self {
            listing_repo,
            bucket_repo,
            lock_repo,
            spot_cache,
            clock,
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    /// Lock the current effective price of a listing for a user, using the
    /// configured default lifetime.
    pub async fn create_lock(&self, listing_id: Uuid, user_id: Uuid) -> AppResult<PriceLock> {
        self.create_lock_inner(listing_id, user_id, self.ttl).await
    }

    /// Lock with an explicit lifetime, clamped to the 10-30s window.
    pub async fn create_lock_with_ttl(
        &self,
        listing_id: Uuid,
        user_id: Uuid,
        ttl_secs: u64,
    ) -> AppResult<PriceLock> {
        let ttl = Duration::seconds(ttl_secs.clamp(MIN_TTL_SECS, MAX_TTL_SECS) as i64);
        self.create_lock_inner(listing_id, user_id, ttl).await
    }

    /// Compute and persist the lock.
    ///
    /// For spot-priced listings the spot price used is recorded alongside
    /// the locked price for auditability.
    async fn create_lock_inner(
        &self,
        listing_id: Uuid,
        user_id: Uuid,
        ttl: Duration,
    ) -> AppResult<PriceLock> {
        let listing = self
            .listing_repo
            .find_by_id(listing_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Listing not found".into()))?;

        if !listing.in_stock() {
            return Err(AppError::Validation(
                "Cannot lock a price on an inactive or sold out listing".into(),
            ));
        }

        let bucket = self
            .bucket_repo
            .find_by_id(listing.bucket_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bucket not found".into()))?;

        let spot = self.spot_cache.spot_prices().await;
        let priced = effective_ask_price(&listing, &bucket, &spot);

        let spot_price_at_lock = match listing.mode() {
            PricingMode::PremiumToSpot => {
                let metal_name = listing.pricing_metal.as_deref().unwrap_or(&bucket.metal);
                Metal::from_str(metal_name).and_then(|metal| spot.get(&metal).copied())
            }
            PricingMode::Static => None,
        };

        let now = self.clock.now();
        let lock = self
            .lock_repo
            .create(
                listing_id,
                user_id,
                priced.value(),
                spot_price_at_lock,
                now,
                now + ttl,
            )
            .await?;

        info!(
            lock_id = %lock.id,
            listing_id = %listing_id,
            user_id = %user_id,
            price = %lock.locked_price,
            expires_at = %lock.expires_at,
            "price lock created"
        );

        Ok(lock)
    }

    /// The most recent non-expired lock for a (listing, user) pair.
    ///
    /// An expired lock is silently ignored; the caller recomputes the live
    /// price.
    pub async fn active_lock(
        &self,
        listing_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<PriceLock>> {
        let lock = self
            .lock_repo
            .find_active(listing_id, user_id, self.clock.now())
            .await?;
        Ok(lock)
    }

    /// Delete expired locks, returning the count removed
    pub async fn cleanup(&self) -> AppResult<u64> {
        let removed = self.lock_repo.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            debug!(removed, "expired price locks swept");
        }
        Ok(removed)
    }
}
