//! Troy Backend Library
//!
//! Pricing and matching core of the Troy peer-to-peer precious metals
//! marketplace: effective price resolution, greedy order matching, advisory
//! price locks, and bucket price history. The web layer consumes these
//! services as plain function calls.

pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod matching;
pub mod models;
pub mod pricing;
pub mod repositories;
pub mod services;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use clock::{Clock, SystemClock};
use database::Database;
use repositories::*;
use services::{MatchingService, PriceHistoryService, PriceLockService, SpotPriceCache};
use std::sync::Arc;

/// Application state containing all repositories and services
pub struct AppState {
    pub database: Database,
    pub bucket_repo: Arc<BucketRepository>,
    pub listing_repo: Arc<ListingRepository>,
    pub bid_repo: Arc<BidRepository>,
    pub order_repo: Arc<OrderRepository>,
    pub lock_repo: Arc<PriceLockRepository>,
    pub history_repo: Arc<PriceHistoryRepository>,
    pub spot_cache: Arc<SpotPriceCache>,
    pub lock_service: Arc<PriceLockService>,
    pub matching_service: Arc<MatchingService>,
    pub history_service: Arc<PriceHistoryService>,
}

impl AppState {
    /// Create a new AppState with initialized repositories and services
    pub fn new(pool: sqlx::PgPool, config: &AppConfig) -> Self {
        Self::with_clock(pool, config, Arc::new(SystemClock))
    }

    /// Create AppState with an explicit clock (useful in tests)
    pub fn with_clock(pool: sqlx::PgPool, config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let database = Database::new(pool.clone());

        let bucket_repo = Arc::new(BucketRepository::new(pool.clone()));
        let listing_repo = Arc::new(ListingRepository::new(pool.clone()));
        let bid_repo = Arc::new(BidRepository::new(pool.clone()));
        let order_repo = Arc::new(OrderRepository::new(pool.clone()));
        let lock_repo = Arc::new(PriceLockRepository::new(pool.clone()));
        let history_repo = Arc::new(PriceHistoryRepository::new(pool.clone()));

        let spot_cache = Arc::new(SpotPriceCache::new(&config.spot, clock.clone()));

        let lock_service = Arc::new(PriceLockService::new(
            listing_repo.clone(),
            bucket_repo.clone(),
            lock_repo.clone(),
            spot_cache.clone(),
            clock.clone(),
            config.lock_ttl_secs,
        ));

        let matching_service = Arc::new(MatchingService::new(
            pool,
            listing_repo.clone(),
            bid_repo.clone(),
            bucket_repo.clone(),
            order_repo.clone(),
            lock_repo.clone(),
            spot_cache.clone(),
            clock.clone(),
        ));

        let history_service = Arc::new(PriceHistoryService::new(
            listing_repo.clone(),
            bid_repo.clone(),
            bucket_repo.clone(),
            history_repo.clone(),
            spot_cache.clone(),
            clock,
        ));

        Self {
            database,
            bucket_repo,
            listing_repo,
            bid_repo,
            order_repo,
            lock_repo,
            history_repo,
            spot_cache,
            lock_service,
            matching_service,
            history_service,
        }
    }
}
