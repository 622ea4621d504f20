//! Market poller: refreshes spot prices and feeds the price history log.
//!
//! Each tick refreshes the spot cache, recomputes the best ask for every
//! bucket that currently has stock, and hands the result to
//! `record_price_change`, which drops moves smaller than the epsilon. Spot
//! price movements therefore show up in bucket charts without any listing
//! changing.

use crate::error::AppResult;
use crate::repositories::BucketRepository;
use crate::services::price_history::PriceHistoryService;
use crate::services::spot_price::SpotPriceCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

pub struct MarketPoller {
    spot_cache: Arc<SpotPriceCache>,
    history: Arc<PriceHistoryService>,
    bucket_repo: Arc<BucketRepository>,
    poll_interval: Duration,
}

impl MarketPoller {
    pub fn new(
        spot_cache: Arc<SpotPriceCache>,
        history: Arc<PriceHistoryService>,
        bucket_repo: Arc<BucketRepository>,
    ) -> Self {
        Self {
            spot_cache,
            history,
            bucket_repo,
            poll_interval: Duration::from_secs(60),
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start polling; runs until the task is dropped
    pub async fn start(self) {
        let mut interval = time::interval(self.poll_interval);
        info!("market poller started, polling every {:?}", self.poll_interval);

        loop {
            interval.tick().await;

            if let Err(e) = self.poll_once().await {
                error!("Error in market poller: {}", e);
            }
        }
    }

    /// One tick: refresh spot, recompute and record each active bucket's
    /// best ask
    async fn poll_once(&self) -> AppResult<()> {
        // A failed refresh is fine; pricing falls back to the stale cache
        self.spot_cache.refresh().await;

        let buckets = self.bucket_repo.find_with_active_listings().await?;
        for bucket in buckets {
            if let Some(price) = self.history.current_best_ask(bucket.id, None, None).await? {
                self.history.record_price_change(bucket.id, price).await?;
            }
        }

        Ok(())
    }
}
