//! Process-wide spot price cache.
//!
//! Spot prices come from an external HTTP metals API and are cached with a
//! TTL (default 5 minutes). A failed refresh serves the stale cache; an
//! empty map is the last resort. Time flows through an injected `Clock` so
//! TTL behavior is testable.

use crate::clock::Clock;
use crate::config::SpotConfig;
use crate::models::{Metal, SpotPrices};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

struct CacheState {
    prices: SpotPrices,
    refreshed_at: Option<DateTime<Utc>>,
}

/// TTL-gated cache over the external spot price feed
pub struct SpotPriceCache {
    client: reqwest::Client,
    api_url: String,
    request_timeout: std::time::Duration,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheState>,
}

impl SpotPriceCache {
    pub fn new(config: &SpotConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            request_timeout: config.request_timeout(),
            ttl: Duration::seconds(config.cache_ttl_secs as i64),
            clock,
            state: RwLock::new(CacheState {
                prices: SpotPrices::new(),
                refreshed_at: None,
            }),
        }
    }

    /// Current spot prices, USD per troy ounce.
    ///
    /// Serves the cache while fresh; otherwise refreshes, falling back to
    /// the stale cache (and finally an empty map) when the feed is down.
    /// Pricing degrades per-item instead of failing, so this never errors.
    pub async fn spot_prices(&self) -> SpotPrices {
        let now = self.clock.now();
        {
            let state = self.state.read().await;
            if let Some(refreshed_at) = state.refreshed_at {
                if now - refreshed_at < self.ttl {
                    return state.prices.clone();
                }
            }
        }

        if self.refresh().await {
            return self.state.read().await.prices.clone();
        }

        let state = self.state.read().await;
        if !state.prices.is_empty() {
            warn!("spot price refresh failed, serving stale cache");
        }
        state.prices.clone()
    }

    /// Current spot price for one metal
    pub async fn spot_price(&self, metal: Metal) -> Option<Decimal> {
        self.spot_prices().await.get(&metal).copied()
    }

    /// Force a refresh from the feed; returns whether it succeeded
    pub async fn refresh(&self) -> bool {
        match self.fetch().await {
            Ok(prices) if !prices.is_empty() => {
                let mut state = self.state.write().await;
                state.prices = prices;
                state.refreshed_at = Some(self.clock.now());
                debug!(count = state.prices.len(), "spot prices refreshed");
                true
            }
            Ok(_) => {
                warn!("spot price feed returned no usable prices");
                false
            }
            Err(e) => {
                warn!("spot price fetch failed: {}", e);
                false
            }
        }
    }

    async fn fetch(&self) -> Result<SpotPrices, reqwest::Error> {
        let response = self
            .client
            .get(&self.api_url)
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?;

        let raw: HashMap<String, f64> = response.json().await?;

        let mut prices = SpotPrices::new();
        for (symbol, value) in raw {
            let Some(metal) = Metal::from_str(&symbol) else {
                continue;
            };
            match Decimal::from_f64_retain(value) {
                Some(price) if price > Decimal::ZERO => {
                    prices.insert(metal, price);
                }
                _ => warn!(%symbol, value, "skipping unusable spot price"),
            }
        }

        info!(count = prices.len(), "fetched spot prices");
        Ok(prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use rust_decimal_macros::dec;

    // Port 0 is never connectable, so a refresh attempt fails immediately
    fn unreachable_cache(ttl_secs: u64, clock: Arc<ManualClock>) -> SpotPriceCache {
        let config = SpotConfig {
            api_url: "http://127.0.0.1:0/spot".to_string(),
            cache_ttl_secs: ttl_secs,
            request_timeout_secs: 1,
        };
        SpotPriceCache::new(&config, clock)
    }

    async fn prime(cache: &SpotPriceCache, price: Decimal, at: DateTime<Utc>) {
        let mut state = cache.state.write().await;
        state.prices.insert(Metal::Gold, price);
        state.refreshed_at = Some(at);
    }

    #[tokio::test]
    async fn serves_cache_while_fresh() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = unreachable_cache(300, clock.clone());
        prime(&cache, dec!(2000), clock.now()).await;

        clock.advance(Duration::seconds(299));
        let prices = cache.spot_prices().await;
        assert_eq!(prices.get(&Metal::Gold), Some(&dec!(2000)));
    }

    #[tokio::test]
    async fn serves_stale_cache_when_refresh_fails() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = unreachable_cache(300, clock.clone());
        prime(&cache, dec!(2000), clock.now()).await;

        // TTL elapsed, refresh will fail, stale prices still served
        clock.advance(Duration::seconds(301));
        let prices = cache.spot_prices().await;
        assert_eq!(prices.get(&Metal::Gold), Some(&dec!(2000)));
    }

    #[tokio::test]
    async fn empty_when_never_fetched_and_feed_down() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = unreachable_cache(300, clock.clone());

        let prices = cache.spot_prices().await;
        assert!(prices.is_empty());
        assert_eq!(cache.spot_price(Metal::Gold).await, None);
    }
}
