//! Periodic maintenance: price lock expiry sweep and history retention.

use crate::error::AppResult;
use crate::services::price_history::PriceHistoryService;
use crate::services::price_lock::PriceLockService;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{error, info};

pub struct MaintenanceTask {
    locks: Arc<PriceLockService>,
    history: Arc<PriceHistoryService>,
    sweep_interval: Duration,
    retention_days: i64,
}

impl MaintenanceTask {
    pub fn new(
        locks: Arc<PriceLockService>,
        history: Arc<PriceHistoryService>,
        sweep_interval: Duration,
        retention_days: i64,
    ) -> Self {
        Self {
            locks,
            history,
            sweep_interval,
            retention_days,
        }
    }

    /// Start sweeping; runs until the task is dropped
    pub async fn start(self) {
        let mut interval = time::interval(self.sweep_interval);
        info!(
            "maintenance task started, sweeping every {:?}",
            self.sweep_interval
        );

        loop {
            interval.tick().await;

            if let Err(e) = self.sweep().await {
                error!("Error in maintenance sweep: {}", e);
            }
        }
    }

    async fn sweep(&self) -> AppResult<()> {
        let expired_locks = self.locks.cleanup().await?;
        let pruned_points = self.history.cleanup(self.retention_days).await?;

        if expired_locks > 0 || pruned_points > 0 {
            info!(expired_locks, pruned_points, "maintenance sweep completed");
        }

        Ok(())
    }
}
