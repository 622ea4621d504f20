use crate::error::RepositoryError;
use crate::models::PriceLock;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const LOCK_COLUMNS: &str =
    "id, listing_id, user_id, locked_price, spot_price_at_lock, created_at, expires_at";

/// Repository for price lock data access
pub struct PriceLockRepository {
    pool: PgPool,
}

impl PriceLockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new price lock
    pub async fn create(
        &self,
        listing_id: Uuid,
        user_id: Uuid,
        locked_price: Decimal,
        spot_price_at_lock: Option<Decimal>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<PriceLock, RepositoryError> {
        let lock = sqlx::query_as::<_, PriceLock>(&format!(
            r#"
            INSERT INTO price_locks
                (listing_id, user_id, locked_price, spot_price_at_lock, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {LOCK_COLUMNS}
            "#
        ))
        .bind(listing_id)
        .bind(user_id)
        .bind(locked_price)
        .bind(spot_price_at_lock)
        .bind(created_at)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(lock)
    }

    /// Most recent non-expired lock for a (listing, user) pair.
    ///
    /// Expired rows are simply not returned; deletion is the sweep's job.
    pub async fn find_active(
        &self,
        listing_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PriceLock>, RepositoryError> {
        let lock = sqlx::query_as::<_, PriceLock>(&format!(
            r#"
            SELECT {LOCK_COLUMNS}
            FROM price_locks
            WHERE listing_id = $1 AND user_id = $2 AND expires_at > $3
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(listing_id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(lock)
    }

    /// Delete all expired locks, returning the count removed
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM price_locks WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
