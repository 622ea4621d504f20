use crate::error::RepositoryError;
use crate::models::BucketPricePoint;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

const POINT_COLUMNS: &str = "id, bucket_id, price, recorded_at";

/// Repository for the append-only bucket price history log
pub struct PriceHistoryRepository {
    pool: PgPool,
}

impl PriceHistoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a price point
    pub async fn insert(
        &self,
        bucket_id: Uuid,
        price: Decimal,
        recorded_at: DateTime<Utc>,
    ) -> Result<BucketPricePoint, RepositoryError> {
        let point = sqlx::query_as::<_, BucketPricePoint>(&format!(
            r#"
            INSERT INTO bucket_price_history (bucket_id, price, recorded_at)
            VALUES ($1, $2, $3)
            RETURNING {POINT_COLUMNS}
            "#
        ))
        .bind(bucket_id)
        .bind(price)
        .bind(recorded_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(point)
    }

    /// The most recent point for a bucket
    pub async fn last_point(
        &self,
        bucket_id: Uuid,
    ) -> Result<Option<BucketPricePoint>, RepositoryError> {
        let point = sqlx::query_as::<_, BucketPricePoint>(&format!(
            r#"
            SELECT {POINT_COLUMNS}
            FROM bucket_price_history
            WHERE bucket_id = $1
            ORDER BY recorded_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(bucket_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(point)
    }

    /// All points for a bucket at or after `since`, oldest first
    pub async fn find_since(
        &self,
        bucket_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<BucketPricePoint>, RepositoryError> {
        let points = sqlx::query_as::<_, BucketPricePoint>(&format!(
            r#"
            SELECT {POINT_COLUMNS}
            FROM bucket_price_history
            WHERE bucket_id = $1 AND recorded_at >= $2
            ORDER BY recorded_at, id
            "#
        ))
        .bind(bucket_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(points)
    }

    /// The newest point strictly before `cutoff`, used to forward-fill an
    /// empty chart window
    pub async fn last_before(
        &self,
        bucket_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<BucketPricePoint>, RepositoryError> {
        let point = sqlx::query_as::<_, BucketPricePoint>(&format!(
            r#"
            SELECT {POINT_COLUMNS}
            FROM bucket_price_history
            WHERE bucket_id = $1 AND recorded_at < $2
            ORDER BY recorded_at DESC, id DESC
            LIMIT 1
            "#
        ))
        .bind(bucket_id)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        Ok(point)
    }

    /// Delete points recorded before `cutoff`, returning the count removed
    pub async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM bucket_price_history WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
