use crate::error::RepositoryError;
use crate::models::Bucket;
use sqlx::PgPool;
use uuid::Uuid;

/// Repository for bucket data access
pub struct BucketRepository {
    pool: PgPool,
}

impl BucketRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new bucket
    pub async fn create(
        &self,
        metal: &str,
        name: &str,
        weight: &str,
        year: Option<i32>,
        isolated: bool,
    ) -> Result<Bucket, RepositoryError> {
        let bucket = sqlx::query_as::<_, Bucket>(
            r#"
            INSERT INTO buckets (metal, name, weight, year, isolated)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, metal, name, weight, year, isolated, created_at
            "#,
        )
        .bind(metal)
        .bind(name)
        .bind(weight)
        .bind(year)
        .bind(isolated)
        .fetch_one(&self.pool)
        .await?;

        Ok(bucket)
    }

    /// Find a bucket by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Bucket>, RepositoryError> {
        let bucket = sqlx::query_as::<_, Bucket>(
            r#"
            SELECT id, metal, name, weight, year, isolated, created_at
            FROM buckets
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bucket)
    }

    /// Ids of every bucket in the same year family: equal metal, name, and
    /// weight across all years. Used for "any year" matching.
    pub async fn year_family_ids(&self, bucket: &Bucket) -> Result<Vec<Uuid>, RepositoryError> {
        let rows = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM buckets
            WHERE metal = $1 AND name = $2 AND weight = $3
            ORDER BY year NULLS LAST, id
            "#,
        )
        .bind(&bucket.metal)
        .bind(&bucket.name)
        .bind(&bucket.weight)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Buckets that currently have at least one in-stock listing; the set
    /// the market poller recomputes best asks for.
    pub async fn find_with_active_listings(&self) -> Result<Vec<Bucket>, RepositoryError> {
        let buckets = sqlx::query_as::<_, Bucket>(
            r#"
            SELECT DISTINCT b.id, b.metal, b.name, b.weight, b.year, b.isolated, b.created_at
            FROM buckets b
            JOIN listings l ON l.bucket_id = b.id
            WHERE l.active = TRUE AND l.quantity > 0
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(buckets)
    }
}
