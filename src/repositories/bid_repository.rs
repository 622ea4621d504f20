use crate::error::RepositoryError;
use crate::models::{Bid, PricingMode};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const BID_COLUMNS: &str = "id, buyer_id, bucket_id, quantity, remaining_quantity, pricing_mode, \
     price, spot_premium, ceiling_price, pricing_metal, active, status, created_at";

/// Parameters for creating a bid
pub struct NewBid<'a> {
    pub buyer_id: Uuid,
    pub bucket_id: Uuid,
    pub quantity: i64,
    pub pricing_mode: PricingMode,
    pub price: Decimal,
    pub spot_premium: Decimal,
    pub ceiling_price: Decimal,
    pub pricing_metal: Option<&'a str>,
}

/// Repository for bid data access
pub struct BidRepository {
    pool: PgPool,
}

impl BidRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new bid
    pub async fn create(&self, new: NewBid<'_>) -> Result<Bid, RepositoryError> {
        if new.quantity <= 0 {
            return Err(RepositoryError::InvalidInput(
                "Bid quantity must be positive".to_string(),
            ));
        }

        let bid = sqlx::query_as::<_, Bid>(&format!(
            r#"
            INSERT INTO bids
                (buyer_id, bucket_id, quantity, remaining_quantity, pricing_mode,
                 price, spot_premium, ceiling_price, pricing_metal)
            VALUES ($1, $2, $3, $3, $4, $5, $6, $7, $8)
            RETURNING {BID_COLUMNS}
            "#
        ))
        .bind(new.buyer_id)
        .bind(new.bucket_id)
        .bind(new.quantity)
        .bind(new.pricing_mode.as_str())
        .bind(new.price)
        .bind(new.spot_premium)
        .bind(new.ceiling_price)
        .bind(new.pricing_metal)
        .fetch_one(&self.pool)
        .await?;

        Ok(bid)
    }

    /// Find a bid by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Bid>, RepositoryError> {
        let bid = sqlx::query_as::<_, Bid>(&format!(
            r#"
            SELECT {BID_COLUMNS}
            FROM bids
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(bid)
    }

    /// Open (fillable) bids in a bucket, optionally excluding a buyer;
    /// oldest first so equal-priced bids are served in arrival order.
    pub async fn find_open_by_bucket(
        &self,
        bucket_id: Uuid,
        exclude_buyer: Option<Uuid>,
    ) -> Result<Vec<Bid>, RepositoryError> {
        let bids = sqlx::query_as::<_, Bid>(&format!(
            r#"
            SELECT {BID_COLUMNS}
            FROM bids
            WHERE bucket_id = $1
              AND active = TRUE
              AND remaining_quantity > 0
              AND ($2::uuid IS NULL OR buyer_id <> $2)
            ORDER BY created_at, id
            "#
        ))
        .bind(bucket_id)
        .bind(exclude_buyer)
        .fetch_all(&self.pool)
        .await?;

        Ok(bids)
    }

    /// Atomically consume `filled` units of a bid's remaining quantity,
    /// moving its status to partially_filled or filled.
    ///
    /// Returns false when the bid no longer has the remaining quantity (a
    /// concurrent fill won); the caller re-plans.
    pub async fn apply_fill(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        filled: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE bids
            SET remaining_quantity = remaining_quantity - $2,
                status = CASE
                    WHEN remaining_quantity - $2 <= 0 THEN 'filled'
                    ELSE 'partially_filled'
                END,
                active = remaining_quantity - $2 > 0
            WHERE id = $1 AND active = TRUE AND remaining_quantity >= $2
            "#,
        )
        .bind(id)
        .bind(filled)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
