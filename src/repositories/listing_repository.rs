use crate::error::RepositoryError;
use crate::models::{Listing, PricingMode};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

const LISTING_COLUMNS: &str = "id, seller_id, bucket_id, quantity, pricing_mode, price, \
     spot_premium, floor_price, pricing_metal, packaging, active, created_at, updated_at";

/// Parameters for creating a listing
pub struct NewListing<'a> {
    pub seller_id: Uuid,
    pub bucket_id: Uuid,
    pub quantity: i64,
    pub pricing_mode: PricingMode,
    pub price: Decimal,
    pub spot_premium: Decimal,
    pub floor_price: Decimal,
    pub pricing_metal: Option<&'a str>,
    pub packaging: Option<&'a str>,
}

/// Repository for listing (ask) data access
pub struct ListingRepository {
    pool: PgPool,
}

impl ListingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new listing
    pub async fn create(&self, new: NewListing<'_>) -> Result<Listing, RepositoryError> {
        if new.quantity <= 0 {
            return Err(RepositoryError::InvalidInput(
                "Listing quantity must be positive".to_string(),
            ));
        }

        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            INSERT INTO listings
                (seller_id, bucket_id, quantity, pricing_mode, price,
                 spot_premium, floor_price, pricing_metal, packaging)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {LISTING_COLUMNS}
            "#
        ))
        .bind(new.seller_id)
        .bind(new.bucket_id)
        .bind(new.quantity)
        .bind(new.pricing_mode.as_str())
        .bind(new.price)
        .bind(new.spot_premium)
        .bind(new.floor_price)
        .bind(new.pricing_metal)
        .bind(new.packaging)
        .fetch_one(&self.pool)
        .await?;

        Ok(listing)
    }

    /// Find a listing by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>, RepositoryError> {
        let listing = sqlx::query_as::<_, Listing>(&format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM listings
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(listing)
    }

    /// In-stock listings across the given buckets, optionally excluding a
    /// seller and filtering by packaging styles.
    pub async fn find_active_by_buckets(
        &self,
        bucket_ids: &[Uuid],
        exclude_seller: Option<Uuid>,
        packaging: Option<&[String]>,
    ) -> Result<Vec<Listing>, RepositoryError> {
        let listings = sqlx::query_as::<_, Listing>(&format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM listings
            WHERE bucket_id = ANY($1)
              AND active = TRUE
              AND quantity > 0
              AND ($2::uuid IS NULL OR seller_id <> $2)
              AND ($3::text[] IS NULL OR packaging = ANY($3))
            ORDER BY created_at, id
            "#
        ))
        .bind(bucket_ids)
        .bind(exclude_seller)
        .bind(packaging)
        .fetch_all(&self.pool)
        .await?;

        Ok(listings)
    }

    /// Atomically take `quantity` units from a listing, deactivating it
    /// when it empties.
    ///
    /// The decrement and the quantity check are one statement, so two
    /// concurrent fills can never both consume the same units. Returns
    /// false when the listing no longer has the quantity (a concurrent fill
    /// won); the caller re-plans the whole match.
    pub async fn take_quantity(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        quantity: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET quantity = quantity - $2,
                active = quantity - $2 > 0,
                updated_at = NOW()
            WHERE id = $1 AND active = TRUE AND quantity >= $2
            "#,
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Deactivate a listing without consuming quantity (seller withdrawal)
    pub async fn deactivate(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET active = FALSE, updated_at = NOW()
            WHERE id = $1 AND active = TRUE
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
