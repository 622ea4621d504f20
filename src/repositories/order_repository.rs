use crate::error::RepositoryError;
use crate::matching::Fill;
use crate::models::{Order, OrderItem};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Repository for orders produced by the matching engine
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert one order with its line items, inside the caller's match
    /// transaction so a failed fill leaves no orphan order behind.
    pub async fn create_with_items(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        buyer_id: Uuid,
        seller_id: Uuid,
        fills: &[&Fill],
    ) -> Result<(Order, Vec<OrderItem>), RepositoryError> {
        if fills.is_empty() {
            return Err(RepositoryError::InvalidInput(
                "Order must have at least one fill".to_string(),
            ));
        }

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (buyer_id, seller_id)
            VALUES ($1, $2)
            RETURNING id, buyer_id, seller_id, created_at
            "#,
        )
        .bind(buyer_id)
        .bind(seller_id)
        .fetch_one(&mut **tx)
        .await?;

        let mut items = Vec::with_capacity(fills.len());
        for fill in fills {
            let item = sqlx::query_as::<_, OrderItem>(
                r#"
                INSERT INTO order_items (order_id, listing_id, quantity, price_each)
                VALUES ($1, $2, $3, $4)
                RETURNING id, order_id, listing_id, quantity, price_each
                "#,
            )
            .bind(order.id)
            .bind(fill.listing_id)
            .bind(fill.quantity)
            .bind(fill.price_each)
            .fetch_one(&mut **tx)
            .await?;
            items.push(item);
        }

        Ok((order, items))
    }

    /// Find an order's items (used by callers rendering receipts)
    pub async fn find_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT id, order_id, listing_id, quantity, price_each
            FROM order_items
            WHERE order_id = $1
            ORDER BY id
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
