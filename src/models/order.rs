use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Order produced by the matching engine: one per (buyer, seller) pair in a
/// fill. Owned by the order subsystem once created; the core only writes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Line item of an order with the price-each snapshot taken at fill time
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub listing_id: Uuid,
    pub quantity: i64,
    pub price_each: Decimal,
}

impl Order {
    /// Total value of the given items
    pub fn total(items: &[OrderItem]) -> Decimal {
        items
            .iter()
            .map(|item| item.price_each * Decimal::from(item.quantity))
            .sum()
    }
}
