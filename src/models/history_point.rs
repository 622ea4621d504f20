use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One step of a bucket's best-ask price history.
///
/// Points are append-only and recorded only when the price actually moved,
/// so the series is a genuine step function rather than a sampled one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BucketPricePoint {
    pub id: i64,
    pub bucket_id: Uuid,
    pub price: Decimal,
    pub recorded_at: DateTime<Utc>,
}
