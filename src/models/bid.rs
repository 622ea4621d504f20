use super::listing::PricingMode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bid fill status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Open,
    PartiallyFilled,
    Filled,
}

impl BidStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "open" => Ok(BidStatus::Open),
            "partially_filled" => Ok(BidStatus::PartiallyFilled),
            "filled" => Ok(BidStatus::Filled),
            _ => Err(format!("Invalid bid status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Open => "open",
            BidStatus::PartiallyFilled => "partially_filled",
            BidStatus::Filled => "filled",
        }
    }
}

impl From<String> for BidStatus {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(BidStatus::Open)
    }
}

impl From<BidStatus> for String {
    fn from(status: BidStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Bid model: a buyer's standing offer to purchase quantity at or below a
/// price.
///
/// `remaining_quantity` only ever decreases. A ceiling of zero means
/// "no ceiling": the spot-derived price is used unclamped.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bid {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub bucket_id: Uuid,
    pub quantity: i64,
    pub remaining_quantity: i64,
    pub pricing_mode: String, // Stored as TEXT, use PricingMode enum for type safety
    pub price: Decimal,
    pub spot_premium: Decimal,
    /// Maximum acceptable price under spot pricing; ZERO disables the clamp
    pub ceiling_price: Decimal,
    pub pricing_metal: Option<String>,
    pub active: bool,
    pub status: String, // Stored as TEXT, use BidStatus enum for type safety
    pub created_at: DateTime<Utc>,
}

impl Bid {
    /// Get pricing mode as an enum
    pub fn mode(&self) -> PricingMode {
        PricingMode::from_str(&self.pricing_mode).unwrap_or(PricingMode::Static)
    }

    /// Get status as an enum
    pub fn status_enum(&self) -> BidStatus {
        BidStatus::from_str(&self.status).unwrap_or(BidStatus::Open)
    }

    /// Check if the bid can still be filled against
    pub fn is_open(&self) -> bool {
        self.active && self.remaining_quantity > 0
    }
}
