use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Pricing mode for listings and bids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMode {
    Static,
    PremiumToSpot,
}

impl PricingMode {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "static" => Ok(PricingMode::Static),
            "premium_to_spot" => Ok(PricingMode::PremiumToSpot),
            _ => Err(format!("Invalid pricing mode: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingMode::Static => "static",
            PricingMode::PremiumToSpot => "premium_to_spot",
        }
    }
}

impl From<String> for PricingMode {
    fn from(s: String) -> Self {
        Self::from_str(&s).unwrap_or(PricingMode::Static)
    }
}

impl From<PricingMode> for String {
    fn from(mode: PricingMode) -> Self {
        mode.as_str().to_string()
    }
}

/// Listing (ask) model: a seller's offer of quantity at a price.
///
/// Quantity is decremented on fill and the listing deactivates when it
/// reaches zero. In `premium_to_spot` mode the effective price never drops
/// below `floor_price`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub bucket_id: Uuid,
    pub quantity: i64,
    pub pricing_mode: String, // Stored as TEXT, use PricingMode enum for type safety
    /// Static price; also the first fallback when spot pricing degrades
    pub price: Decimal,
    pub spot_premium: Decimal,
    pub floor_price: Decimal,
    /// Overrides the bucket metal for spot pricing when set
    pub pricing_metal: Option<String>,
    pub packaging: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    /// Get pricing mode as an enum
    pub fn mode(&self) -> PricingMode {
        PricingMode::from_str(&self.pricing_mode).unwrap_or(PricingMode::Static)
    }

    /// Check if the listing can currently be filled from
    pub fn in_stock(&self) -> bool {
        self.active && self.quantity > 0
    }
}
