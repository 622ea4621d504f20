use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metals traded on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metal {
    Gold,
    Silver,
    Platinum,
    Palladium,
}

/// Current spot prices, USD per troy ounce
pub type SpotPrices = HashMap<Metal, Decimal>;

impl Metal {
    pub const ALL: [Metal; 4] = [
        Metal::Gold,
        Metal::Silver,
        Metal::Platinum,
        Metal::Palladium,
    ];

    /// Convert from database/feed string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "gold" | "au" | "xau" => Some(Metal::Gold),
            "silver" | "ag" | "xag" => Some(Metal::Silver),
            "platinum" | "pt" | "xpt" => Some(Metal::Platinum),
            "palladium" | "pd" | "xpd" => Some(Metal::Palladium),
            _ => None,
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            Metal::Gold => "gold",
            Metal::Silver => "silver",
            Metal::Platinum => "platinum",
            Metal::Palladium => "palladium",
        }
    }
}

impl std::fmt::Display for Metal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
