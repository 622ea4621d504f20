use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bucket model: the grouping key of item attributes (metal, product line,
/// weight, year) that represents one tradable product.
///
/// Buckets sharing (metal, name, weight) but differing in year form a
/// "family"; buyers who do not care about the year are matched across the
/// whole family. `isolated` marks unique or limited-numbered items, priced
/// by the ask/bid midpoint rule instead of pure lowest-ask.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bucket {
    pub id: Uuid,
    pub metal: String,
    pub name: String,
    /// Item weight with embedded unit, e.g. "1 oz", "10 g"
    pub weight: String,
    pub year: Option<i32>,
    pub isolated: bool,
    pub created_at: DateTime<Utc>,
}

impl Bucket {
    pub fn new(metal: &str, name: &str, weight: &str, year: Option<i32>, isolated: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            metal: metal.to_string(),
            name: name.to_string(),
            weight: weight.to_string(),
            year,
            isolated,
            created_at: Utc::now(),
        }
    }
}
