use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A short-lived guarantee that a specific price will be honored for a
/// specific (listing, user) pair.
///
/// Locks are immutable once created and advisory: they never reserve
/// inventory and do not prevent other users from locking or buying the same
/// listing. An expired lock becomes unusable at read time; rows are removed
/// by the periodic sweep, not at expiry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceLock {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub user_id: Uuid,
    pub locked_price: Decimal,
    /// Spot price used at lock time; None for statically priced listings
    pub spot_price_at_lock: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PriceLock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn lock_expiring_at(expires_at: DateTime<Utc>) -> PriceLock {
        PriceLock {
            id: Uuid::new_v4(),
            listing_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            locked_price: dec!(2005.00),
            spot_price_at_lock: Some(dec!(2000.00)),
            created_at: expires_at - Duration::seconds(15),
            expires_at,
        }
    }

    #[test]
    fn not_expired_before_deadline() {
        let now = Utc::now();
        let lock = lock_expiring_at(now + Duration::seconds(10));
        assert!(!lock.is_expired(now));
    }

    #[test]
    fn expired_at_and_after_deadline() {
        let now = Utc::now();
        assert!(lock_expiring_at(now).is_expired(now));
        assert!(lock_expiring_at(now - Duration::seconds(1)).is_expired(now));
    }
}
