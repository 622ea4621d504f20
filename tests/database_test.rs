//! Repository-level tests. These require a provisioned PostgreSQL database
//! (TEST_DATABASE_URL) and are ignored by default; run them with
//! `cargo test -- --ignored`.

mod helpers;

use chrono::Duration;
use helpers::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use troy_backend::clock::Clock;
use troy_backend::models::*;
use troy_backend::repositories::NewListing;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn create_and_find_bucket() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Maple Leaf", "1 oz").await;
    let found = db.state.bucket_repo.find_by_id(bucket.id).await.unwrap().unwrap();

    assert_eq!(found.id, bucket.id);
    assert_eq!(found.metal, "gold");
    assert_eq!(found.weight, "1 oz");
    assert!(!found.isolated);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn year_family_spans_years_only() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let b2023 = db.state.bucket_repo.create("silver", "Eagle", "1 oz", Some(2023), false).await.unwrap();
    let b2024 = db.state.bucket_repo.create("silver", "Eagle", "1 oz", Some(2024), false).await.unwrap();
    // Different weight, not family
    db.state.bucket_repo.create("silver", "Eagle", "10 g", Some(2024), false).await.unwrap();

    let family = db.state.bucket_repo.year_family_ids(&b2023).await.unwrap();
    assert_eq!(family.len(), 2);
    assert!(family.contains(&b2023.id));
    assert!(family.contains(&b2024.id));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn listing_rejects_non_positive_quantity() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Krugerrand", "1 oz").await;
    let result = db
        .state
        .listing_repo
        .create(NewListing {
            seller_id: Uuid::new_v4(),
            bucket_id: bucket.id,
            quantity: 0,
            pricing_mode: PricingMode::Static,
            price: dec!(100),
            spot_premium: Decimal::ZERO,
            floor_price: Decimal::ZERO,
            pricing_metal: None,
            packaging: None,
        })
        .await;

    assert!(result.is_err());

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn active_listing_query_applies_filters() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "silver", "Britannia", "1 oz").await;
    let me = Uuid::new_v4();
    let other = Uuid::new_v4();

    create_test_listing(&db, bucket.id, me, 5, dec!(40)).await;
    let theirs = create_test_listing(&db, bucket.id, other, 5, dec!(41)).await;
    let inactive = create_test_listing(&db, bucket.id, other, 5, dec!(42)).await;
    db.state.listing_repo.deactivate(inactive.id).await.unwrap();

    let visible = db
        .state
        .listing_repo
        .find_active_by_buckets(&[bucket.id], Some(me), None)
        .await
        .unwrap();

    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, theirs.id);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn packaging_filter_restricts_listings() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "silver", "Eagle", "1 oz").await;
    let seller = Uuid::new_v4();

    let tube = db
        .state
        .listing_repo
        .create(NewListing {
            seller_id: seller,
            bucket_id: bucket.id,
            quantity: 5,
            pricing_mode: PricingMode::Static,
            price: dec!(40),
            spot_premium: Decimal::ZERO,
            floor_price: Decimal::ZERO,
            pricing_metal: None,
            packaging: Some("tube"),
        })
        .await
        .unwrap();
    create_test_listing(&db, bucket.id, seller, 5, dec!(39)).await;

    let styles = vec!["tube".to_string()];
    let tubes_only = db
        .state
        .listing_repo
        .find_active_by_buckets(&[bucket.id], None, Some(styles.as_slice()))
        .await
        .unwrap();

    assert_eq!(tubes_only.len(), 1);
    assert_eq!(tubes_only[0].id, tube.id);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn take_quantity_is_conditional_and_deactivates_at_zero() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Buffalo", "1 oz").await;
    let listing = create_test_listing(&db, bucket.id, Uuid::new_v4(), 5, dec!(2000)).await;

    let mut tx = db.pool.begin().await.unwrap();
    assert!(db.state.listing_repo.take_quantity(&mut tx, listing.id, 3).await.unwrap());
    // More than remains: refused, nothing consumed
    assert!(!db.state.listing_repo.take_quantity(&mut tx, listing.id, 3).await.unwrap());
    assert!(db.state.listing_repo.take_quantity(&mut tx, listing.id, 2).await.unwrap());
    tx.commit().await.unwrap();

    let listing = db.state.listing_repo.find_by_id(listing.id).await.unwrap().unwrap();
    assert_eq!(listing.quantity, 0);
    assert!(!listing.active);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn bid_fill_transitions_status() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "silver", "Kangaroo", "1 oz").await;
    let bid = create_test_bid(&db, bucket.id, Uuid::new_v4(), 10, dec!(35)).await;
    assert_eq!(bid.status_enum(), BidStatus::Open);

    let mut tx = db.pool.begin().await.unwrap();
    assert!(db.state.bid_repo.apply_fill(&mut tx, bid.id, 4).await.unwrap());
    tx.commit().await.unwrap();

    let bid_row = db.state.bid_repo.find_by_id(bid.id).await.unwrap().unwrap();
    assert_eq!(bid_row.remaining_quantity, 6);
    assert_eq!(bid_row.status_enum(), BidStatus::PartiallyFilled);
    assert!(bid_row.active);

    let mut tx = db.pool.begin().await.unwrap();
    // Over-fill refused
    assert!(!db.state.bid_repo.apply_fill(&mut tx, bid.id, 7).await.unwrap());
    assert!(db.state.bid_repo.apply_fill(&mut tx, bid.id, 6).await.unwrap());
    tx.commit().await.unwrap();

    let bid_row = db.state.bid_repo.find_by_id(bid.id).await.unwrap().unwrap();
    assert_eq!(bid_row.remaining_quantity, 0);
    assert_eq!(bid_row.status_enum(), BidStatus::Filled);
    assert!(!bid_row.active);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn lock_repository_returns_most_recent_unexpired() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Sovereign", "1 oz").await;
    let listing = create_test_listing(&db, bucket.id, Uuid::new_v4(), 1, dec!(700)).await;
    let user = Uuid::new_v4();
    let now = db.clock.now();

    db.state
        .lock_repo
        .create(listing.id, user, dec!(700), None, now - Duration::seconds(20), now - Duration::seconds(5))
        .await
        .unwrap();
    let fresh = db
        .state
        .lock_repo
        .create(listing.id, user, dec!(705), None, now, now + Duration::seconds(15))
        .await
        .unwrap();

    let active = db.state.lock_repo.find_active(listing.id, user, now).await.unwrap().unwrap();
    assert_eq!(active.id, fresh.id);
    assert_eq!(active.locked_price, dec!(705));

    // Expired rows are swept, the live one stays
    let removed = db.state.lock_repo.delete_expired(now).await.unwrap();
    assert_eq!(removed, 1);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn history_points_are_time_ordered() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Libertad", "1 oz").await;
    let now = db.clock.now();

    for (offset, price) in [(3i64, dec!(100)), (2, dec!(102)), (1, dec!(101))] {
        db.state
            .history_repo
            .insert(bucket.id, price, now - Duration::days(offset))
            .await
            .unwrap();
    }

    let points = db
        .state
        .history_repo
        .find_since(bucket.id, now - Duration::days(7))
        .await
        .unwrap();

    assert_eq!(points.len(), 3);
    assert!(points.windows(2).all(|w| w[0].recorded_at <= w[1].recorded_at));
    assert_eq!(points.last().unwrap().price, dec!(101));

    let last = db.state.history_repo.last_point(bucket.id).await.unwrap().unwrap();
    assert_eq!(last.price, dec!(101));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn order_items_snapshot_fill_prices() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "silver", "Eagle", "1 oz").await;
    let buyer = Uuid::new_v4();
    let seller = Uuid::new_v4();
    let listing = create_test_listing(&db, bucket.id, seller, 3, dec!(40)).await;

    let fill = troy_backend::matching::Fill {
        listing_id: listing.id,
        seller_id: seller,
        quantity: 3,
        price_each: dec!(40),
    };

    let mut tx = db.pool.begin().await.unwrap();
    let (order, items) = db
        .state
        .order_repo
        .create_with_items(&mut tx, buyer, seller, &[&fill])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(order.buyer_id, buyer);
    assert_eq!(order.seller_id, seller);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 3);
    assert_eq!(items[0].price_each, dec!(40));
    assert_eq!(Order::total(&items), dec!(120));

    let fetched = db.state.order_repo.find_items(order.id).await.unwrap();
    assert_eq!(fetched.len(), 1);

    db.cleanup().await;
}
