//! Service-level integration tests. These require a provisioned PostgreSQL
//! database (TEST_DATABASE_URL) and are ignored by default; run them with
//! `cargo test -- --ignored`.

mod helpers;

use chrono::Duration;
use helpers::*;
use troy_backend::clock::Clock;
use rust_decimal_macros::dec;
use troy_backend::models::BidStatus;
use troy_backend::services::{BuyOptions, BuyOutcome};
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn fill_bid_splits_across_sellers_cheapest_first() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "silver", "Silver Eagle", "1 oz").await;
    let buyer = Uuid::new_v4();
    let seller_a = Uuid::new_v4();
    let seller_b = Uuid::new_v4();
    let seller_c = Uuid::new_v4();

    let a = create_test_listing(&db, bucket.id, seller_a, 5, dec!(40)).await;
    let b = create_test_listing(&db, bucket.id, seller_b, 10, dec!(45)).await;
    let c = create_test_listing(&db, bucket.id, seller_c, 5, dec!(60)).await;

    let bid = create_test_bid(&db, bucket.id, buyer, 10, dec!(50)).await;

    let outcome = db.state.matching_service.fill_bid(bid.id).await.unwrap();

    assert_eq!(outcome.filled, 10);
    assert_eq!(outcome.remaining, 0);
    assert_eq!(outcome.status, BidStatus::Filled);
    assert_eq!(outcome.orders.len(), 2);

    // A drained, B halved, C untouched
    let a = db.state.listing_repo.find_by_id(a.id).await.unwrap().unwrap();
    let b = db.state.listing_repo.find_by_id(b.id).await.unwrap().unwrap();
    let c = db.state.listing_repo.find_by_id(c.id).await.unwrap().unwrap();
    assert_eq!(a.quantity, 0);
    assert!(!a.active);
    assert_eq!(b.quantity, 5);
    assert!(b.active);
    assert_eq!(c.quantity, 5);

    let bid = db.state.bid_repo.find_by_id(bid.id).await.unwrap().unwrap();
    assert_eq!(bid.remaining_quantity, 0);
    assert_eq!(bid.status_enum(), BidStatus::Filled);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn fill_bid_own_listing_only_reports_no_eligible() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Krugerrand", "1 oz").await;
    let buyer = Uuid::new_v4();
    create_test_listing(&db, bucket.id, buyer, 20, dec!(30)).await;

    let bid = create_test_bid(&db, bucket.id, buyer, 10, dec!(50)).await;
    let outcome = db.state.matching_service.fill_bid(bid.id).await.unwrap();

    assert_eq!(outcome.filled, 0);
    assert!(outcome.no_eligible);
    assert_eq!(outcome.status, BidStatus::Open);
    assert!(outcome.orders.is_empty());

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn buy_order_partial_fill_reports_remaining() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "silver", "Britannia", "1 oz").await;
    let buyer = Uuid::new_v4();
    create_test_listing(&db, bucket.id, Uuid::new_v4(), 4, dec!(33)).await;

    let outcome = db
        .state
        .matching_service
        .fill_buy_order(buyer, bucket.id, 10, BuyOptions::default())
        .await
        .unwrap();

    match outcome {
        BuyOutcome::PartiallyFilled { remaining, fills, .. } => {
            assert_eq!(remaining, 6);
            assert_eq!(fills.iter().map(|f| f.quantity).sum::<i64>(), 4);
        }
        other => panic!("expected partial fill, got {:?}", other),
    }

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn buy_order_honors_active_price_lock() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Philharmonic", "1 oz").await;
    let buyer = Uuid::new_v4();
    let listing = create_test_listing(&db, bucket.id, Uuid::new_v4(), 2, dec!(2000)).await;

    let lock = db
        .state
        .lock_service
        .create_lock(listing.id, buyer)
        .await
        .unwrap();
    assert_eq!(lock.locked_price, dec!(2000.00));

    // Seller repricing after the lock does not affect this buyer
    sqlx::query("UPDATE listings SET price = 2100 WHERE id = $1")
        .bind(listing.id)
        .execute(&db.pool)
        .await
        .unwrap();

    let outcome = db
        .state
        .matching_service
        .fill_buy_order(buyer, bucket.id, 2, BuyOptions::default())
        .await
        .unwrap();

    match outcome {
        BuyOutcome::Filled { fills, .. } => {
            assert_eq!(fills.len(), 1);
            assert_eq!(fills[0].price_each, dec!(2000.00));
        }
        other => panic!("expected full fill, got {:?}", other),
    }

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn price_lock_is_stable_within_ttl_and_gone_after() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Buffalo", "1 oz").await;
    let user = Uuid::new_v4();
    let listing = create_test_listing(&db, bucket.id, Uuid::new_v4(), 1, dec!(1999.50)).await;

    let lock = db.state.lock_service.create_lock(listing.id, user).await.unwrap();

    // Two reads inside the TTL window see the identical price
    let first = db.state.lock_service.active_lock(listing.id, user).await.unwrap().unwrap();
    let second = db.state.lock_service.active_lock(listing.id, user).await.unwrap().unwrap();
    assert_eq!(first.id, lock.id);
    assert_eq!(first.locked_price, second.locked_price);

    // Past expiry the lock is silently ignored
    db.clock.advance(Duration::seconds(31));
    let gone = db.state.lock_service.active_lock(listing.id, user).await.unwrap();
    assert!(gone.is_none());

    // The sweep removes the row
    let removed = db.state.lock_service.cleanup().await.unwrap();
    assert_eq!(removed, 1);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn auto_fill_serves_best_bid_first() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "silver", "Kangaroo", "1 oz").await;
    let seller = Uuid::new_v4();

    let high = create_test_bid(&db, bucket.id, Uuid::new_v4(), 3, dec!(36)).await;
    let low = create_test_bid(&db, bucket.id, Uuid::new_v4(), 5, dec!(33)).await;
    // Below the ask; must not fill
    let below = create_test_bid(&db, bucket.id, Uuid::new_v4(), 5, dec!(29)).await;

    let listing = create_test_listing(&db, bucket.id, seller, 5, dec!(30)).await;
    let outcomes = db
        .state
        .matching_service
        .auto_fill_listing(listing.id)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].bid_id, high.id);
    assert_eq!(outcomes[0].filled, 3);
    assert_eq!(outcomes[1].bid_id, low.id);
    assert_eq!(outcomes[1].filled, 2);
    // Fills execute at the listing's ask price
    assert!(outcomes.iter().all(|o| o.fills[0].price_each == dec!(30.00)));

    let listing = db.state.listing_repo.find_by_id(listing.id).await.unwrap().unwrap();
    assert_eq!(listing.quantity, 0);
    assert!(!listing.active);

    let below = db.state.bid_repo.find_by_id(below.id).await.unwrap().unwrap();
    assert_eq!(below.remaining_quantity, 5);
    assert_eq!(below.status_enum(), BidStatus::Open);

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn history_records_steps_and_skips_noise() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Sovereign", "1 oz").await;
    let history = &db.state.history_service;

    assert!(history.record_price_change(bucket.id, dec!(500.00)).await.unwrap());
    // Within epsilon of the last point: skipped
    assert!(!history.record_price_change(bucket.id, dec!(500.009)).await.unwrap());
    db.clock.advance(Duration::seconds(60));
    assert!(history.record_price_change(bucket.id, dec!(501.00)).await.unwrap());

    let points = history.history(bucket.id, 7).await.unwrap();
    assert_eq!(points.len(), 2);
    assert!(points[0].recorded_at <= points[1].recorded_at);
    assert!((points[1].price - points[0].price).abs() >= dec!(0.01));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn chart_window_forward_fills_from_older_point() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "gold", "Libertad", "1 oz").await;
    let history = &db.state.history_service;

    history.record_price_change(bucket.id, dec!(750.00)).await.unwrap();

    // Window well past the only point: the raw log is empty, the chart read
    // carries the point forward to the window start
    db.clock.advance(Duration::days(30));
    let raw = history.history(bucket.id, 7).await.unwrap();
    assert!(raw.is_empty());

    let chart = history.history_for_chart(bucket.id, 7).await.unwrap();
    assert_eq!(chart.len(), 1);
    assert_eq!(chart[0].price, dec!(750.00));
    assert_eq!(chart[0].recorded_at, db.clock.now() - Duration::days(7));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn isolated_bucket_uses_midpoint_when_bid_exists() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_isolated_bucket(&db, "1907 Double Eagle #12/50").await;
    create_test_listing(&db, bucket.id, Uuid::new_v4(), 1, dec!(1000)).await;
    create_test_bid(&db, bucket.id, Uuid::new_v4(), 1, dec!(1200)).await;
    create_test_bid(&db, bucket.id, Uuid::new_v4(), 1, dec!(1100)).await;

    let best = db
        .state
        .history_service
        .current_best_ask(bucket.id, None, None)
        .await
        .unwrap();

    // Midpoint of lowest ask and the single highest bid
    assert_eq!(best, Some(dec!(1100.00)));

    db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires a PostgreSQL test database"]
async fn history_cleanup_prunes_old_points() {
    let db = TestDatabase::new().await;
    db.cleanup().await;

    let bucket = create_test_bucket(&db, "silver", "Morgan Dollar", "1 oz").await;
    let history = &db.state.history_service;

    history.record_price_change(bucket.id, dec!(45.00)).await.unwrap();
    db.clock.advance(Duration::days(400));
    history.record_price_change(bucket.id, dec!(46.00)).await.unwrap();

    let removed = history.cleanup(365).await.unwrap();
    assert_eq!(removed, 1);

    let remaining = history.history(bucket.id, 401).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].price, dec!(46.00));

    db.cleanup().await;
}
