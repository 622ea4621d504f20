pub mod bid_repository;
pub mod bucket_repository;
pub mod listing_repository;
pub mod order_repository;
pub mod price_history_repository;
pub mod price_lock_repository;

// Re-export all repositories for convenient access
pub use bid_repository::{BidRepository, NewBid};
pub use bucket_repository::BucketRepository;
pub use listing_repository::{ListingRepository, NewListing};
pub use order_repository::OrderRepository;
pub use price_history_repository::PriceHistoryRepository;
pub use price_lock_repository::PriceLockRepository;
