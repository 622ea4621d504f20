pub mod maintenance;
pub mod market_poller;
pub mod matching_service;
pub mod price_history;
pub mod price_lock;
pub mod spot_price;

pub use maintenance::MaintenanceTask;
pub use market_poller::MarketPoller;
pub use matching_service::{BidFillOutcome, BuyOptions, BuyOutcome, MatchingService};
pub use price_history::PriceHistoryService;
pub use price_lock::PriceLockService;
pub use spot_price::SpotPriceCache;
