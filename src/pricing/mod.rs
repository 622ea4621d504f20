//! Pure pricing math: weight parsing and effective price resolution.

pub mod engine;
pub mod weight;

pub use engine::{effective_ask_price, effective_bid_price, EffectivePrice, FallbackReason};
pub use weight::{Weight, WeightUnit};
