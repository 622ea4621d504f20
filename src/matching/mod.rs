//! Pure matching logic: greedy fill planning over priced candidates.

pub mod greedy;

pub use greedy::{fills_by_seller, plan_fills, Candidate, Fill, FillPlan};
