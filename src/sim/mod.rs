/// Simulation clock for tick management.
pub mod clock;
pub mod engine;
pub mod kpi;
/// Synthetic day-ahead price feed.
pub mod price_feed;
pub mod types;
