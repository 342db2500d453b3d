// Technical indicators module
// Simple moving averages over price and volume

pub mod moving_average;

pub use moving_average::{calculate_sma, sma_series};
