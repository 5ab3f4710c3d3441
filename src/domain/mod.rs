//! Core domain types and logic.

pub mod ohlcv;
pub mod period;
pub mod symbol;
pub mod retry;
pub mod cache;
pub mod normalize;
pub mod fetcher;
pub mod pl;
pub mod indicator;
pub mod signal;
pub mod forecast;
pub mod monthly;
pub mod analytics;
pub mod settings;
pub mod error;
