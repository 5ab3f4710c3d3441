//! Port traits at the I/O seams.

pub mod market_data_port;
pub mod forecast_port;
pub mod config_port;
