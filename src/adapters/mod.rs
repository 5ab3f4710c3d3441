//! Concrete adapter implementations for ports.

pub mod yahoo_adapter;
pub mod file_loader;
pub mod csv_export;
pub mod holt_forecaster;
pub mod file_config_adapter;
