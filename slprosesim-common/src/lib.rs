//! Common types and utilities for slprosesim
//!
//! This crate provides the configuration structures, error type, logging
//! bootstrap and simulated-time primitives shared by the slprosesim crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod sim_clock;

pub use config::{DirectLinkConfig, ProseConfig, RelaySelectionConfig};
pub use error::Error;
pub use logging::{init_logging, init_logging_with_filter, Direction, LogLevel};
pub use sim_clock::SimClock;
