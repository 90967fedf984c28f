//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Process: tokio-backed runner for the trader and data scripts
//! - Market Data: cached headline, indicator and price files
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod market_data;
pub mod process;

pub use cli::CliApp;
pub use market_data::{CacheDataFeed, CachePaths};
pub use process::ProcessRunner;
