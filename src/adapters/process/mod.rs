//! Process Adapters
//!
//! Tokio-based execution of the external trader and data-refresh scripts.

mod runner;

pub use runner::ProcessRunner;
