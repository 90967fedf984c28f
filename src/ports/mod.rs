//! Ports Layer - Trait definitions for external collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - External command execution (trader and model scripts)
//! - The dashboard data feed and renderer

pub mod process;
pub mod dashboard;
pub mod mocks;

pub use process::{ProcessError, ProcessExit, ProcessHandle, ProcessInvocation, ProcessPort};
pub use dashboard::{DashboardError, DashboardPort};
