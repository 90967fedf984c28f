//! CLI Adapter
//!
//! Command-line interface for the Bitvision dashboard.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{AutotradeCmd, ClearCredentialsCmd, CliApp, Command, LoginCmd, TradeCmd};

use anyhow::Result;
use std::process::ExitCode;

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<ExitCode> {
    commands::execute(app).await
}
