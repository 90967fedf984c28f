//! Bitvision - Bitcoin Trading Dashboard
//!
//! Command-line entry point for the dashboard core.

use std::process::ExitCode;

use anyhow::Result;

use bitvision::adapters::cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if it exists (BITVISION_CONFIG_PATH and friends)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
