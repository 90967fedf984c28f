//! Dashboard Port
//!
//! The market-data side of the dashboard: reloading cached data and
//! asking the renderer to redraw. The scheduler drives both every tick.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Failed to read {path}: {reason}")]
    ReadError { path: String, reason: String },

    #[error("Malformed data in {path}: {reason}")]
    ParseError { path: String, reason: String },
}

#[async_trait]
pub trait DashboardPort: Send + Sync {
    /// Reload market data shown by the dashboard tables
    async fn refresh_data(&self) -> Result<(), DashboardError>;

    /// Ask the renderer to redraw with the latest state
    fn request_redraw(&self);
}
