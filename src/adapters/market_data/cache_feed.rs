//! Cache Data Feed
//!
//! Reads the JSON caches written by the refresh job into a dashboard
//! snapshot. A failed read keeps the last good table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use tokio::sync::{watch, RwLock};

use crate::config::loader::PathsSection;
use crate::domain::{DashboardSnapshot, DataTable, PriceData};
use crate::ports::{DashboardError, DashboardPort};

/// Locations of the JSON files written by the data refresh job
#[derive(Debug, Clone)]
pub struct CachePaths {
    pub headlines: PathBuf,
    pub technical: PathBuf,
    pub blockchain: PathBuf,
    pub prices: PathBuf,
}

impl From<&PathsSection> for CachePaths {
    fn from(paths: &PathsSection) -> Self {
        let expand = |p: &str| PathBuf::from(shellexpand::tilde(p).into_owned());
        Self {
            headlines: expand(&paths.headline_data),
            technical: expand(&paths.technical_data),
            blockchain: expand(&paths.blockchain_data),
            prices: expand(&paths.price_data),
        }
    }
}

/// Dashboard data source backed by the cache files on disk
///
/// A refresh replaces the snapshot only when all four files load; on any
/// failure the previous snapshot stays visible.
#[derive(Debug, Clone)]
pub struct CacheDataFeed {
    paths: CachePaths,
    snapshot: Arc<RwLock<DashboardSnapshot>>,
    redraw: Arc<watch::Sender<u64>>,
}

impl CacheDataFeed {
    pub fn new(paths: CachePaths) -> Self {
        let (redraw, _) = watch::channel(0);
        Self {
            paths,
            snapshot: Arc::new(RwLock::new(DashboardSnapshot::default())),
            redraw: Arc::new(redraw),
        }
    }

    /// Latest successfully loaded data
    pub async fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Receiver that changes on every redraw request
    pub fn subscribe_redraw(&self) -> watch::Receiver<u64> {
        self.redraw.subscribe()
    }

    pub fn redraw_generation(&self) -> u64 {
        *self.redraw.borrow()
    }

    async fn load(&self) -> Result<DashboardSnapshot, DashboardError> {
        let headlines: DataTable = read_json(&self.paths.headlines).await?;
        let technical: DataTable = read_json(&self.paths.technical).await?;
        let blockchain: DataTable = read_json(&self.paths.blockchain).await?;
        let prices: PriceData = read_json(&self.paths.prices).await?;

        Ok(DashboardSnapshot {
            headlines: headlines.headlines(),
            technical: technical.technical_indicators(),
            blockchain: blockchain.blockchain_indicators(),
            prices,
            refreshed_at: Utc::now().timestamp(),
        })
    }
}

#[async_trait]
impl DashboardPort for CacheDataFeed {
    async fn refresh_data(&self) -> Result<(), DashboardError> {
        let loaded = self.load().await?;
        tracing::debug!(
            headlines = loaded.headlines.len(),
            ticks = loaded.prices.data.len(),
            "Dashboard data refreshed"
        );
        *self.snapshot.write().await = loaded;
        Ok(())
    }

    fn request_redraw(&self) {
        self.redraw.send_modify(|generation| *generation += 1);
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DashboardError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DashboardError::ReadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

    serde_json::from_str(&content).map_err(|e| DashboardError::ParseError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
