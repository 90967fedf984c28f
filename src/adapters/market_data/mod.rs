//! Market Data Adapters
//!
//! Dashboard data sources:
//! - `CacheDataFeed`: reads the headline, indicator and price caches written
//!   by the refresh job and exposes a redraw counter to the renderer

mod cache_feed;

pub use cache_feed::{CacheDataFeed, CachePaths};
