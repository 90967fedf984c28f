//! Domain Layer - Core types for the Bitvision dashboard
//!
//! Pure data and invariants with no I/O. Persistence, process execution
//! and scheduling live in the application and adapters layers.
//!
//! - `credentials`: exchange API credentials and their validity rule
//! - `autotrade`: one-shot trade schedule and its evaluation
//! - `document`: the persisted configuration document and its invariants
//! - `dashboard`: cached market data shown by the dashboard tables

pub mod credentials;
pub mod autotrade;
pub mod document;
pub mod dashboard;

pub use credentials::Credentials;
pub use autotrade::{AutotradeSettings, ScheduleDecision, TradeSide, SECONDS_PER_HOUR};
pub use document::{ConfigDocument, DocumentViolation};
pub use dashboard::{
    trim_if_longer_than, BlockchainIndicator, DashboardSnapshot, DataTable, Headline,
    PriceData, PriceTick, TechnicalIndicator, MAX_HEADLINE_LENGTH,
};
