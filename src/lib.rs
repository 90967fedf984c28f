//! Bitvision - Bitcoin Trading Dashboard Library
//!
//! Core of a terminal trading dashboard: exchange credentials, a one-shot
//! autotrade schedule and execution of the external trader and model scripts.
//!
//! # Modules
//!
//! - `domain`: Core types and invariants (ConfigDocument, Credentials, AutotradeSettings)
//! - `ports`: Trait abstractions (ProcessPort, DashboardPort) and test doubles
//! - `adapters`: External implementations (ProcessRunner, CacheDataFeed, CLI)
//! - `config`: Settings loading and validation
//! - `application`: ConfigStore, managers, dispatcher, scheduler and AppState

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
