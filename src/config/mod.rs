//! Settings Module
//!
//! Loads and validates application settings from TOML files.

pub mod loader;

pub use loader::{
    load_settings, load_settings_or_default, CommandsSection, Settings, SettingsError,
};
