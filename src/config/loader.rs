//! Settings Loader
//!
//! Loads and validates application settings from an optional TOML file.
//! Every section has defaults so the dashboard runs without one.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::application::config_store::DEFAULT_CONFIG_PATH;
use crate::application::log_sink::DEFAULT_HISTORY_LINES;

/// Main settings structure matching bitvision.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub commands: CommandsSection,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub autotrade: AutotradeSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// File locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// Credentials and autotrade dotfile (`~` is expanded)
    #[serde(default = "default_config_path")]
    pub config_path: String,
    #[serde(default = "default_blockchain_data")]
    pub blockchain_data: String,
    #[serde(default = "default_headline_data")]
    pub headline_data: String,
    #[serde(default = "default_technical_data")]
    pub technical_data: String,
    #[serde(default = "default_price_data")]
    pub price_data: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            blockchain_data: default_blockchain_data(),
            headline_data: default_headline_data(),
            technical_data: default_technical_data(),
            price_data: default_price_data(),
        }
    }
}

impl PathsSection {
    /// Config path with `BITVISION_CONFIG_PATH` override and `~` expanded
    pub fn resolved_config_path(&self) -> PathBuf {
        let raw = std::env::var("BITVISION_CONFIG_PATH").unwrap_or_else(|_| self.config_path.clone());
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }
}

/// External command templates as argv lists; the first element is the program
#[derive(Debug, Clone, Deserialize)]
pub struct CommandsSection {
    /// Optional exchange login helper (empty = none)
    #[serde(default)]
    pub login: Vec<String>,
    /// Amount is appended as the final argument
    #[serde(default = "default_buy_command")]
    pub buy: Vec<String>,
    /// Amount is appended as the final argument
    #[serde(default = "default_sell_command")]
    pub sell: Vec<String>,
    #[serde(default = "default_refresh_command")]
    pub refresh: Vec<String>,
    #[serde(default = "default_retrain_command")]
    pub retrain: Vec<String>,
}

impl Default for CommandsSection {
    fn default() -> Self {
        Self {
            login: Vec::new(),
            buy: default_buy_command(),
            sell: default_sell_command(),
            refresh: default_refresh_command(),
            retrain: default_retrain_command(),
        }
    }
}

/// Periodic refresh loop
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Milliseconds between ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutotradeSection {
    /// Delay before a newly enabled trade fires
    #[serde(default = "default_delay_hours")]
    pub default_delay_hours: u32,
}

impl Default for AutotradeSection {
    fn default() -> Self {
        Self {
            default_delay_hours: default_delay_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Lines kept in the dashboard log panel
    #[serde(default = "default_history_lines")]
    pub history_lines: usize,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            history_lines: default_history_lines(),
        }
    }
}

fn default_config_path() -> String {
    DEFAULT_CONFIG_PATH.to_string()
}
fn default_blockchain_data() -> String {
    "../cache/data/blockchain.json".to_string()
}
fn default_headline_data() -> String {
    "../cache/data/headlines.json".to_string()
}
fn default_technical_data() -> String {
    "../cache/data/indicators.json".to_string()
}
fn default_price_data() -> String {
    "../cache/data/price_data.json".to_string()
}
fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}
fn default_buy_command() -> Vec<String> {
    argv(&["python3", "../services/trader.py", "-b"])
}
fn default_sell_command() -> Vec<String> {
    argv(&["python3", "../services/trader.py", "-s"])
}
fn default_refresh_command() -> Vec<String> {
    argv(&["python3", "../services/controller.py", "REFRESH"])
}
fn default_retrain_command() -> Vec<String> {
    argv(&["python3", "../services/controller.py", "RETRAIN"])
}
fn default_tick_interval_ms() -> u64 {
    500
}
fn default_delay_hours() -> u32 {
    24
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_history_lines() -> usize {
    DEFAULT_HISTORY_LINES
}

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load settings from a TOML file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path)?;
    let settings: Settings = toml::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

/// Load settings if the file exists, otherwise use defaults
pub fn load_settings_or_default<P: AsRef<Path>>(path: P) -> Result<Settings, SettingsError> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::debug!("No settings file at {}, using defaults", path.display());
        return Ok(Settings::default());
    }
    load_settings(path)
}

impl Settings {
    /// Validate all settings
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.paths.config_path.trim().is_empty() {
            return Err(SettingsError::ValidationError(
                "config_path cannot be empty".to_string(),
            ));
        }

        for (name, argv) in [
            ("buy", &self.commands.buy),
            ("sell", &self.commands.sell),
            ("refresh", &self.commands.refresh),
            ("retrain", &self.commands.retrain),
        ] {
            if argv.first().map_or(true, |p| p.trim().is_empty()) {
                return Err(SettingsError::ValidationError(format!(
                    "commands.{} must name a program",
                    name
                )));
            }
        }

        if self.scheduler.tick_interval_ms == 0 {
            return Err(SettingsError::ValidationError(
                "tick_interval_ms must be > 0".to_string(),
            ));
        }

        if self.logging.history_lines == 0 {
            return Err(SettingsError::ValidationError(
                "history_lines must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_settings(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_full_settings() {
        let file = write_settings(
            r#"
[paths]
config_path = "/tmp/bitvision.json"
headline_data = "cache/headlines.json"

[commands]
login = ["python3", "login.py"]
buy = ["trader", "--buy"]
sell = ["trader", "--sell"]
refresh = ["controller", "REFRESH"]
retrain = ["controller", "RETRAIN"]

[scheduler]
tick_interval_ms = 2000

[autotrade]
default_delay_hours = 12

[logging]
level = "info"
history_lines = 100
"#,
        );

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.paths.config_path, "/tmp/bitvision.json");
        assert_eq!(settings.paths.headline_data, "cache/headlines.json");
        assert_eq!(settings.paths.price_data, "../cache/data/price_data.json");
        assert_eq!(settings.commands.buy, vec!["trader", "--buy"]);
        assert_eq!(settings.commands.login, vec!["python3", "login.py"]);
        assert_eq!(settings.scheduler.tick_interval_ms, 2000);
        assert_eq!(settings.autotrade.default_delay_hours, 12);
        assert_eq!(settings.logging.history_lines, 100);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_settings("");
        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.scheduler.tick_interval_ms, 500);
        assert_eq!(settings.autotrade.default_delay_hours, 24);
        assert!(settings.commands.login.is_empty());
        assert_eq!(settings.commands.refresh.last().unwrap(), "REFRESH");
    }

    #[test]
    fn test_missing_file_defaults() {
        let settings = load_settings_or_default("/nonexistent/bitvision.toml").unwrap();
        assert_eq!(settings.paths.config_path, DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_missing_file_is_error_when_required() {
        let result = load_settings("/nonexistent/bitvision.toml");
        assert!(matches!(result.unwrap_err(), SettingsError::IoError(_)));
    }

    #[test]
    fn test_zero_tick_interval_rejected() {
        let file = write_settings("[scheduler]\ntick_interval_ms = 0\n");
        assert!(matches!(
            load_settings(file.path()).unwrap_err(),
            SettingsError::ValidationError(_)
        ));
    }

    #[test]
    fn test_empty_trade_command_rejected() {
        let file = write_settings("[commands]\nbuy = []\n");
        assert!(matches!(
            load_settings(file.path()).unwrap_err(),
            SettingsError::ValidationError(_)
        ));
    }

    #[test]
    fn test_bad_toml_rejected() {
        let file = write_settings("[scheduler\n");
        assert!(matches!(
            load_settings(file.path()).unwrap_err(),
            SettingsError::ParseError(_)
        ));
    }

    #[test]
    fn test_tilde_expanded() {
        let paths = PathsSection {
            config_path: "~/.bitvision.json".to_string(),
            ..PathsSection::default()
        };
        if std::env::var("BITVISION_CONFIG_PATH").is_err() {
            let resolved = paths.resolved_config_path();
            assert!(!resolved.to_string_lossy().starts_with('~'));
            assert!(resolved.ends_with(".bitvision.json"));
        }
    }
}
