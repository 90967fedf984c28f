//! Application State
//!
//! Composes every component from the loaded settings. Components receive
//! their collaborators through their constructors; nothing is global.

use std::sync::Arc;
use std::time::Duration;

use super::autotrade::AutotradeController;
use super::config_store::{ConfigStore, StoreError};
use super::credentials::CredentialManager;
use super::dispatcher::{CommandDispatcher, CommandTemplates};
use super::log_sink::LogSink;
use super::scheduler::RefreshScheduler;
use crate::adapters::market_data::{CacheDataFeed, CachePaths};
use crate::adapters::process::ProcessRunner;
use crate::config::Settings;
use crate::ports::{DashboardPort, ProcessPort};

#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
    pub log: LogSink,
    pub store: Arc<ConfigStore>,
    pub credentials: CredentialManager,
    pub autotrade: AutotradeController,
    pub dispatcher: CommandDispatcher,
    pub scheduler: RefreshScheduler,
}

impl AppState {
    /// Wire the production adapters: real processes and the on-disk data cache
    pub fn from_settings(settings: Settings) -> (Self, CacheDataFeed) {
        let log = LogSink::new(settings.logging.history_lines);
        let runner = Arc::new(ProcessRunner::new(log.clone()));
        let feed = CacheDataFeed::new(CachePaths::from(&settings.paths));
        let state = Self::with_ports(settings, log, runner, Arc::new(feed.clone()));
        (state, feed)
    }

    /// Wire the components around caller-supplied ports
    pub fn with_ports(
        settings: Settings,
        log: LogSink,
        runner: Arc<dyn ProcessPort>,
        dashboard: Arc<dyn DashboardPort>,
    ) -> Self {
        let store = Arc::new(ConfigStore::new(settings.paths.resolved_config_path()));
        let credentials = CredentialManager::new(Arc::clone(&store), log.clone());
        let autotrade = AutotradeController::new(Arc::clone(&store), log.clone());
        let dispatcher = CommandDispatcher::new(
            CommandTemplates::from(&settings.commands),
            runner,
            credentials.clone(),
            log.clone(),
        );
        let scheduler = RefreshScheduler::new(
            dashboard,
            autotrade.clone(),
            dispatcher.clone(),
            log.clone(),
        )
        .with_tick_interval(Duration::from_millis(settings.scheduler.tick_interval_ms));

        Self {
            settings,
            log,
            store,
            credentials,
            autotrade,
            dispatcher,
            scheduler,
        }
    }

    /// Create the default configuration document if none exists yet
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        let path = self.store.path().display().to_string();
        match self.store.ensure_exists().await {
            Ok(true) => {
                self.log.info(format!("No dotfile found at {}. Creating default.", path));
                Ok(())
            }
            Ok(false) => {
                tracing::debug!("Configuration exists at {}", path);
                Ok(())
            }
            Err(e) => {
                self.log.error(format!("Failed to create {}: {}", path, e));
                Err(e)
            }
        }
    }

    pub fn default_delay_hours(&self) -> u32 {
        self.settings.autotrade.default_delay_hours
    }
}
