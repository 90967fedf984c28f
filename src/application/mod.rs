pub mod app_state;
pub mod autotrade;
pub mod config_store;
pub mod credentials;
pub mod dispatcher;
pub mod log_sink;
pub mod scheduler;

pub use app_state::AppState;
pub use autotrade::{AutotradeController, AutotradeError, AutotradeState, Transition};
pub use config_store::{ConfigStore, StoreError, UpdateOutcome, DEFAULT_CONFIG_PATH};
pub use credentials::{CredentialError, CredentialManager, CLEAR_CREDENTIALS_WARNING};
pub use dispatcher::{
    format_amount, Action, CommandDispatcher, CommandTemplate, CommandTemplates, DispatchError,
};
pub use log_sink::{LogLevel, LogLine, LogSink, DEFAULT_HISTORY_LINES};
pub use scheduler::{RefreshScheduler, SchedulerStatus, TickReport, DEFAULT_TICK_INTERVAL};
