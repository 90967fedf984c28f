//! Command Dispatcher
//!
//! Maps operator actions to external command invocations. Buy and sell are
//! gated on a positive amount and valid credentials; nothing is spawned when
//! either check fails.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use super::credentials::CredentialManager;
use super::log_sink::LogSink;
use crate::config::CommandsSection;
use crate::domain::TradeSide;
use crate::ports::{ProcessError, ProcessHandle, ProcessPort};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unauthorized: trading requires a key, secret and passphrase")]
    Unauthorized,

    #[error("Trade amount must be > 0, got {0}")]
    InvalidAmount(Decimal),

    #[error("Trade side must be BUY or SELL")]
    InvalidSide,

    #[error("No command configured for {0}")]
    NotConfigured(Action),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Operator actions that run an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Login,
    Buy,
    Sell,
    Refresh,
    Retrain,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Login => "login",
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Refresh => "refresh",
            Action::Retrain => "retrain",
        };
        f.write_str(name)
    }
}

/// Program plus fixed leading arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandTemplate {
    /// Build from an argv list; `None` when the list names no program
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn args_with(&self, extra: Option<String>) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(extra);
        args
    }
}

#[derive(Debug, Clone, Default)]
pub struct CommandTemplates {
    pub login: Option<CommandTemplate>,
    pub buy: Option<CommandTemplate>,
    pub sell: Option<CommandTemplate>,
    pub refresh: Option<CommandTemplate>,
    pub retrain: Option<CommandTemplate>,
}

impl From<&CommandsSection> for CommandTemplates {
    fn from(section: &CommandsSection) -> Self {
        Self {
            login: CommandTemplate::from_argv(&section.login),
            buy: CommandTemplate::from_argv(&section.buy),
            sell: CommandTemplate::from_argv(&section.sell),
            refresh: CommandTemplate::from_argv(&section.refresh),
            retrain: CommandTemplate::from_argv(&section.retrain),
        }
    }
}

impl CommandTemplates {
    fn get(&self, action: Action) -> Option<&CommandTemplate> {
        match action {
            Action::Login => self.login.as_ref(),
            Action::Buy => self.buy.as_ref(),
            Action::Sell => self.sell.as_ref(),
            Action::Refresh => self.refresh.as_ref(),
            Action::Retrain => self.retrain.as_ref(),
        }
    }
}

/// Plain decimal string passed to the trader, e.g. `0.5` or `1`
pub fn format_amount(amount: Decimal) -> String {
    amount.normalize().to_string()
}

#[derive(Clone)]
pub struct CommandDispatcher {
    templates: CommandTemplates,
    runner: Arc<dyn ProcessPort>,
    credentials: CredentialManager,
    log: LogSink,
}

impl CommandDispatcher {
    pub fn new(
        templates: CommandTemplates,
        runner: Arc<dyn ProcessPort>,
        credentials: CredentialManager,
        log: LogSink,
    ) -> Self {
        Self {
            templates,
            runner,
            credentials,
            log,
        }
    }

    pub async fn login(&self) -> Result<ProcessHandle, DispatchError> {
        self.dispatch(Action::Login, None)
    }

    pub async fn buy(&self, amount: Decimal) -> Result<ProcessHandle, DispatchError> {
        self.trade(TradeSide::Buy, amount).await
    }

    pub async fn sell(&self, amount: Decimal) -> Result<ProcessHandle, DispatchError> {
        self.trade(TradeSide::Sell, amount).await
    }

    /// Place a trade on either side after the amount and credential checks
    pub async fn trade(
        &self,
        side: TradeSide,
        amount: Decimal,
    ) -> Result<ProcessHandle, DispatchError> {
        let action = match side {
            TradeSide::Buy => Action::Buy,
            TradeSide::Sell => Action::Sell,
            TradeSide::None => return Err(self.reject(DispatchError::InvalidSide)),
        };

        if amount <= Decimal::ZERO {
            return Err(self.reject(DispatchError::InvalidAmount(amount)));
        }
        if !self.credentials.has_valid_credentials().await {
            return Err(self.reject(DispatchError::Unauthorized));
        }

        self.log.info(format!("{} {} BTC", side, format_amount(amount)));
        self.dispatch(action, Some(format_amount(amount)))
    }

    pub async fn refresh(&self) -> Result<ProcessHandle, DispatchError> {
        self.log.info("Refresh Data");
        self.dispatch(Action::Refresh, None)
    }

    pub async fn retrain(&self) -> Result<ProcessHandle, DispatchError> {
        self.log.info("Retrain Model");
        self.dispatch(Action::Retrain, None)
    }

    fn dispatch(
        &self,
        action: Action,
        extra_arg: Option<String>,
    ) -> Result<ProcessHandle, DispatchError> {
        let template = self
            .templates
            .get(action)
            .ok_or_else(|| self.reject(DispatchError::NotConfigured(action)))?;

        // Spawn failures are already logged by the runner.
        let handle = self
            .runner
            .run(&template.program, &template.args_with(extra_arg))?;
        Ok(handle)
    }

    fn reject(&self, err: DispatchError) -> DispatchError {
        self.log.error(format!("Dispatch rejected: {}", err));
        err
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("templates", &self.templates)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ConfigStore;
    use crate::domain::Credentials;
    use crate::ports::mocks::MockProcessRunner;
    use rust_decimal_macros::dec;
    use tempfile::{tempdir, TempDir};

    mockall::mock! {
        pub Runner {}
        impl ProcessPort for Runner {
            fn run(&self, command: &str, args: &[String]) -> Result<ProcessHandle, ProcessError>;
        }
    }

    struct Fixture {
        _dir: TempDir,
        credentials: CredentialManager,
        log: LogSink,
    }

    async fn fixture(valid: bool) -> Fixture {
        let dir = tempdir().unwrap();
        let store = Arc::new(ConfigStore::new(dir.path().join(".bitvision.json")));
        let log = LogSink::default();
        let credentials = CredentialManager::new(store, log.clone());
        if valid {
            credentials
                .set_credentials(Credentials::new("k", "s", "p"))
                .await
                .unwrap();
        }
        Fixture {
            _dir: dir,
            credentials,
            log,
        }
    }

    fn templates() -> CommandTemplates {
        CommandTemplates::from(&CommandsSection::default())
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(0.5)), "0.5");
        assert_eq!(format_amount(dec!(1.000)), "1");
        assert_eq!(format_amount(dec!(0.00012300)), "0.000123");
    }

    #[test]
    fn test_template_from_argv() {
        assert_eq!(CommandTemplate::from_argv(&[]), None);
        assert_eq!(CommandTemplate::from_argv(&[" ".to_string()]), None);
        let t = CommandTemplate::from_argv(&["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(t.program, "a");
        assert_eq!(t.args, vec!["b"]);
    }

    #[tokio::test]
    async fn test_buy_without_credentials_never_spawns() {
        let fx = fixture(false).await;
        let mut runner = MockRunner::new();
        runner.expect_run().never();

        let dispatcher =
            CommandDispatcher::new(templates(), Arc::new(runner), fx.credentials, fx.log.clone());

        let result = dispatcher.buy(dec!(1.0)).await;
        assert!(matches!(result, Err(DispatchError::Unauthorized)));
        assert!(fx.log.contains("Unauthorized"));
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let fx = fixture(true).await;
        let mut runner = MockRunner::new();
        runner.expect_run().never();

        let dispatcher =
            CommandDispatcher::new(templates(), Arc::new(runner), fx.credentials, fx.log);

        assert!(matches!(
            dispatcher.sell(dec!(0)).await,
            Err(DispatchError::InvalidAmount(_))
        ));
        assert!(matches!(
            dispatcher.buy(dec!(-2)).await,
            Err(DispatchError::InvalidAmount(_))
        ));
        assert!(matches!(
            dispatcher.trade(TradeSide::None, dec!(1)).await,
            Err(DispatchError::InvalidSide)
        ));
    }

    #[tokio::test]
    async fn test_buy_and_sell_append_amount() {
        let fx = fixture(true).await;
        let runner = MockProcessRunner::new();
        let dispatcher = CommandDispatcher::new(
            templates(),
            Arc::new(runner.clone()),
            fx.credentials,
            fx.log,
        );

        dispatcher.buy(dec!(0.5)).await.unwrap().wait().await.unwrap();
        dispatcher.sell(dec!(2)).await.unwrap().wait().await.unwrap();

        let calls = runner.get_calls();
        assert_eq!(calls[0].0, "python3");
        assert_eq!(calls[0].1, vec!["../services/trader.py", "-b", "0.5"]);
        assert_eq!(calls[1].1, vec!["../services/trader.py", "-s", "2"]);
    }

    #[tokio::test]
    async fn test_refresh_and_retrain_fixed_commands() {
        let fx = fixture(false).await;
        let runner = MockProcessRunner::new();
        let dispatcher = CommandDispatcher::new(
            templates(),
            Arc::new(runner.clone()),
            fx.credentials,
            fx.log,
        );

        // no credential gate on data commands
        dispatcher.refresh().await.unwrap();
        dispatcher.retrain().await.unwrap();

        let calls = runner.get_calls();
        assert_eq!(calls[0].1, vec!["../services/controller.py", "REFRESH"]);
        assert_eq!(calls[1].1, vec!["../services/controller.py", "RETRAIN"]);
    }

    #[tokio::test]
    async fn test_login_not_configured() {
        let fx = fixture(false).await;
        let runner = MockProcessRunner::new();
        let dispatcher = CommandDispatcher::new(
            templates(),
            Arc::new(runner.clone()),
            fx.credentials,
            fx.log,
        );

        assert!(matches!(
            dispatcher.login().await,
            Err(DispatchError::NotConfigured(Action::Login))
        ));
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_propagates() {
        let fx = fixture(true).await;
        let runner = MockProcessRunner::new().with_spawn_failure("python3");
        let dispatcher =
            CommandDispatcher::new(templates(), Arc::new(runner), fx.credentials, fx.log);

        assert!(matches!(
            dispatcher.retrain().await,
            Err(DispatchError::Process(ProcessError::SpawnFailed { .. }))
        ));
    }
}
