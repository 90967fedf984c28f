//! CLI Command Handlers
//!
//! Every dashboard action is exposed as a subcommand. Handlers build the
//! application state from settings, run the core operation and print the
//! operator log as it is produced.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::sync::broadcast;

use crate::adapters::market_data::CacheDataFeed;
use crate::application::{
    Action, AppState, AutotradeState, DispatchError, LogLine, Transition,
    CLEAR_CREDENTIALS_WARNING,
};
use crate::config::{load_settings_or_default, Settings};
use crate::domain::{Credentials, TradeSide};
use crate::ports::{DashboardPort, ProcessExit, ProcessHandle};

/// Bitvision - Bitcoin trading dashboard
#[derive(Parser, Debug)]
#[command(
    name = "bitvision",
    version = concat!("v", env!("CARGO_PKG_VERSION")),
    about = "Bitcoin trading dashboard with one-shot autotrade scheduling",
    long_about = "Bitvision stores exchange credentials, schedules a single delayed trade \
                  and runs the external trader and data-refresh scripts, streaming their \
                  output to the operator log."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Path to the settings file (defaults apply when missing)
    #[arg(short, long, global = true, value_name = "FILE", default_value = "bitvision.toml")]
    pub settings: PathBuf,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the refresh scheduler and follow the log until Ctrl+C
    Dashboard,

    /// Show credential and autotrade status
    Status,

    /// Save exchange credentials
    Login(LoginCmd),

    /// Delete stored credentials and any scheduled autotrade
    ClearCredentials(ClearCredentialsCmd),

    /// Buy BTC through the trader script
    Buy(TradeCmd),

    /// Sell BTC through the trader script
    Sell(TradeCmd),

    /// Refresh the cached market data
    Refresh,

    /// Retrain the price model
    Retrain,

    /// Manage the one-shot autotrade schedule
    #[command(subcommand)]
    Autotrade(AutotradeCmd),
}

#[derive(Parser, Debug)]
pub struct LoginCmd {
    /// API key
    #[arg(long)]
    pub key: String,

    /// API secret
    #[arg(long)]
    pub secret: String,

    /// API passphrase
    #[arg(long)]
    pub passphrase: String,
}

#[derive(Parser, Debug)]
pub struct ClearCredentialsCmd {
    /// Confirm that the autotrade schedule is deleted as well
    #[arg(long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct TradeCmd {
    /// Amount of BTC
    #[arg(value_name = "AMOUNT")]
    pub amount: Decimal,
}

#[derive(Subcommand, Debug)]
pub enum AutotradeCmd {
    /// Schedule a trade
    Enable {
        /// Amount of BTC
        #[arg(long)]
        amount: Decimal,

        /// buy or sell
        #[arg(long)]
        side: TradeSide,

        /// Hours until the trade fires (defaults to the settings value)
        #[arg(long, value_name = "HOURS")]
        delay_hours: Option<u32>,
    },

    /// Cancel the scheduled trade
    Disable,

    /// Show the scheduled trade
    Status,
}

/// Execute the parsed command line
pub async fn execute(app: CliApp) -> Result<ExitCode> {
    let settings = load_settings_or_default(&app.settings)
        .with_context(|| format!("Failed to load settings from {}", app.settings.display()))?;
    init_logging(app.verbose, app.debug, &settings)?;

    let (state, feed) = AppState::from_settings(settings);
    state
        .bootstrap()
        .await
        .context("Failed to initialize configuration")?;

    match app.command {
        Command::Dashboard => dashboard_command(&state, &feed).await,
        Command::Status => status_command(&state).await,
        Command::Login(cmd) => login_command(&state, cmd).await,
        Command::ClearCredentials(cmd) => clear_credentials_command(&state, cmd).await,
        Command::Buy(cmd) => trade_command(&state, TradeSide::Buy, cmd.amount).await,
        Command::Sell(cmd) => trade_command(&state, TradeSide::Sell, cmd.amount).await,
        Command::Refresh => {
            let rx = state.log.subscribe();
            let handle = state.dispatcher.refresh().await;
            finish(handle, rx).await
        }
        Command::Retrain => {
            let rx = state.log.subscribe();
            let handle = state.dispatcher.retrain().await;
            finish(handle, rx).await
        }
        Command::Autotrade(cmd) => autotrade_command(&state, cmd).await,
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool, settings: &Settings) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    // Operator log lines are printed by the handlers themselves.
    let filter = if debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,bitvision::log=off"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{},bitvision::log=off", settings.logging.level))
        })
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(())
}

async fn dashboard_command(state: &AppState, feed: &CacheDataFeed) -> Result<ExitCode> {
    let mut log_rx = state.log.subscribe();
    let mut redraw_rx = feed.subscribe_redraw();

    // First refresh up front so the first redraw has data.
    if let Err(e) = feed.refresh_data().await {
        state.log.warn(format!("Data refresh failed: {}", e));
    }

    let scheduler = state.scheduler.clone();
    let loop_task = tokio::spawn(async move { scheduler.run().await });

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut last_tick = None;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                break;
            }
            line = log_rx.recv() => match line {
                Ok(line) => println!("{}", line),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Log output lagged, {} lines skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = redraw_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feed.snapshot().await;
                let Some(tick) = snapshot.prices.latest().cloned() else { continue };
                if last_tick == Some(tick.timestamp) {
                    continue;
                }
                last_tick = Some(tick.timestamp);

                let minutes = state
                    .autotrade
                    .settings()
                    .await
                    .map(|s| s.minutes_until_next_trade(Utc::now().timestamp()))
                    .unwrap_or(0);
                println!(
                    "BTC {} (high {}, low {}) | Minutes Until Next Trade: {}",
                    tick.last, tick.high, tick.low, minutes
                );
            }
        }
    }

    state.scheduler.stop().await;
    loop_task.await.context("Scheduler task failed")?;
    Ok(ExitCode::SUCCESS)
}

async fn status_command(state: &AppState) -> Result<ExitCode> {
    let credentials = state
        .credentials
        .get_credentials()
        .await
        .context("Failed to read credentials")?;
    let autotrade = state
        .autotrade
        .settings()
        .await
        .context("Failed to read autotrade settings")?;

    println!("Config file:        {}", state.store.path().display());
    println!(
        "Credentials:        {}",
        if credentials.is_valid() { "valid" } else { "missing or incomplete" }
    );
    match AutotradeState::from(&autotrade) {
        AutotradeState::Enabled => {
            println!("Autotrade:          enabled");
            println!(
                "Next trade:         {} {} BTC",
                autotrade.next_trade_side, autotrade.next_trade_amount
            );
            println!(
                "Minutes Until Next Trade: {}",
                autotrade.minutes_until_next_trade(Utc::now().timestamp())
            );
        }
        AutotradeState::Disabled => println!("Autotrade:          disabled"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn login_command(state: &AppState, cmd: LoginCmd) -> Result<ExitCode> {
    let mut rx = state.log.subscribe();
    state
        .credentials
        .set_credentials(Credentials::new(cmd.key, cmd.secret, cmd.passphrase))
        .await
        .context("Failed to save credentials")?;
    print_pending(&mut rx);

    match state.dispatcher.login().await {
        Err(DispatchError::NotConfigured(Action::Login)) => Ok(ExitCode::SUCCESS),
        other => finish(other, rx).await,
    }
}

async fn clear_credentials_command(state: &AppState, cmd: ClearCredentialsCmd) -> Result<ExitCode> {
    println!("{}", CLEAR_CREDENTIALS_WARNING);
    if !cmd.yes {
        bail!("Refusing to clear credentials without --yes");
    }

    let mut rx = state.log.subscribe();
    let result = state.credentials.clear_credentials().await;
    print_pending(&mut rx);
    result.context("Failed to clear credentials")?;
    Ok(ExitCode::SUCCESS)
}

async fn trade_command(state: &AppState, side: TradeSide, amount: Decimal) -> Result<ExitCode> {
    let rx = state.log.subscribe();
    let handle = state.dispatcher.trade(side, amount).await;
    finish(handle, rx).await
}

async fn autotrade_command(state: &AppState, cmd: AutotradeCmd) -> Result<ExitCode> {
    let mut rx = state.log.subscribe();
    let result = match cmd {
        AutotradeCmd::Enable {
            amount,
            side,
            delay_hours,
        } => {
            let delay = delay_hours.unwrap_or_else(|| state.default_delay_hours());
            state.autotrade.enable(amount, side, delay).await
        }
        AutotradeCmd::Disable => state.autotrade.disable().await,
        AutotradeCmd::Status => {
            print_pending(&mut rx);
            return status_command(state).await;
        }
    };
    print_pending(&mut rx);

    match result.context("Autotrade change failed")? {
        Transition::Enabled(schedule) => println!(
            "Autotrade enabled: {} {} BTC in {} minutes",
            schedule.next_trade_side,
            schedule.next_trade_amount,
            schedule.minutes_until_next_trade(Utc::now().timestamp())
        ),
        Transition::Disabled => println!("Autotrade disabled"),
        Transition::Redundant(current) => {
            println!("Autotrade already {}", match current {
                AutotradeState::Enabled => "enabled",
                AutotradeState::Disabled => "disabled",
            })
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Follow a dispatched command to completion and map its status to our exit code
async fn finish(
    handle: Result<ProcessHandle, DispatchError>,
    mut rx: broadcast::Receiver<LogLine>,
) -> Result<ExitCode> {
    let handle = match handle {
        Ok(handle) => handle,
        Err(e) => {
            print_pending(&mut rx);
            return Err(e).context("Command was not started");
        }
    };

    if let Some(notice) = started_notice(&handle) {
        println!("{}", notice);
    }
    let exit = follow(handle, &mut rx).await?;
    Ok(ExitCode::from(exit_status(&exit)))
}

/// "Started <command> (pid N)" for a live child; `None` without a pid
fn started_notice(handle: &ProcessHandle) -> Option<String> {
    handle
        .pid()
        .map(|pid| format!("Started {} (pid {})", handle.invocation().display(), pid))
}

/// Print log lines while waiting for the process to terminate
async fn follow(
    handle: ProcessHandle,
    rx: &mut broadcast::Receiver<LogLine>,
) -> Result<ProcessExit> {
    let wait = handle.wait();
    tokio::pin!(wait);
    let mut log_open = true;

    loop {
        tokio::select! {
            biased;
            line = rx.recv(), if log_open => match line {
                Ok(line) => println!("{}", line),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => log_open = false,
            },
            exit = &mut wait => {
                // The completion line is logged before the handle resolves.
                print_pending(rx);
                return exit.context("Command did not report termination");
            }
        }
    }
}

fn print_pending(rx: &mut broadcast::Receiver<LogLine>) {
    loop {
        match rx.try_recv() {
            Ok(line) => println!("{}", line),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

/// Shell-style status: the exit code, or 128 + signal
fn exit_status(exit: &ProcessExit) -> u8 {
    match (exit.code, exit.signal) {
        (Some(code), _) => u8::try_from(code).unwrap_or(1),
        (None, Some(signal)) => u8::try_from(128 + signal).unwrap_or(1),
        (None, None) => 1,
    }
}
