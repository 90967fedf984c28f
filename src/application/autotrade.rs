//! Autotrade Controller
//!
//! Two-state machine over `autotrade.enabled`. Enabling arms a one-shot
//! trade `delay_hours` in the future; disabling (explicitly or after the
//! trade fires) resets the schedule. Requests for the current state are
//! redundant no-ops and never touch the disk.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use thiserror::Error;

use super::config_store::{ConfigStore, StoreError};
use super::log_sink::LogSink;
use crate::domain::{AutotradeSettings, ScheduleDecision, TradeSide};

#[derive(Debug, Error)]
pub enum AutotradeError {
    #[error("Invalid autotrade parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutotradeState {
    Disabled,
    Enabled,
}

impl From<&AutotradeSettings> for AutotradeState {
    fn from(settings: &AutotradeSettings) -> Self {
        if settings.enabled {
            AutotradeState::Enabled
        } else {
            AutotradeState::Disabled
        }
    }
}

/// Outcome of an enable/disable request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Autotrade armed with this schedule
    Enabled(AutotradeSettings),
    /// Autotrade switched off and schedule reset
    Disabled,
    /// Already in the requested state; nothing written
    Redundant(AutotradeState),
}

#[derive(Debug, Clone)]
pub struct AutotradeController {
    store: Arc<ConfigStore>,
    log: LogSink,
}

impl AutotradeController {
    pub fn new(store: Arc<ConfigStore>, log: LogSink) -> Self {
        Self { store, log }
    }

    /// Current schedule; disabled when no configuration exists yet
    pub async fn settings(&self) -> Result<AutotradeSettings, AutotradeError> {
        Ok(self.store.load_or_default().await?.autotrade)
    }

    pub async fn state(&self) -> Result<AutotradeState, AutotradeError> {
        Ok(AutotradeState::from(&self.settings().await?))
    }

    /// Arm a trade `delay_hours` from now
    pub async fn enable(
        &self,
        amount: Decimal,
        side: TradeSide,
        delay_hours: u32,
    ) -> Result<Transition, AutotradeError> {
        self.enable_at(amount, side, delay_hours, Utc::now().timestamp()).await
    }

    /// Arm a trade `delay_hours` after `now` (unix seconds)
    pub async fn enable_at(
        &self,
        amount: Decimal,
        side: TradeSide,
        delay_hours: u32,
        now: i64,
    ) -> Result<Transition, AutotradeError> {
        let result = self
            .store
            .update_atomic_at::<_, AutotradeError, _>(now, |doc| {
                if doc.autotrade.enabled {
                    return Ok(Transition::Redundant(AutotradeState::Enabled));
                }
                if amount <= Decimal::ZERO {
                    return Err(AutotradeError::InvalidParameters(format!(
                        "amount must be > 0, got {}",
                        amount
                    )));
                }
                if !side.is_tradable() {
                    return Err(AutotradeError::InvalidParameters(format!(
                        "side must be BUY or SELL, got {}",
                        side
                    )));
                }
                let schedule = AutotradeSettings::scheduled(amount, side, delay_hours, now);
                doc.autotrade = schedule.clone();
                Ok(Transition::Enabled(schedule))
            })
            .await;

        self.report(result.map(|outcome| outcome.value))
    }

    /// Switch autotrade off and reset the schedule
    pub async fn disable(&self) -> Result<Transition, AutotradeError> {
        self.disable_at(Utc::now().timestamp()).await
    }

    pub async fn disable_at(&self, now: i64) -> Result<Transition, AutotradeError> {
        let result = self
            .store
            .update_atomic_at::<_, AutotradeError, _>(now, |doc| {
                if !doc.autotrade.enabled {
                    return Ok(Transition::Redundant(AutotradeState::Disabled));
                }
                doc.autotrade = AutotradeSettings::disabled();
                Ok(Transition::Disabled)
            })
            .await;

        self.report(result.map(|outcome| outcome.value))
    }

    /// Decide whether the scheduled trade is due at `now`
    ///
    /// Read-only. Use `take_due_trade_at` to claim the trade before
    /// dispatching it.
    pub async fn evaluate_schedule(&self, now: i64) -> Result<ScheduleDecision, AutotradeError> {
        Ok(self.settings().await?.evaluate(now))
    }

    /// Claim the trade due at `now` and reset the schedule in one update
    ///
    /// Returns the claimed schedule, or `None` when nothing is due under the
    /// lock (for example it was disabled or re-armed after evaluation).
    /// The reset is persisted before the caller may dispatch, so a schedule
    /// that cannot be reset is never traded.
    pub async fn take_due_trade_at(
        &self,
        now: i64,
    ) -> Result<Option<AutotradeSettings>, AutotradeError> {
        let result = self
            .store
            .update_atomic_at::<_, AutotradeError, _>(now, |doc| match doc.autotrade.evaluate(now) {
                ScheduleDecision::Fire { .. } => Ok(Some(std::mem::replace(
                    &mut doc.autotrade,
                    AutotradeSettings::disabled(),
                ))),
                ScheduleDecision::Wait { .. } => Ok(None),
            })
            .await;

        match result {
            Ok(outcome) => {
                if outcome.value.is_some() {
                    self.log.info("Disabling autotrading.");
                }
                Ok(outcome.value)
            }
            Err(e) => {
                self.log.error(format!(
                    "Autotrade not fired: schedule could not be reset: {}",
                    e
                ));
                Err(e)
            }
        }
    }

    fn report(
        &self,
        result: Result<Transition, AutotradeError>,
    ) -> Result<Transition, AutotradeError> {
        match &result {
            Ok(Transition::Enabled(schedule)) => self.log.info(format!(
                "Enabling autotrading: {} {} BTC at {} UTC.",
                schedule.next_trade_side,
                schedule.next_trade_amount,
                schedule.next_trade_timestamp_utc
            )),
            Ok(Transition::Disabled) => self.log.info("Disabling autotrading."),
            Ok(Transition::Redundant(state)) => {
                self.log.info(format!("Redundant autotrading change (already {:?}).", state))
            }
            Err(e) => self.log.error(format!("Autotrading change rejected: {}", e)),
        }
        result
    }
}
