//! Configuration Document
//!
//! The single durable record holding exchange credentials and the
//! autotrade schedule, plus the invariants every stored copy must satisfy.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::autotrade::AutotradeSettings;
use super::credentials::Credentials;

/// Invariant violations of a configuration document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentViolation {
    #[error("next-trade-amount must be >= 0, got {0}")]
    NegativeAmount(Decimal),

    #[error("autotrade disabled but scheduling fields are not reset (timestamp {timestamp}, amount {amount}, side {side})")]
    StaleSchedule {
        timestamp: i64,
        amount: Decimal,
        side: String,
    },

    #[error("autotrade enabled without a BUY or SELL side")]
    MissingSide,

    #[error("autotrade enabled with non-positive amount {0}")]
    NonPositiveAmount(Decimal),

    #[error("next trade timestamp {timestamp} is not in the future (now {now})")]
    TimestampNotInFuture { timestamp: i64, now: i64 },
}

/// Persisted configuration document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub credentials: Credentials,
    pub autotrade: AutotradeSettings,
}

impl ConfigDocument {
    /// Parse a document from its JSON representation
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    /// Serialize the whole document as pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check the invariants that hold for any stored copy, independent of time
    pub fn validate_structure(&self) -> Result<(), DocumentViolation> {
        let at = &self.autotrade;

        if at.next_trade_amount < Decimal::ZERO {
            return Err(DocumentViolation::NegativeAmount(at.next_trade_amount));
        }

        if !at.enabled {
            if at.next_trade_timestamp_utc != 0
                || !at.next_trade_amount.is_zero()
                || at.next_trade_side.is_tradable()
            {
                return Err(DocumentViolation::StaleSchedule {
                    timestamp: at.next_trade_timestamp_utc,
                    amount: at.next_trade_amount,
                    side: at.next_trade_side.to_string(),
                });
            }
            return Ok(());
        }

        if !at.next_trade_side.is_tradable() {
            return Err(DocumentViolation::MissingSide);
        }
        if at.next_trade_amount <= Decimal::ZERO {
            return Err(DocumentViolation::NonPositiveAmount(at.next_trade_amount));
        }

        Ok(())
    }

    /// Validate a document produced by mutating `previous` at time `now`
    ///
    /// A newly armed schedule must point to the future. An unchanged schedule
    /// that has since become due is still accepted so unrelated sections can
    /// be updated while a trade is pending.
    pub fn validate_transition(
        &self,
        previous: &ConfigDocument,
        now: i64,
    ) -> Result<(), DocumentViolation> {
        self.validate_structure()?;

        let at = &self.autotrade;
        if at.enabled && *at != previous.autotrade && at.next_trade_timestamp_utc <= now {
            return Err(DocumentViolation::TimestampNotInFuture {
                timestamp: at.next_trade_timestamp_utc,
                now,
            });
        }

        Ok(())
    }
}
