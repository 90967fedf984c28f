//! Autotrade Schedule
//!
//! One-shot scheduled trade stored in the configuration document.
//! The schedule is armed by enabling autotrade and cleared once it fires.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Seconds per hour, used to turn a delay in hours into a timestamp
pub const SECONDS_PER_HOUR: i64 = 3600;

/// Side of the scheduled trade
///
/// Serialized as `""`, `"BUY"` or `"SELL"` to stay compatible with
/// dotfiles written by earlier dashboard versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TradeSide {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl TradeSide {
    /// Buy and sell are the only sides a trade can be placed with
    pub fn is_tradable(&self) -> bool {
        matches!(self, TradeSide::Buy | TradeSide::Sell)
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::None => write!(f, "NONE"),
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "b" => Ok(TradeSide::Buy),
            "sell" | "s" => Ok(TradeSide::Sell),
            "" | "none" => Ok(TradeSide::None),
            other => Err(format!("unknown trade side '{}', expected buy or sell", other)),
        }
    }
}

/// Result of evaluating the schedule at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// The scheduled trade is due and should be dispatched now
    Fire { amount: Decimal, side: TradeSide },
    /// Nothing to do yet
    Wait { seconds_remaining: i64 },
}

/// Autotrade section of the configuration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutotradeSettings {
    pub enabled: bool,
    /// Unix seconds at which the scheduled trade fires (0 when disabled)
    #[serde(rename = "next-trade-timestamp-UTC")]
    pub next_trade_timestamp_utc: i64,
    /// Written as an exact decimal string; plain JSON numbers are accepted on read
    #[serde(
        rename = "next-trade-amount",
        serialize_with = "rust_decimal::serde::str::serialize",
        deserialize_with = "super::dashboard::flexible_decimal"
    )]
    pub next_trade_amount: Decimal,
    #[serde(rename = "next-trade-side")]
    pub next_trade_side: TradeSide,
}

impl Default for AutotradeSettings {
    fn default() -> Self {
        Self::disabled()
    }
}

impl AutotradeSettings {
    /// Disabled schedule with every field at its zero value
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            next_trade_timestamp_utc: 0,
            next_trade_amount: Decimal::ZERO,
            next_trade_side: TradeSide::None,
        }
    }

    /// Armed schedule firing `delay_hours` after `now`
    pub fn scheduled(amount: Decimal, side: TradeSide, delay_hours: u32, now: i64) -> Self {
        Self {
            enabled: true,
            next_trade_timestamp_utc: now + i64::from(delay_hours) * SECONDS_PER_HOUR,
            next_trade_amount: amount,
            next_trade_side: side,
        }
    }

    /// Decide whether the scheduled trade fires at `now`
    pub fn evaluate(&self, now: i64) -> ScheduleDecision {
        if self.enabled && now >= self.next_trade_timestamp_utc {
            ScheduleDecision::Fire {
                amount: self.next_trade_amount,
                side: self.next_trade_side,
            }
        } else {
            ScheduleDecision::Wait {
                seconds_remaining: self.seconds_until_next_trade(now),
            }
        }
    }

    /// Seconds until the trade is due, 0 when disabled or overdue
    pub fn seconds_until_next_trade(&self, now: i64) -> i64 {
        if !self.enabled {
            return 0;
        }
        (self.next_trade_timestamp_utc - now).max(0)
    }

    /// Whole minutes until the trade is due, rounded up
    pub fn minutes_until_next_trade(&self, now: i64) -> i64 {
        let secs = self.seconds_until_next_trade(now);
        (secs + 59) / 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_disabled_defaults() {
        let settings = AutotradeSettings::default();
        assert!(!settings.enabled);
        assert_eq!(settings.next_trade_timestamp_utc, 0);
        assert_eq!(settings.next_trade_amount, Decimal::ZERO);
        assert_eq!(settings.next_trade_side, TradeSide::None);
    }

    #[test]
    fn test_scheduled_timestamp() {
        let settings = AutotradeSettings::scheduled(dec!(0.5), TradeSide::Buy, 24, 1000);
        assert!(settings.enabled);
        assert_eq!(settings.next_trade_timestamp_utc, 1000 + 86_400);
        assert_eq!(settings.next_trade_amount, dec!(0.5));
        assert_eq!(settings.next_trade_side, TradeSide::Buy);
    }

    #[test]
    fn test_evaluate_waits_before_due() {
        let settings = AutotradeSettings::scheduled(dec!(1), TradeSide::Sell, 1, 0);
        assert_eq!(
            settings.evaluate(3000),
            ScheduleDecision::Wait { seconds_remaining: 600 }
        );
    }

    #[test]
    fn test_evaluate_fires_at_and_after_due() {
        let settings = AutotradeSettings::scheduled(dec!(2), TradeSide::Sell, 1, 0);
        let expected = ScheduleDecision::Fire { amount: dec!(2), side: TradeSide::Sell };
        assert_eq!(settings.evaluate(3600), expected);
        assert_eq!(settings.evaluate(10_000), expected);
    }

    #[test]
    fn test_evaluate_disabled_never_fires() {
        let settings = AutotradeSettings::disabled();
        assert_eq!(
            settings.evaluate(i64::MAX),
            ScheduleDecision::Wait { seconds_remaining: 0 }
        );
    }

    #[test]
    fn test_minutes_until_next_trade_rounds_up() {
        let settings = AutotradeSettings::scheduled(dec!(1), TradeSide::Buy, 1, 0);
        assert_eq!(settings.minutes_until_next_trade(0), 60);
        assert_eq!(settings.minutes_until_next_trade(3599), 1);
        assert_eq!(settings.minutes_until_next_trade(3600), 0);
        assert_eq!(AutotradeSettings::disabled().minutes_until_next_trade(5), 0);
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("BUY".parse::<TradeSide>().unwrap(), TradeSide::Buy);
        assert_eq!("sell".parse::<TradeSide>().unwrap(), TradeSide::Sell);
        assert_eq!("".parse::<TradeSide>().unwrap(), TradeSide::None);
        assert!("hodl".parse::<TradeSide>().is_err());
        assert!(TradeSide::Buy.is_tradable());
        assert!(!TradeSide::None.is_tradable());
    }

    #[test]
    fn test_side_wire_format() {
        assert_eq!(serde_json::to_string(&TradeSide::None).unwrap(), "\"\"");
        assert_eq!(serde_json::to_string(&TradeSide::Buy).unwrap(), "\"BUY\"");
        let side: TradeSide = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(side, TradeSide::Sell);
    }
}
