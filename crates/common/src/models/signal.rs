use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Side of the market order that opens the position.
    pub fn entry_side(self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// Side of the reduce-only orders that close it.
    pub fn exit_side(self) -> Side {
        match self {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "Long"),
            Direction::Short => write!(f, "Short"),
        }
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Long" => Ok(Direction::Long),
            "Short" => Ok(Direction::Short),
            other => Err(ValidationError::InvalidDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid direction '{0}', expected Long or Short")]
    InvalidDirection(String),

    #[error("invalid leverage {0}, must be greater than 0")]
    InvalidLeverage(i64),

    #[error("take-profit list is empty")]
    EmptyTakeProfits,

    #[error("take-profit #{index} has non-positive price {price}")]
    InvalidTakeProfit { index: usize, price: Decimal },

    #[error("invalid stop-loss {0}, must be greater than 0")]
    InvalidStopLoss(Decimal),
}

/// A trade instruction extracted from a channel post.
///
/// Fields are private so a constructed signal always satisfies its
/// invariants and never changes afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    ticker: String,
    direction: Direction,
    leverage: u32,
    take_profits: Vec<Decimal>,
    stop_loss: Decimal,
    timestamp: DateTime<Utc>,
    raw_text: String,
}

impl Signal {
    pub fn new(
        ticker: impl Into<String>,
        direction: Direction,
        leverage: i64,
        take_profits: Vec<Decimal>,
        stop_loss: Decimal,
        raw_text: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let leverage = u32::try_from(leverage)
            .ok()
            .filter(|l| *l > 0)
            .ok_or(ValidationError::InvalidLeverage(leverage))?;

        if take_profits.is_empty() {
            return Err(ValidationError::EmptyTakeProfits);
        }
        if let Some((index, price)) = take_profits
            .iter()
            .enumerate()
            .find(|(_, p)| **p <= Decimal::ZERO)
        {
            return Err(ValidationError::InvalidTakeProfit {
                index: index + 1,
                price: *price,
            });
        }
        if stop_loss <= Decimal::ZERO {
            return Err(ValidationError::InvalidStopLoss(stop_loss));
        }

        Ok(Self {
            ticker: ticker.into(),
            direction,
            leverage,
            take_profits,
            stop_loss,
            timestamp: Utc::now(),
            raw_text: raw_text.into(),
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// Exchange symbol, e.g. `BTC/USDT` -> `BTCUSDT`.
    pub fn symbol(&self) -> String {
        self.ticker.replace('/', "")
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn leverage(&self) -> u32 {
        self.leverage
    }

    pub fn take_profits(&self) -> &[Decimal] {
        &self.take_profits
    }

    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tps: Vec<String> = self.take_profits.iter().map(|tp| tp.to_string()).collect();
        write!(
            f,
            "{} {} {}x | TP: [{}] | SL: {}",
            self.ticker,
            self.direction,
            self.leverage,
            tps.join(", "),
            self.stop_loss
        )
    }
}
