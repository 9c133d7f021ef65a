use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Lot and tick rules of a symbol, as reported by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangePrecision {
    pub qty_step: Decimal,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
    pub tick_size: Decimal,
}

/// Position-opening order with its attached stop-loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketOrder {
    pub symbol: String,
    pub side: Side,
    pub qty: Decimal,
    pub stop_loss: Decimal,
}

/// One reduce-only limit leg of the exit ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeProfitOrder {
    pub price: Decimal,
    pub qty: Decimal,
}
