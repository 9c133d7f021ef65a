use common::models::{ExchangePrecision, Signal, TakeProfitOrder};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use crate::allocation::AllocationConfig;
use crate::rounding::floor_to_step;

/// Account-level risk parameters applied to every signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskSettings {
    pub balance: Decimal,
    /// Share of the balance committed as margin per trade, in percent.
    pub risk_percent: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOrderPlan {
    pub margin: Decimal,
    pub notional: Decimal,
    pub qty: Decimal,
    pub stop_loss: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SizingError {
    #[error("invalid last price {0}")]
    InvalidPrice(Decimal),

    #[error("invalid precision: {0}")]
    InvalidPrecision(String),

    #[error("quantity {qty} is below minimum tradable size {min_qty}")]
    BelowMinimum { qty: Decimal, min_qty: Decimal },

    #[error("arithmetic overflow while sizing")]
    Overflow,
}

/// Sizes the entry order: `balance * risk% * leverage / last_price`, rounded
/// down to the lot step, with the stop-loss rounded down to the tick.
pub fn size(
    signal: &Signal,
    risk: &RiskSettings,
    last_price: Decimal,
    precision: &ExchangePrecision,
) -> Result<EntryOrderPlan, SizingError> {
    if last_price <= Decimal::ZERO {
        return Err(SizingError::InvalidPrice(last_price));
    }
    check_precision(precision)?;

    let margin = risk
        .balance
        .checked_mul(risk.risk_percent)
        .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        .ok_or(SizingError::Overflow)?;
    let notional = margin
        .checked_mul(Decimal::from(signal.leverage()))
        .ok_or(SizingError::Overflow)?;
    let raw_qty = notional
        .checked_div(last_price)
        .ok_or(SizingError::Overflow)?;

    let mut qty = floor_to_step(raw_qty, precision.qty_step).ok_or(SizingError::Overflow)?;

    if qty < precision.min_qty {
        return Err(SizingError::BelowMinimum {
            qty,
            min_qty: precision.min_qty,
        });
    }

    if precision.max_qty > Decimal::ZERO && qty > precision.max_qty {
        let capped =
            floor_to_step(precision.max_qty, precision.qty_step).ok_or(SizingError::Overflow)?;
        warn!(
            "{}: quantity {} exceeds exchange maximum {}, capping to {}",
            signal.symbol(),
            qty,
            precision.max_qty,
            capped
        );
        qty = capped;
    }

    let stop_loss =
        floor_to_step(signal.stop_loss(), precision.tick_size).ok_or(SizingError::Overflow)?;

    Ok(EntryOrderPlan {
        margin,
        notional,
        qty,
        stop_loss,
    })
}

/// Splits the entry quantity over the signal's targets by allocation weight.
///
/// Only indices present in both the targets and the weights are used. Legs
/// that round below the minimum lot are dropped with a warning; an empty
/// result means no take-profit is placed.
pub fn distribute(
    signal: &Signal,
    entry_qty: Decimal,
    allocation: &AllocationConfig,
    precision: &ExchangePrecision,
) -> Vec<TakeProfitOrder> {
    let mut orders = Vec::with_capacity(allocation.weights().len());

    for (i, (price, weight)) in signal
        .take_profits()
        .iter()
        .zip(allocation.weights())
        .enumerate()
    {
        if *weight <= Decimal::ZERO {
            continue;
        }

        let Some(share) = entry_qty
            .checked_mul(*weight)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
        else {
            warn!("TP{}: quantity overflow, skipping", i + 1);
            continue;
        };
        let Some(qty) = floor_to_step(share, precision.qty_step) else {
            warn!("TP{}: quantity overflow, skipping", i + 1);
            continue;
        };

        if qty.is_zero() || qty < precision.min_qty {
            warn!(
                "TP{}: quantity {} is below minimum {}, skipping",
                i + 1,
                qty,
                precision.min_qty
            );
            continue;
        }

        let Some(price) = floor_to_step(*price, precision.tick_size) else {
            warn!(
                "TP{}: price {} overflows tick {}, skipping",
                i + 1,
                price,
                precision.tick_size
            );
            continue;
        };

        orders.push(TakeProfitOrder { price, qty });
    }

    orders
}

fn check_precision(precision: &ExchangePrecision) -> Result<(), SizingError> {
    if precision.qty_step <= Decimal::ZERO {
        return Err(SizingError::InvalidPrecision(format!(
            "qty_step {}",
            precision.qty_step
        )));
    }
    if precision.tick_size <= Decimal::ZERO {
        return Err(SizingError::InvalidPrecision(format!(
            "tick_size {}",
            precision.tick_size
        )));
    }
    Ok(())
}
