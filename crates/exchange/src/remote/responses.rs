use std::str::FromStr;

use common::models::{ExchangePrecision, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::traits::LeverageStatus;

/// "leverage not modified"
const LEVERAGE_UNCHANGED: i64 = 110043;

/// Envelope shared by every Bybit v5 endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BybitResponse<T> {
    pub ret_code: i64,
    #[serde(default)]
    pub ret_msg: String,
    pub result: Option<T>,
    #[serde(default)]
    pub ret_ext_info: RetExtInfo,
}

impl<T> BybitResponse<T> {
    pub fn into_result(self) -> Result<T, GatewayError> {
        if self.ret_code != 0 {
            return Err(GatewayError::Api {
                code: self.ret_code,
                message: self.ret_msg,
            });
        }
        self.result
            .ok_or_else(|| GatewayError::MissingData("result".to_string()))
    }

    /// Reply to `set-leverage`. Asking for the leverage already in place is
    /// an error code on the wire but a no-op for us.
    pub fn leverage_status(self) -> Result<LeverageStatus, GatewayError> {
        match self.ret_code {
            0 => Ok(LeverageStatus::Updated),
            LEVERAGE_UNCHANGED => Ok(LeverageStatus::Unchanged),
            code => Err(GatewayError::Api {
                code,
                message: self.ret_msg,
            }),
        }
    }

    /// Reply to `create-batch`. Rejected legs only show up in `retExtInfo`,
    /// so they are checked before the envelope code.
    pub fn into_batch_result(self, total: usize) -> Result<T, GatewayError> {
        if let Some(err) = self.ret_ext_info.batch_failure(total) {
            return Err(err);
        }
        self.into_result()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RetExtInfo {
    pub list: Vec<ExtCode>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExtCode {
    pub code: i64,
    pub msg: String,
}

impl RetExtInfo {
    /// Per-order outcome of a batch call; `None` when every leg was accepted.
    pub fn batch_failure(&self, total: usize) -> Option<GatewayError> {
        let rejected: Vec<String> = self
            .list
            .iter()
            .enumerate()
            .filter(|(_, c)| c.code != 0)
            .map(|(i, c)| format!("#{} {} ({})", i + 1, c.msg, c.code))
            .collect();

        if rejected.is_empty() {
            return None;
        }
        Some(GatewayError::PartialBatch {
            rejected: rejected.len(),
            total,
            detail: rejected.join(", "),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListResult<T> {
    pub list: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentInfo {
    pub symbol: String,
    pub status: String,
    pub lot_size_filter: LotSizeFilter,
    pub price_filter: PriceFilter,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LotSizeFilter {
    pub qty_step: String,
    pub min_order_qty: String,
    pub max_order_qty: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PriceFilter {
    pub tick_size: String,
}

impl InstrumentInfo {
    pub fn precision(&self) -> Result<ExchangePrecision, GatewayError> {
        Ok(ExchangePrecision {
            qty_step: parse_decimal("qtyStep", &self.lot_size_filter.qty_step)?,
            min_qty: parse_decimal("minOrderQty", &self.lot_size_filter.min_order_qty)?,
            max_qty: parse_decimal("maxOrderQty", &self.lot_size_filter.max_order_qty)?,
            tick_size: parse_decimal("tickSize", &self.price_filter.tick_size)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: String,
    pub last_price: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrderResult {
    pub order_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetLeverageRequest<'a> {
    pub category: &'static str,
    pub symbol: &'a str,
    pub buy_leverage: String,
    pub sell_leverage: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderRequest<'a> {
    pub category: &'static str,
    pub symbol: &'a str,
    pub side: Side,
    pub order_type: &'static str,
    pub qty: String,
    pub stop_loss: String,
    pub sl_trigger_by: &'static str,
    pub tpsl_mode: &'static str,
    pub sl_order_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderLeg<'a> {
    pub symbol: &'a str,
    pub side: Side,
    pub order_type: &'static str,
    pub price: String,
    pub qty: String,
    pub time_in_force: &'static str,
    pub reduce_only: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchOrderRequest<'a> {
    pub category: &'static str,
    pub request: Vec<LimitOrderLeg<'a>>,
}

pub fn parse_decimal(field: &'static str, value: &str) -> Result<Decimal, GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::MissingData(field.to_string()));
    }
    Decimal::from_str(value.trim()).map_err(|_| GatewayError::InvalidDecimal {
        field,
        value: value.to_string(),
    })
}
