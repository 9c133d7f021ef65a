use std::sync::Arc;

use async_trait::async_trait;
use common::models::{ExchangePrecision, MarketOrder, Side, TakeProfitOrder};
use rust_decimal::Decimal;

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeverageStatus {
    Updated,
    /// The exchange already had this leverage configured.
    Unchanged,
}

/// The exchange operations the trading pipeline relies on.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn is_tradable(&self, symbol: &str) -> Result<bool, GatewayError>;

    /// Sets both buy and sell leverage.
    async fn set_leverage(&self, symbol: &str, leverage: u32)
    -> Result<LeverageStatus, GatewayError>;

    async fn last_price(&self, symbol: &str) -> Result<Decimal, GatewayError>;

    async fn precision(&self, symbol: &str) -> Result<ExchangePrecision, GatewayError>;

    /// Opens a position at market with the stop-loss attached. Returns the order id.
    async fn place_market_order(&self, order: &MarketOrder) -> Result<String, GatewayError>;

    /// Submits reduce-only limit orders in a single call. Any rejected leg fails the call.
    async fn place_batch_limit_orders(
        &self,
        symbol: &str,
        side: Side,
        orders: &[TakeProfitOrder],
    ) -> Result<(), GatewayError>;
}

pub type SharedGateway = Arc<dyn ExchangeGateway>;
