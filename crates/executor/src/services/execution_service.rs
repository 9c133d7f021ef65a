use std::fmt;
use std::sync::Arc;

use common::models::{MarketOrder, Signal};
use exchange::{LeverageStatus, SharedGateway};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};
use trading::{AllocationConfig, RiskSettings};

/// Stages a signal goes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStep {
    SymbolCheck,
    LeverageSet,
    PriceFetch,
    PrecisionFetch,
    Sizing,
    EntryPlacement,
    TakeProfitPlacement,
}

impl fmt::Display for ExecutionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Done {
        symbol: String,
        order_id: String,
        entry_qty: Decimal,
        take_profits: usize,
    },
    Aborted {
        symbol: String,
        step: ExecutionStep,
        reason: String,
        /// Set when the entry was already filled; the position stays open.
        entry_order_id: Option<String>,
    },
}

struct StepFailure {
    step: ExecutionStep,
    reason: String,
    entry_order_id: Option<String>,
}

impl StepFailure {
    fn new(step: ExecutionStep, reason: impl ToString) -> Self {
        Self {
            step,
            reason: reason.to_string(),
            entry_order_id: None,
        }
    }
}

/// Runs one signal against the exchange, strictly in order. The first
/// failing step ends the sequence; nothing that already succeeded is undone.
pub struct ExecutionService {
    gateway: SharedGateway,
    risk: RiskSettings,
    allocation: Arc<AllocationConfig>,
}

impl ExecutionService {
    pub fn new(
        gateway: SharedGateway,
        risk: RiskSettings,
        allocation: Arc<AllocationConfig>,
    ) -> Self {
        Self {
            gateway,
            risk,
            allocation,
        }
    }

    pub async fn execute(&self, signal: &Signal) -> ExecutionOutcome {
        let symbol = signal.symbol();

        match self.run_steps(signal, &symbol).await {
            Ok((order_id, entry_qty, take_profits)) => {
                info!(
                    "Signal {} {} executed: order={}, qty={}, TPs={}",
                    symbol,
                    signal.direction(),
                    order_id,
                    entry_qty,
                    take_profits
                );
                ExecutionOutcome::Done {
                    symbol,
                    order_id,
                    entry_qty,
                    take_profits,
                }
            }
            Err(failure) => {
                match &failure.entry_order_id {
                    Some(order_id) => error!(
                        "Signal {} aborted at {} after entry {} was filled, position left open with SL only: {}",
                        symbol, failure.step, order_id, failure.reason
                    ),
                    None => error!(
                        "Signal {} aborted at {}: {}",
                        symbol, failure.step, failure.reason
                    ),
                }
                ExecutionOutcome::Aborted {
                    symbol,
                    step: failure.step,
                    reason: failure.reason,
                    entry_order_id: failure.entry_order_id,
                }
            }
        }
    }

    async fn run_steps(
        &self,
        signal: &Signal,
        symbol: &str,
    ) -> Result<(String, Decimal, usize), StepFailure> {
        use ExecutionStep::*;

        let tradable = self
            .gateway
            .is_tradable(symbol)
            .await
            .map_err(|e| StepFailure::new(SymbolCheck, e))?;
        if !tradable {
            return Err(StepFailure::new(SymbolCheck, "symbol is not trading"));
        }

        match self.gateway.set_leverage(symbol, signal.leverage()).await {
            Ok(LeverageStatus::Updated) => {
                debug!("{} leverage set to {}x", symbol, signal.leverage())
            }
            Ok(LeverageStatus::Unchanged) => {}
            Err(e) => return Err(StepFailure::new(LeverageSet, e)),
        }

        let last_price = self
            .gateway
            .last_price(symbol)
            .await
            .map_err(|e| StepFailure::new(PriceFetch, e))?;

        let precision = self
            .gateway
            .precision(symbol)
            .await
            .map_err(|e| StepFailure::new(PrecisionFetch, e))?;

        let plan = trading::size(signal, &self.risk, last_price, &precision)
            .map_err(|e| StepFailure::new(Sizing, e))?;
        debug!(
            "{}: margin={} notional={} price={} qty={} SL={}",
            symbol, plan.margin, plan.notional, last_price, plan.qty, plan.stop_loss
        );

        let entry = MarketOrder {
            symbol: symbol.to_string(),
            side: signal.direction().entry_side(),
            qty: plan.qty,
            stop_loss: plan.stop_loss,
        };
        let order_id = self
            .gateway
            .place_market_order(&entry)
            .await
            .map_err(|e| StepFailure::new(EntryPlacement, e))?;

        let take_profits = trading::distribute(signal, plan.qty, &self.allocation, &precision);
        if take_profits.is_empty() {
            warn!("No valid take-profits to place for {}", symbol);
            return Ok((order_id, plan.qty, 0));
        }

        if let Err(e) = self
            .gateway
            .place_batch_limit_orders(symbol, signal.direction().exit_side(), &take_profits)
            .await
        {
            return Err(StepFailure {
                step: TakeProfitPlacement,
                reason: e.to_string(),
                entry_order_id: Some(order_id),
            });
        }

        Ok((order_id, plan.qty, take_profits.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{Direction, ExchangePrecision, Side};
    use exchange::{GatewayError, MockExchangeGateway};
    use mockall::Sequence;
    use rust_decimal_macros::dec;

    fn signal(direction: Direction) -> Signal {
        Signal::new(
            "BTC/USDT",
            direction,
            10,
            vec![dec!(51000), dec!(52000)],
            dec!(48000.05),
            "raw",
        )
        .unwrap()
    }

    fn service(gateway: MockExchangeGateway) -> ExecutionService {
        let mut weights = vec![dec!(50), dec!(50)];
        weights.resize(8, Decimal::ZERO);
        ExecutionService::new(
            Arc::new(gateway),
            RiskSettings {
                balance: dec!(1000),
                risk_percent: dec!(10),
            },
            Arc::new(AllocationConfig::new(weights).unwrap()),
        )
    }

    fn precision() -> ExchangePrecision {
        ExchangePrecision {
            qty_step: dec!(0.001),
            min_qty: dec!(0.001),
            max_qty: dec!(100),
            tick_size: dec!(0.1),
        }
    }

    /// Gateway where every step up to (not including) order placement succeeds.
    fn healthy_gateway(seq: &mut Sequence) -> MockExchangeGateway {
        let mut gateway = MockExchangeGateway::new();
        gateway
            .expect_is_tradable()
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(true));
        gateway
            .expect_set_leverage()
            .times(1)
            .in_sequence(seq)
            .returning(|_, leverage| {
                assert_eq!(leverage, 10);
                Ok(LeverageStatus::Updated)
            });
        gateway
            .expect_last_price()
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(dec!(50000)));
        gateway
            .expect_precision()
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(precision()));
        gateway
    }

    #[tokio::test]
    async fn test_long_signal_runs_every_step_in_order() {
        let mut seq = Sequence::new();
        let mut gateway = healthy_gateway(&mut seq);
        gateway
            .expect_place_market_order()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|order| {
                assert_eq!(order.symbol, "BTCUSDT");
                assert_eq!(order.side, Side::Buy);
                assert_eq!(order.qty, dec!(0.02));
                assert_eq!(order.stop_loss, dec!(48000));
                Ok("entry-1".to_string())
            });
        gateway
            .expect_place_batch_limit_orders()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|symbol, side, orders| {
                assert_eq!(symbol, "BTCUSDT");
                assert_eq!(side, Side::Sell);
                assert_eq!(orders.len(), 2);
                assert_eq!(orders[0].price, dec!(51000));
                assert_eq!(orders[0].qty, dec!(0.01));
                assert_eq!(orders[1].price, dec!(52000));
                assert_eq!(orders[1].qty, dec!(0.01));
                Ok(())
            });

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Done {
                symbol: "BTCUSDT".to_string(),
                order_id: "entry-1".to_string(),
                entry_qty: dec!(0.02),
                take_profits: 2,
            }
        );
    }

    #[tokio::test]
    async fn test_short_signal_uses_mirrored_sides() {
        let mut seq = Sequence::new();
        let mut gateway = healthy_gateway(&mut seq);
        gateway
            .expect_place_market_order()
            .times(1)
            .returning(|order| {
                assert_eq!(order.side, Side::Sell);
                Ok("entry-2".to_string())
            });
        gateway
            .expect_place_batch_limit_orders()
            .times(1)
            .returning(|_, side, _| {
                assert_eq!(side, Side::Buy);
                Ok(())
            });

        let outcome = service(gateway).execute(&signal(Direction::Short)).await;
        assert!(matches!(outcome, ExecutionOutcome::Done { .. }));
    }

    #[tokio::test]
    async fn test_untradable_symbol_aborts_before_anything_else() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_is_tradable().times(1).returning(|_| Ok(false));

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;

        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted {
                step: ExecutionStep::SymbolCheck,
                entry_order_id: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_leverage_unchanged_counts_as_success() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_is_tradable().returning(|_| Ok(true));
        gateway
            .expect_set_leverage()
            .returning(|_, _| Ok(LeverageStatus::Unchanged));
        gateway.expect_last_price().returning(|_| Ok(dec!(50000)));
        gateway.expect_precision().returning(|_| Ok(precision()));
        gateway
            .expect_place_market_order()
            .returning(|_| Ok("entry-3".to_string()));
        gateway
            .expect_place_batch_limit_orders()
            .returning(|_, _, _| Ok(()));

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;
        assert!(matches!(outcome, ExecutionOutcome::Done { .. }));
    }

    #[tokio::test]
    async fn test_leverage_error_aborts() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_is_tradable().returning(|_| Ok(true));
        gateway.expect_set_leverage().returning(|_, _| {
            Err(GatewayError::Api {
                code: 110013,
                message: "cannot set leverage".to_string(),
            })
        });

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;

        match outcome {
            ExecutionOutcome::Aborted { step, reason, .. } => {
                assert_eq!(step, ExecutionStep::LeverageSet);
                assert!(reason.contains("110013"));
            }
            other => panic!("expected abort, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_precision_aborts() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_is_tradable().returning(|_| Ok(true));
        gateway
            .expect_set_leverage()
            .returning(|_, _| Ok(LeverageStatus::Updated));
        gateway.expect_last_price().returning(|_| Ok(dec!(50000)));
        gateway
            .expect_precision()
            .returning(|_| Err(GatewayError::MissingData("qtyStep".to_string())));

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;
        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted {
                step: ExecutionStep::PrecisionFetch,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_quantity_below_minimum_places_no_order() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_is_tradable().returning(|_| Ok(true));
        gateway
            .expect_set_leverage()
            .returning(|_, _| Ok(LeverageStatus::Updated));
        gateway.expect_last_price().returning(|_| Ok(dec!(50000)));
        gateway.expect_precision().returning(|_| {
            Ok(ExchangePrecision {
                min_qty: dec!(1),
                ..precision()
            })
        });
        gateway.expect_place_market_order().never();

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;
        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted {
                step: ExecutionStep::Sizing,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_entry_skips_take_profits() {
        let mut seq = Sequence::new();
        let mut gateway = healthy_gateway(&mut seq);
        gateway.expect_place_market_order().times(1).returning(|_| {
            Err(GatewayError::Api {
                code: 110007,
                message: "insufficient balance".to_string(),
            })
        });
        gateway.expect_place_batch_limit_orders().never();

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;
        assert!(matches!(
            outcome,
            ExecutionOutcome::Aborted {
                step: ExecutionStep::EntryPlacement,
                entry_order_id: None,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_take_profit_failure_leaves_entry_untouched() {
        let mut seq = Sequence::new();
        let mut gateway = healthy_gateway(&mut seq);
        gateway
            .expect_place_market_order()
            .times(1)
            .returning(|_| Ok("entry-4".to_string()));
        gateway
            .expect_place_batch_limit_orders()
            .times(1)
            .returning(|_, _, _| {
                Err(GatewayError::PartialBatch {
                    rejected: 1,
                    total: 2,
                    detail: "#2 qty invalid (10001)".to_string(),
                })
            });

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Aborted {
                symbol: "BTCUSDT".to_string(),
                step: ExecutionStep::TakeProfitPlacement,
                reason: "1 of 2 batch orders rejected: #2 qty invalid (10001)".to_string(),
                entry_order_id: Some("entry-4".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_empty_distribution_keeps_entry_and_skips_batch() {
        let mut gateway = MockExchangeGateway::new();
        gateway.expect_is_tradable().returning(|_| Ok(true));
        gateway
            .expect_set_leverage()
            .returning(|_, _| Ok(LeverageStatus::Updated));
        gateway.expect_last_price().returning(|_| Ok(dec!(50000)));
        // step so coarse that each half rounds to zero while the entry survives
        gateway.expect_precision().returning(|_| {
            Ok(ExchangePrecision {
                qty_step: dec!(0.02),
                min_qty: dec!(0.02),
                ..precision()
            })
        });
        gateway
            .expect_place_market_order()
            .times(1)
            .returning(|_| Ok("entry-5".to_string()));
        gateway.expect_place_batch_limit_orders().never();

        let outcome = service(gateway).execute(&signal(Direction::Long)).await;

        assert_eq!(
            outcome,
            ExecutionOutcome::Done {
                symbol: "BTCUSDT".to_string(),
                order_id: "entry-5".to_string(),
                entry_qty: dec!(0.02),
                take_profits: 0,
            }
        );
    }
}
