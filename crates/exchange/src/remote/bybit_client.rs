use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use common::models::{ExchangePrecision, MarketOrder, Side, TakeProfitOrder};
use hmac::{Hmac, Mac};
use reqwest::{Client, RequestBuilder};
use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use sha2::Sha256;
use tracing::{debug, error, info, warn};

use crate::error::GatewayError;
use crate::remote::responses::{
    BatchOrderRequest, BybitResponse, InstrumentInfo, LimitOrderLeg, ListResult,
    MarketOrderRequest, OrderResult, SetLeverageRequest, Ticker, parse_decimal,
};
use crate::traits::{ExchangeGateway, LeverageStatus};

type HmacSha256 = Hmac<Sha256>;

const CATEGORY: &str = "linear";

#[derive(Clone)]
pub struct BybitCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub recv_window: u64,
}

#[derive(Clone)]
pub struct BybitClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window: u64,
}

impl BybitClient {
    pub fn new(credentials: BybitCredentials) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent("signal_executor/0.1.0")
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: credentials.base_url.trim_end_matches('/').to_string(),
            api_key: credentials.api_key,
            api_secret: credentials.api_secret,
            recv_window: credentials.recv_window,
        })
    }

    /// v5 signature: HMAC-SHA256 of `timestamp + key + recv_window + payload`.
    fn sign(&self, timestamp: u64, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(self.api_key.as_bytes());
        mac.update(self.recv_window.to_string().as_bytes());
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }

    fn with_auth(&self, request: RequestBuilder, payload: &str) -> RequestBuilder {
        let timestamp = Self::timestamp_ms();
        request
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.recv_window.to_string())
            .header("X-BAPI-SIGN", self.sign(timestamp, payload))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &str,
    ) -> Result<BybitResponse<T>, GatewayError> {
        let url = format!("{}{}?{}", self.base_url, path, query);
        let request = self.with_auth(self.client.get(&url), query);
        Self::send(request, path).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<BybitResponse<T>, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let payload = serde_json::to_string(body)?;
        let request = self
            .with_auth(self.client.post(&url), &payload)
            .header("Content-Type", "application/json")
            .body(payload);
        Self::send(request, path).await
    }

    async fn send<T: DeserializeOwned>(
        request: RequestBuilder,
        path: &str,
    ) -> Result<BybitResponse<T>, GatewayError> {
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            error!("Bybit {} failed with HTTP {}: {}", path, status, body);
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Bybit {} -> {}", path, body);
        Ok(serde_json::from_str(&body)?)
    }

    async fn instrument(&self, symbol: &str) -> Result<InstrumentInfo, GatewayError> {
        let query = format!("category={}&symbol={}", CATEGORY, symbol);
        self.get::<ListResult<InstrumentInfo>>("/v5/market/instruments-info", &query)
            .await?
            .into_result()?
            .list
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::MissingData(format!("instrument {}", symbol)))
    }
}

#[async_trait]
impl ExchangeGateway for BybitClient {
    async fn is_tradable(&self, symbol: &str) -> Result<bool, GatewayError> {
        let instrument = self.instrument(symbol).await?;
        if instrument.status != "Trading" {
            warn!("{} is not tradable, status: {}", symbol, instrument.status);
            return Ok(false);
        }
        Ok(true)
    }

    async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
    ) -> Result<LeverageStatus, GatewayError> {
        let body = SetLeverageRequest {
            category: CATEGORY,
            symbol,
            buy_leverage: leverage.to_string(),
            sell_leverage: leverage.to_string(),
        };
        let status = self
            .post::<_, serde_json::Value>("/v5/position/set-leverage", &body)
            .await?
            .leverage_status()?;
        if status == LeverageStatus::Unchanged {
            debug!("{} leverage already {}x", symbol, leverage);
        }
        Ok(status)
    }

    async fn last_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        let query = format!("category={}&symbol={}", CATEGORY, symbol);
        let ticker = self
            .get::<ListResult<Ticker>>("/v5/market/tickers", &query)
            .await?
            .into_result()?
            .list
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::MissingData(format!("ticker {}", symbol)))?;

        parse_decimal("lastPrice", &ticker.last_price)
    }

    async fn precision(&self, symbol: &str) -> Result<ExchangePrecision, GatewayError> {
        self.instrument(symbol).await?.precision()
    }

    async fn place_market_order(&self, order: &MarketOrder) -> Result<String, GatewayError> {
        let body = MarketOrderRequest {
            category: CATEGORY,
            symbol: &order.symbol,
            side: order.side,
            order_type: "Market",
            qty: order.qty.normalize().to_string(),
            stop_loss: order.stop_loss.normalize().to_string(),
            sl_trigger_by: "MarkPrice",
            tpsl_mode: "Full",
            sl_order_type: "Market",
        };

        info!(
            "Placing Order: {} {} {} SL={}",
            order.side, body.qty, order.symbol, body.stop_loss
        );

        let result: OrderResult = self
            .post("/v5/order/create", &body)
            .await?
            .into_result()?;

        if result.order_id.is_empty() {
            return Err(GatewayError::MissingData("orderId".to_string()));
        }
        Ok(result.order_id)
    }

    async fn place_batch_limit_orders(
        &self,
        symbol: &str,
        side: Side,
        orders: &[TakeProfitOrder],
    ) -> Result<(), GatewayError> {
        if orders.is_empty() {
            return Err(GatewayError::EmptyBatch);
        }

        let body = BatchOrderRequest {
            category: CATEGORY,
            request: orders
                .iter()
                .map(|o| LimitOrderLeg {
                    symbol,
                    side,
                    order_type: "Limit",
                    price: o.price.normalize().to_string(),
                    qty: o.qty.normalize().to_string(),
                    time_in_force: "GTC",
                    reduce_only: true,
                })
                .collect(),
        };

        self.post::<_, ListResult<OrderResult>>("/v5/order/create-batch", &body)
            .await?
            .into_batch_result(orders.len())?;

        info!("All {} TP orders placed for {}", orders.len(), symbol);
        Ok(())
    }
}
