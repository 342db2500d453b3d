use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{BrokerGateway, FillFeed, GatewayError};
use crate::history::{BarPage, DailyChartSource};
use crate::models::{Bar, FillEvent, HeldPosition};

/// Client for the local terminal bridge.
///
/// The brokerage terminal itself speaks a proprietary COM-style protocol;
/// a small bridge process exposes it as JSON over HTTP on localhost and
/// this client is the bot's only way in. A `null` field in a response
/// means the terminal has not produced the value yet and maps to
/// `GatewayError::Unavailable`.
#[derive(Clone)]
pub struct BridgeClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HoldingsResponse {
    positions: Vec<HeldPosition>,
}

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    stock_code: &'a str,
    quantity: i64,
    side: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    order_ref: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FillsResponse {
    fills: Vec<FillEvent>,
}

#[derive(Debug, Deserialize)]
struct ChartPageResponse {
    bars: Vec<Bar>,
    more: bool,
}

impl BridgeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BrokerGateway for BridgeClient {
    async fn last_price(&self, stock_code: &str) -> Result<i64, GatewayError> {
        let url = format!("{}/price/{}", self.base_url, stock_code);
        let response: PriceResponse = self.client.get(&url).send().await?.json().await?;

        response.price.ok_or(GatewayError::Unavailable)
    }

    async fn balance(&self) -> Result<i64, GatewayError> {
        let url = format!("{}/balance", self.base_url);
        let response: BalanceResponse = self.client.get(&url).send().await?.json().await?;

        response.balance.ok_or(GatewayError::Unavailable)
    }

    async fn holdings(&self) -> Result<Vec<HeldPosition>, GatewayError> {
        let url = format!("{}/holdings", self.base_url);
        let response: HoldingsResponse = self.client.get(&url).send().await?.json().await?;

        Ok(response.positions)
    }

    async fn submit_market_buy(
        &self,
        stock_code: &str,
        quantity: i64,
    ) -> Result<String, GatewayError> {
        let url = format!("{}/orders", self.base_url);
        let request = OrderRequest {
            stock_code,
            quantity,
            side: "buy",
        };

        let http_response = self.client.post(&url).json(&request).send().await?;
        if !http_response.status().is_success() {
            return Err(GatewayError::Rejected(format!(
                "bridge returned {}",
                http_response.status()
            )));
        }

        let response: OrderResponse = http_response.json().await?;
        match response.order_ref {
            Some(order_ref) => Ok(order_ref),
            None => Err(GatewayError::Rejected(
                response.message.unwrap_or_else(|| "no reason given".to_string()),
            )),
        }
    }
}

#[async_trait]
impl FillFeed for BridgeClient {
    async fn poll_fills(&self) -> Result<Vec<FillEvent>, GatewayError> {
        let url = format!("{}/fills", self.base_url);
        let response: FillsResponse = self.client.get(&url).send().await?.json().await?;

        Ok(response.fills)
    }
}

#[async_trait]
impl DailyChartSource for BridgeClient {
    async fn fetch_chart_page(
        &self,
        stock_code: &str,
        continuation: bool,
    ) -> Result<BarPage, GatewayError> {
        let url = format!(
            "{}/chart/{}?cont={}",
            self.base_url, stock_code, continuation
        );
        let response: ChartPageResponse = self.client.get(&url).send().await?.json().await?;

        Ok(BarPage {
            bars: response.bars,
            more: response.more,
        })
    }
}
