pub mod bridge;

pub use bridge::BridgeClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{FillEvent, HeldPosition};

/// Failure modes at the brokerage boundary.
///
/// `Unavailable` is the normal "ask again next tick" state - quotes and
/// balances are request/response pairs that may not have an answer yet.
/// Only `Rejected` means the broker actively refused an order.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("value not yet available")]
    Unavailable,
    #[error("order rejected by broker: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

/// Quote, balance, holdings and order-entry calls against the brokerage
/// terminal. All methods are point-in-time requests; callers treat any
/// error as "skip or defer this tick", never as fatal.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Last traded price for one instrument, in integer ticks
    async fn last_price(&self, stock_code: &str) -> Result<i64, GatewayError>;

    /// Available cash balance
    async fn balance(&self) -> Result<i64, GatewayError>;

    /// Current account holdings
    async fn holdings(&self) -> Result<Vec<HeldPosition>, GatewayError>;

    /// Submit a market buy. `Ok` carries the broker's order reference;
    /// acknowledgement is not a fill.
    async fn submit_market_buy(&self, stock_code: &str, quantity: i64)
        -> Result<String, GatewayError>;
}

/// Source of execution events, consumed by the fill reconciler
#[async_trait]
pub trait FillFeed: Send + Sync {
    /// Drain fill events reported since the previous poll
    async fn poll_fills(&self) -> Result<Vec<FillEvent>, GatewayError>;
}
