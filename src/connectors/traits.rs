// src/connectors/traits.rs
use crate::error::ExchangeError;
use crate::types::{Balance, Candle, MarginAdjustment, OrderRequest, OrderResponse, Position, PositionSide};
use async_trait::async_trait;

pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Everything the engine asks of the venue.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse>;

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()>;

    /// Open positions for `symbol`; zero-quantity rows are already filtered out.
    async fn get_positions(&self, symbol: &str) -> ExchangeResult<Vec<Position>>;

    async fn get_balances(&self) -> ExchangeResult<Vec<Balance>>;

    /// Most recent candles, newest first.
    async fn get_klines(&self, symbol: &str, interval: &str, limit: usize) -> ExchangeResult<Vec<Candle>>;

    async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
        margin_mode: &str,
        pos_side: PositionSide,
    ) -> ExchangeResult<()>;

    async fn add_margin(&self, adjustment: &MarginAdjustment) -> ExchangeResult<()>;
}
