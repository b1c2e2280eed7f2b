#![allow(dead_code)]

use async_trait::async_trait;
use okx_autotrader::connectors::{ExchangeGateway, ExchangeResult};
use okx_autotrader::error::ExchangeError;
use okx_autotrader::types::{
    Balance, Candle, MarginAdjustment, OrderRequest, OrderResponse, Position, PositionSide,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory venue that records every call made against it.
#[derive(Default)]
pub struct MockGateway {
    pub prices: Mutex<HashMap<String, Decimal>>,
    /// Full kline history per symbol, newest first, served to `get_klines`.
    pub history: Mutex<HashMap<String, Vec<Candle>>>,
    pub positions: Mutex<HashMap<String, Vec<Position>>>,
    pub balances: Mutex<Vec<Balance>>,
    pub orders: Mutex<Vec<OrderRequest>>,
    pub leverage_calls: Mutex<Vec<(String, u32, String, PositionSide)>>,
    pub margin_calls: Mutex<Vec<MarginAdjustment>>,
    pub fail_orders: Mutex<bool>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_usdt(available: Decimal) -> Self {
        let gateway = Self::new();
        gateway.set_usdt(available);
        gateway
    }

    pub fn set_usdt(&self, available: Decimal) {
        *self.balances.lock().unwrap() = vec![Balance {
            currency: "USDT".into(),
            balance: available,
            available,
            frozen: Decimal::ZERO,
        }];
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    /// Stores `closes` (oldest first) as kline history.
    pub fn set_history(&self, symbol: &str, closes: &[f64]) {
        let candles = closes
            .iter()
            .enumerate()
            .rev()
            .map(|(i, close)| candle(i as i64 * 60_000, Decimal::try_from(*close).unwrap()))
            .collect();
        self.history.lock().unwrap().insert(symbol.to_string(), candles);
    }

    pub fn set_positions(&self, symbol: &str, positions: Vec<Position>) {
        self.positions.lock().unwrap().insert(symbol.to_string(), positions);
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn margin_calls(&self) -> Vec<MarginAdjustment> {
        self.margin_calls.lock().unwrap().clone()
    }

    pub fn leverage_calls(&self) -> Vec<(String, u32, String, PositionSide)> {
        self.leverage_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeGateway for MockGateway {
    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
        if *self.fail_orders.lock().unwrap() {
            return Err(ExchangeError::Api {
                code: "51008".into(),
                message: "Order failed. Insufficient USDT margin in account".into(),
            });
        }
        let mut orders = self.orders.lock().unwrap();
        orders.push(request.clone());
        Ok(OrderResponse {
            order_id: format!("ord-{}", orders.len()),
            client_order_id: request.cl_ord_id.clone().unwrap_or_default(),
            s_code: "0".into(),
            s_msg: String::new(),
        })
    }

    async fn cancel_order(&self, _symbol: &str, _order_id: &str) -> ExchangeResult<()> {
        Ok(())
    }

    async fn get_positions(&self, symbol: &str) -> ExchangeResult<Vec<Position>> {
        Ok(self
            .positions
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_balances(&self) -> ExchangeResult<Vec<Balance>> {
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn get_klines(&self, symbol: &str, _interval: &str, limit: usize) -> ExchangeResult<Vec<Candle>> {
        if let Some(history) = self.history.lock().unwrap().get(symbol) {
            return Ok(history.iter().take(limit).cloned().collect());
        }
        Ok(self
            .prices
            .lock()
            .unwrap()
            .get(symbol)
            .map(|price| vec![candle(0, *price)])
            .unwrap_or_default())
    }

    async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
        margin_mode: &str,
        pos_side: PositionSide,
    ) -> ExchangeResult<()> {
        self.leverage_calls
            .lock()
            .unwrap()
            .push((symbol.to_string(), leverage, margin_mode.to_string(), pos_side));
        Ok(())
    }

    async fn add_margin(&self, adjustment: &MarginAdjustment) -> ExchangeResult<()> {
        self.margin_calls.lock().unwrap().push(adjustment.clone());
        Ok(())
    }
}

pub fn candle(timestamp: i64, close: Decimal) -> Candle {
    Candle {
        timestamp,
        open: close,
        high: close,
        low: close,
        close,
        volume: dec!(1),
    }
}

pub fn position(symbol: &str, side: PositionSide, quantity: Decimal, pnl_ratio: Decimal, margin_ratio: Decimal) -> Position {
    Position {
        symbol: symbol.to_string(),
        side,
        quantity,
        avg_price: dec!(30000),
        unrealized_pnl: Decimal::ZERO,
        pnl_ratio,
        margin_ratio,
        net_mode: false,
    }
}
