// src/connectors/guarded.rs
use crate::config::ExecutionConfig;
use crate::connectors::traits::{ExchangeGateway, ExchangeResult};
use crate::types::{Balance, Candle, MarginAdjustment, OrderRequest, OrderResponse, Position, PositionSide};
use crate::utils::retry::{retry_operation, RetryConfig};
use crate::utils::throttle::Throttle;
use async_trait::async_trait;
use std::time::Duration;

/// Wraps a gateway so every attempt waits on the shared throttle and
/// temporary failures are retried.
pub struct GuardedGateway<G> {
    inner: G,
    throttle: Throttle,
    retry: RetryConfig,
}

impl<G: ExchangeGateway> GuardedGateway<G> {
    pub fn new(inner: G, throttle: Throttle, retry: RetryConfig) -> Self {
        Self {
            inner,
            throttle,
            retry,
        }
    }

    pub fn from_config(inner: G, config: &ExecutionConfig) -> Self {
        Self::new(
            inner,
            Throttle::per_second(config.max_requests_per_second),
            RetryConfig {
                max_retries: config.max_retries,
                delay: Duration::from_millis(config.retry_delay_ms),
            },
        )
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: ExchangeGateway> ExchangeGateway for GuardedGateway<G> {
    async fn place_order(&self, request: &OrderRequest) -> ExchangeResult<OrderResponse> {
        let (inner, throttle) = (&self.inner, &self.throttle);
        retry_operation(self.retry, "place_order", move || async move {
            throttle.acquire().await;
            inner.place_order(request).await
        })
        .await
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        let (inner, throttle) = (&self.inner, &self.throttle);
        retry_operation(self.retry, "cancel_order", move || async move {
            throttle.acquire().await;
            inner.cancel_order(symbol, order_id).await
        })
        .await
    }

    async fn get_positions(&self, symbol: &str) -> ExchangeResult<Vec<Position>> {
        let (inner, throttle) = (&self.inner, &self.throttle);
        retry_operation(self.retry, "get_positions", move || async move {
            throttle.acquire().await;
            inner.get_positions(symbol).await
        })
        .await
    }

    async fn get_balances(&self) -> ExchangeResult<Vec<Balance>> {
        let (inner, throttle) = (&self.inner, &self.throttle);
        retry_operation(self.retry, "get_balances", move || async move {
            throttle.acquire().await;
            inner.get_balances().await
        })
        .await
    }

    async fn get_klines(&self, symbol: &str, interval: &str, limit: usize) -> ExchangeResult<Vec<Candle>> {
        let (inner, throttle) = (&self.inner, &self.throttle);
        retry_operation(self.retry, "get_klines", move || async move {
            throttle.acquire().await;
            inner.get_klines(symbol, interval, limit).await
        })
        .await
    }

    async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
        margin_mode: &str,
        pos_side: PositionSide,
    ) -> ExchangeResult<()> {
        let (inner, throttle) = (&self.inner, &self.throttle);
        retry_operation(self.retry, "set_leverage", move || async move {
            throttle.acquire().await;
            inner.set_leverage(symbol, leverage, margin_mode, pos_side).await
        })
        .await
    }

    async fn add_margin(&self, adjustment: &MarginAdjustment) -> ExchangeResult<()> {
        let (inner, throttle) = (&self.inner, &self.throttle);
        retry_operation(self.retry, "add_margin", move || async move {
            throttle.acquire().await;
            inner.add_margin(adjustment).await
        })
        .await
    }
}
