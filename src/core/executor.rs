// src/core/executor.rs
use crate::config::{EngineConfig, ExecutionConfig, TradeType};
use crate::connectors::traits::ExchangeGateway;
use crate::error::{EngineError, EngineResult};
use crate::storage::TradeStore;
use crate::types::{Balance, OrderRequest, OrderResponse, OrderType, Signal, TradeRecord};
use crate::utils::precision::format_contracts;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Spendable amount of `currency` once `reserve` is set aside, if it covers `required`.
///
/// Pure: the same balances, reserve and requirement always give the same answer.
pub fn check_balance(
    balances: &[Balance],
    currency: &str,
    reserve: Decimal,
    required: Decimal,
) -> EngineResult<Decimal> {
    let balance = balances
        .iter()
        .find(|b| b.currency == currency)
        .ok_or_else(|| EngineError::MissingBalance(currency.to_string()))?;

    let available = balance.available - reserve;
    if available < required {
        return Err(EngineError::InsufficientBalance { required, available });
    }
    Ok(available)
}

/// Fetches balances and checks them against `required`.
pub async fn verify_funds(
    gateway: &dyn ExchangeGateway,
    currency: &str,
    reserve: Decimal,
    required: Decimal,
) -> EngineResult<Decimal> {
    let balances = gateway.get_balances().await?;
    let available = check_balance(&balances, currency, reserve, required)?;
    info!(
        "{} funds sufficient: need {}, usable {} (reserve {})",
        currency, required, available, reserve
    );
    Ok(available)
}

/// Turns signals into exchange orders, one at a time.
pub struct OrderExecutor {
    config: Arc<EngineConfig>,
    execution: ExecutionConfig,
    gateway: Arc<dyn ExchangeGateway>,
    store: Arc<dyn TradeStore>,
}

impl OrderExecutor {
    pub fn new(
        config: Arc<EngineConfig>,
        execution: ExecutionConfig,
        gateway: Arc<dyn ExchangeGateway>,
        store: Arc<dyn TradeStore>,
    ) -> Self {
        Self {
            config,
            execution,
            gateway,
            store,
        }
    }

    /// Margin a signal ties up at the configured leverage.
    pub fn required_margin(&self, signal: &Signal) -> Decimal {
        signal.amount * signal.price / Decimal::from(self.config.leverage.max(1))
    }

    pub fn build_order(&self, signal: &Signal) -> OrderRequest {
        let futures = self.config.trade_type == TradeType::Futures;
        OrderRequest {
            inst_id: signal.symbol.clone(),
            td_mode: self.config.margin_mode.clone(),
            side: signal.action,
            pos_side: futures.then(|| signal.action.opening_position_side()),
            ord_type: OrderType::Market,
            sz: format_contracts(self.execution.order_size),
            px: None,
            lever: futures.then(|| self.config.leverage.to_string()),
            cl_ord_id: None,
        }
    }

    /// Runs one signal through funding checks, leverage setup, submission and recording.
    pub async fn execute(&self, signal: &Signal) -> EngineResult<OrderResponse> {
        info!(
            "[{}] executing {} {} @ {} from {}",
            signal.symbol, signal.action, signal.amount, signal.price, signal.strategy
        );
        let currency = self.execution.settlement_currency.as_str();
        let reserve = self.config.reserve_balance;
        let required = self.required_margin(signal);

        if self.config.trade_type == TradeType::Futures {
            let balances = self.gateway.get_balances().await?;
            if let Err(e) = check_balance(&balances, currency, reserve, required) {
                warn!(
                    "[{}] cannot open position at {}x leverage: {}",
                    signal.symbol, self.config.leverage, e
                );
                return Err(e);
            }
        }

        let pos_side = signal.action.opening_position_side();
        self.gateway
            .set_leverage(&signal.symbol, self.config.leverage, &self.config.margin_mode, pos_side)
            .await?;
        info!("[{}] leverage set to {}x ({})", signal.symbol, self.config.leverage, pos_side);

        verify_funds(self.gateway.as_ref(), currency, reserve, required).await?;

        let mut order = self.build_order(signal);
        if order.cl_ord_id.is_none() {
            order.cl_ord_id = Some(uuid::Uuid::new_v4().simple().to_string());
        }
        let response = self.gateway.place_order(&order).await?;
        info!("[{}] order placed - id {}", signal.symbol, response.order_id);

        let record = TradeRecord {
            symbol: signal.symbol.clone(),
            side: signal.action,
            price: signal.price,
            amount: signal.amount,
            strategy: signal.strategy.clone(),
            status: "filled".to_string(),
            order_id: response.order_id.clone(),
            trade_type: self.config.trade_type.as_str().to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.save_trade(&record).await {
            // the order is live; nothing to roll back
            error!("[{}] failed to record trade {}: {}", signal.symbol, response.order_id, e);
        }

        Ok(response)
    }
}
