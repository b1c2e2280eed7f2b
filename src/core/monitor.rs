// src/core/monitor.rs
use crate::config::{EngineConfig, ExecutionConfig, PositionRuleConfig};
use crate::connectors::traits::ExchangeGateway;
use crate::core::executor::verify_funds;
use crate::error::EngineResult;
use crate::types::{MarginAction, MarginAdjustment, OrderRequest, OrderResponse, OrderType, Position};
use crate::utils::precision::{closing_quantity, format_contracts};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
}

/// Whether `position` has crossed its side's take-profit or stop-loss level.
pub fn exit_reason(position: &Position, rules: &PositionRuleConfig) -> Option<ExitReason> {
    if position.quantity.is_zero() {
        return None;
    }
    if position.pnl_ratio >= rules.take_profit {
        Some(ExitReason::TakeProfit)
    } else if position.pnl_ratio <= -rules.stop_loss {
        Some(ExitReason::StopLoss)
    } else {
        None
    }
}

/// Closes positions that hit take-profit or stop-loss.
pub struct PositionMonitor {
    config: Arc<EngineConfig>,
    execution: ExecutionConfig,
    gateway: Arc<dyn ExchangeGateway>,
}

impl PositionMonitor {
    pub fn new(config: Arc<EngineConfig>, execution: ExecutionConfig, gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self {
            config,
            execution,
            gateway,
        }
    }

    /// Inspects every live position of `symbol`. Each breached one gets a
    /// closing order; the first close failure is returned after all were tried.
    pub async fn check_positions(&self, symbol: &str) -> EngineResult<Vec<OrderResponse>> {
        let positions = self.gateway.get_positions(symbol).await?;
        if positions.is_empty() {
            debug!("[{}] no open positions", symbol);
            return Ok(Vec::new());
        }

        let mut closed = Vec::new();
        let mut first_error = None;
        for position in &positions {
            let rules = self.config.position_rules(position.side);
            let hundred = Decimal::ONE_HUNDRED;
            debug!(
                "[{}] {} qty={} pnl={}% (tp {}%, sl -{}%)",
                symbol,
                position.side,
                position.quantity,
                position.pnl_ratio * hundred,
                rules.take_profit * hundred,
                rules.stop_loss * hundred
            );

            let Some(reason) = exit_reason(position, rules) else {
                continue;
            };
            info!(
                "[{}] {} position hit {:?} at {}%, closing",
                symbol,
                position.side,
                reason,
                position.pnl_ratio * hundred
            );
            match self.close_position(position).await {
                Ok(response) => closed.push(response),
                Err(e) => {
                    error!("[{}] failed to close {} position: {}", symbol, position.side, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(closed),
        }
    }

    pub fn closing_order(&self, position: &Position) -> OrderRequest {
        let size = closing_quantity(position.quantity, self.execution.min_lot, self.execution.lot_step);
        OrderRequest {
            inst_id: position.symbol.clone(),
            td_mode: self.config.margin_mode.clone(),
            side: position.side.closing_side(),
            pos_side: (!position.net_mode).then_some(position.side),
            ord_type: OrderType::Market,
            sz: format_contracts(size),
            px: None,
            lever: None,
            cl_ord_id: Some(format!("close{}", Utc::now().timestamp_millis())),
        }
    }

    async fn close_position(&self, position: &Position) -> EngineResult<OrderResponse> {
        let order = self.closing_order(position);
        let response = self.gateway.place_order(&order).await?;
        info!(
            "[{}] closed {} position - order {}, size {}, pnl {}%",
            position.symbol,
            position.side,
            response.order_id,
            order.sz,
            position.pnl_ratio * Decimal::ONE_HUNDRED
        );
        Ok(response)
    }
}

/// What the margin audit did with one position.
#[derive(Debug, Clone, PartialEq)]
pub enum MarginDecision {
    Sufficient,
    /// Below threshold but auto-margin is off.
    Warned,
    ToppedUp(Decimal),
    TopUpFailed,
}

/// Keeps isolated-margin positions above their configured margin ratio.
pub struct MarginMonitor {
    config: Arc<EngineConfig>,
    execution: ExecutionConfig,
    gateway: Arc<dyn ExchangeGateway>,
}

impl MarginMonitor {
    pub fn new(config: Arc<EngineConfig>, execution: ExecutionConfig, gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self {
            config,
            execution,
            gateway,
        }
    }

    /// One pass over every configured symbol; failures are logged per symbol.
    pub async fn audit(&self) {
        for symbol in &self.config.symbols {
            if let Err(e) = self.check_symbol(symbol).await {
                warn!("[{}] margin check failed: {}", symbol, e);
            }
        }
    }

    pub async fn check_symbol(&self, symbol: &str) -> EngineResult<Vec<MarginDecision>> {
        let positions = self.gateway.get_positions(symbol).await?;
        let mut decisions = Vec::with_capacity(positions.len());
        for position in &positions {
            decisions.push(self.check_position(symbol, position).await);
        }
        Ok(decisions)
    }

    async fn check_position(&self, symbol: &str, position: &Position) -> MarginDecision {
        let rules = self.config.position_rules(position.side);
        let live = position.margin_ratio * Decimal::ONE_HUNDRED;
        let threshold = rules.margin_threshold(symbol) * Decimal::ONE_HUNDRED;

        if live >= threshold {
            debug!(
                "[{}] {} margin ratio {}% above {}%",
                symbol, position.side, live, threshold
            );
            return MarginDecision::Sufficient;
        }

        if !rules.auto_margin {
            warn!(
                "[{}] {} margin ratio {}% below configured {}%",
                symbol, position.side, live, threshold
            );
            return MarginDecision::Warned;
        }

        // fixed top-up, not the deficit to the threshold
        let amount = rules.margin_amount;
        match self.add_margin(symbol, position, amount).await {
            Ok(()) => {
                info!(
                    "[{}] added {} {} margin to {} position (ratio {}%, target {}%)",
                    symbol, amount, self.execution.settlement_currency, position.side, live, threshold
                );
                MarginDecision::ToppedUp(amount)
            }
            Err(e) => {
                error!("[{}] margin top-up for {} failed: {}", symbol, position.side, e);
                MarginDecision::TopUpFailed
            }
        }
    }

    async fn add_margin(&self, symbol: &str, position: &Position, amount: Decimal) -> EngineResult<()> {
        verify_funds(
            self.gateway.as_ref(),
            &self.execution.settlement_currency,
            self.config.reserve_balance,
            amount,
        )
        .await?;

        let adjustment = MarginAdjustment {
            inst_id: symbol.to_string(),
            pos_side: (!position.net_mode).then_some(position.side),
            amount,
            action: MarginAction::Add,
        };
        self.gateway.add_margin(&adjustment).await?;
        Ok(())
    }
}
