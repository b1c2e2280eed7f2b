// src/strategies/rsi.rs
use crate::config::RsiConfig;
use crate::connectors::traits::ExchangeGateway;
use crate::error::EngineResult;
use crate::strategies::traits::Strategy;
use crate::types::{Side, Signal, Tick};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const RSI_STRATEGY_NAME: &str = "RSI";

/// Returned while the buffer cannot yet cover a full period of deltas.
pub const NEUTRAL_RSI: f64 = 50.0;

/// Wilder's RSI over the whole of `prices` (oldest first).
///
/// The first `period` deltas seed plain averages of gains and losses; every
/// later delta is folded in with `avg = (avg * (period - 1) + delta) / period`.
pub fn wilder_rsi<I>(prices: I, period: usize) -> f64
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: Clone,
{
    let prices = prices.into_iter();
    if period == 0 || prices.clone().count() < period + 1 {
        return NEUTRAL_RSI;
    }

    let n = period as f64;
    let deltas = prices.clone().zip(prices.skip(1)).map(|(prev, next)| next - prev);
    let (mut avg_gain, mut avg_loss) = (0.0, 0.0);

    for (i, delta) in deltas.enumerate() {
        let (gain, loss) = if delta >= 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        if i < period {
            avg_gain += gain / n;
            avg_loss += loss / n;
        } else {
            avg_gain = (avg_gain * (n - 1.0) + gain) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        }
    }

    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Zone {
    Neutral,
    Overbought,
    Oversold,
}

/// Counts qualifying readings while RSI stays outside the neutral band.
///
/// Only a neutral reading resets the count; crossing straight from one
/// extreme to the other keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Confirmation {
    count: u32,
}

impl Confirmation {
    const IDLE: Confirmation = Confirmation { count: 0 };

    /// Feeds one reading; returns true when the required count is reached.
    fn observe(&mut self, zone: Zone, qualifies: bool, required: u32) -> bool {
        if zone == Zone::Neutral {
            *self = Self::IDLE;
            return false;
        }
        if !qualifies {
            return false;
        }
        self.count += 1;
        if self.count >= required.max(1) {
            self.count = 0;
            return true;
        }
        false
    }
}

#[derive(Debug)]
struct RsiState {
    prices: VecDeque<f64>,
    last_rsi: f64,
    confirmation: Confirmation,
}

impl RsiState {
    fn empty(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            last_rsi: NEUTRAL_RSI,
            confirmation: Confirmation::IDLE,
        }
    }
}

pub struct RsiStrategy {
    symbol: String,
    config: RsiConfig,
    gateway: Arc<dyn ExchangeGateway>,
    kline_interval: String,
    state: Mutex<RsiState>,
}

impl RsiStrategy {
    pub fn new(
        symbol: impl Into<String>,
        config: RsiConfig,
        gateway: Arc<dyn ExchangeGateway>,
        kline_interval: impl Into<String>,
    ) -> Self {
        let capacity = config.period * 3;
        Self {
            symbol: symbol.into(),
            config,
            gateway,
            kline_interval: kline_interval.into(),
            state: Mutex::new(RsiState::empty(capacity)),
        }
    }

    fn capacity(&self) -> usize {
        self.config.period * 3
    }

    pub async fn buffered(&self) -> usize {
        self.state.lock().await.prices.len()
    }

    pub async fn last_rsi(&self) -> f64 {
        self.state.lock().await.last_rsi
    }

    fn zone(&self, rsi: f64) -> Zone {
        if rsi >= self.config.overbought_threshold {
            Zone::Overbought
        } else if rsi <= self.config.oversold_threshold {
            Zone::Oversold
        } else {
            Zone::Neutral
        }
    }
}

#[async_trait]
impl Strategy for RsiStrategy {
    fn name(&self) -> &str {
        RSI_STRATEGY_NAME
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn initialize(&self) -> EngineResult<()> {
        let lookback = self.capacity();
        let mut candles = self
            .gateway
            .get_klines(&self.symbol, &self.kline_interval, lookback)
            .await?;
        // exchange returns newest first
        candles.sort_by_key(|c| c.timestamp);

        let mut state = self.state.lock().await;
        *state = RsiState::empty(lookback);
        for candle in candles.iter().rev().take(lookback).rev() {
            match candle.close.to_f64() {
                Some(price) => state.prices.push_back(price),
                None => warn!("[RSI-{}] unusable close {}", self.symbol, candle.close),
            }
        }

        if state.prices.len() >= self.config.period {
            state.last_rsi = wilder_rsi(state.prices.iter().copied(), self.config.period);
            info!("[RSI-{}] seed RSI {:.2}", self.symbol, state.last_rsi);
        }
        info!(
            "[RSI-{}] initialized with {} prices",
            self.symbol,
            state.prices.len()
        );
        Ok(())
    }

    async fn process_tick(&self, tick: &Tick) -> EngineResult<Option<Signal>> {
        let mut state = self.state.lock().await;

        let Some(price) = tick.price.to_f64() else {
            warn!("[RSI-{}] unusable price {}", self.symbol, tick.price);
            return Ok(None);
        };
        state.prices.push_back(price);
        while state.prices.len() > self.capacity() {
            state.prices.pop_front();
        }

        if state.prices.len() < self.config.period {
            debug!(
                "[RSI-{}] waiting for history: {}/{}",
                self.symbol,
                state.prices.len(),
                self.config.period
            );
            return Ok(None);
        }

        let rsi = wilder_rsi(state.prices.iter().copied(), self.config.period);
        let change = rsi - state.last_rsi;
        state.last_rsi = rsi;
        debug!("[RSI-{}] RSI {:.2} (change {:.2})", self.symbol, rsi, change);

        let zone = self.zone(rsi);
        let qualifies = change.abs() >= self.config.min_change;
        if !state
            .confirmation
            .observe(zone, qualifies, self.config.signal_confirmation)
        {
            return Ok(None);
        }

        let action = match zone {
            Zone::Overbought => Side::Sell,
            Zone::Oversold => Side::Buy,
            Zone::Neutral => return Ok(None),
        };
        info!(
            "[RSI-{}] {} signal - RSI {:.2}, price {}",
            self.symbol, action, rsi, tick.price
        );

        Ok(Some(Signal {
            symbol: self.symbol.clone(),
            strategy: RSI_STRATEGY_NAME.to_string(),
            action,
            price: tick.price,
            amount: Decimal::ONE,
            timestamp: tick.timestamp,
        }))
    }

    async fn stop(&self) {
        let mut state = self.state.lock().await;
        *state = RsiState::empty(self.capacity());
        info!("[RSI-{}] stopped", self.symbol);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_monotone_rise_is_100() {
        let prices: Vec<f64> = (100..=114).map(f64::from).collect();
        assert_eq!(prices.len(), 15);
        assert_eq!(wilder_rsi(prices.iter().copied(), 14), 100.0);
    }

    #[test]
    fn test_short_history_is_neutral() {
        let prices = [1.0, 2.0, 3.0];
        assert_eq!(wilder_rsi(prices.iter().copied(), 14), NEUTRAL_RSI);
    }

    #[test]
    fn test_wilder_smoothing() {
        // period 2: seed deltas +1, -1 -> gain 0.5, loss 0.5
        // then +2 -> gain (0.5 + 2) / 2 = 1.25, loss 0.25 -> RS 5
        let prices = [10.0, 11.0, 10.0, 12.0];
        assert_relative_eq!(wilder_rsi(prices.iter().copied(), 2), 100.0 - 100.0 / 6.0);
    }

    #[test]
    fn test_monotone_fall_is_0() {
        let prices: Vec<f64> = (0..20).map(|i| 200.0 - i as f64).collect();
        assert_relative_eq!(wilder_rsi(prices.iter().copied(), 14), 0.0);
    }

    #[test]
    fn test_confirmation_counts_and_resets() {
        let mut c = Confirmation::IDLE;
        assert!(!c.observe(Zone::Overbought, true, 2));
        assert!(c.observe(Zone::Overbought, true, 2));
        assert_eq!(c.count, 0);

        assert!(!c.observe(Zone::Overbought, true, 2));
        assert!(!c.observe(Zone::Neutral, false, 2));
        assert!(!c.observe(Zone::Overbought, true, 2));
    }

    #[test]
    fn test_confirmation_ignores_small_moves_without_reset() {
        let mut c = Confirmation::IDLE;
        assert!(!c.observe(Zone::Oversold, true, 2));
        assert!(!c.observe(Zone::Oversold, false, 2));
        assert_eq!(c.count, 1);
        assert!(c.observe(Zone::Oversold, true, 2));
    }

    #[test]
    fn test_confirmation_carries_across_extremes() {
        let mut c = Confirmation::IDLE;
        assert!(!c.observe(Zone::Overbought, true, 2));
        assert!(c.observe(Zone::Oversold, true, 2));
        assert_eq!(c, Confirmation::IDLE);
    }
}
