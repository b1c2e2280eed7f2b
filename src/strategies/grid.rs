// src/strategies/grid.rs
use crate::config::GridConfig;
use crate::error::EngineResult;
use crate::strategies::traits::Strategy;
use crate::types::{Side, Signal, Tick};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const GRID_STRATEGY_NAME: &str = "Grid";

/// Fraction of a bucket's width, measured from either edge, that triggers a signal.
const TRIGGER_BAND: Decimal = dec!(0.1);

/// Contracts per grid signal.
const GRID_UNIT: Decimal = Decimal::ONE;

/// `count + 1` evenly spaced levels from `lower` to `upper`, both included.
pub fn grid_levels(lower: Decimal, upper: Decimal, count: u32) -> Vec<Decimal> {
    if count == 0 {
        return vec![lower];
    }
    let interval = (upper - lower) / Decimal::from(count);
    let mut levels: Vec<Decimal> = (0..count).map(|i| lower + interval * Decimal::from(i)).collect();
    levels.push(upper);
    levels
}

/// Direction suggested by `price` against `levels`, if it sits near a bucket edge.
pub fn grid_signal(levels: &[Decimal], price: Decimal) -> Option<Side> {
    let bucket = levels
        .windows(2)
        .find(|pair| price >= pair[0] && price < pair[1])?;
    let (lower, upper) = (bucket[0], bucket[1]);
    let band = (upper - lower) * TRIGGER_BAND;

    if price - lower < band {
        Some(Side::Buy)
    } else if upper - price < band {
        Some(Side::Sell)
    } else {
        None
    }
}

pub struct GridStrategy {
    symbol: String,
    config: GridConfig,
    levels: Mutex<Vec<Decimal>>,
}

impl GridStrategy {
    pub fn new(symbol: impl Into<String>, config: GridConfig) -> Self {
        Self {
            symbol: symbol.into(),
            config,
            levels: Mutex::new(Vec::new()),
        }
    }

    pub async fn levels(&self) -> Vec<Decimal> {
        self.levels.lock().await.clone()
    }
}

#[async_trait]
impl Strategy for GridStrategy {
    fn name(&self) -> &str {
        GRID_STRATEGY_NAME
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn initialize(&self) -> EngineResult<()> {
        let levels = grid_levels(
            self.config.lower_price,
            self.config.upper_price,
            self.config.grid_number,
        );
        info!(
            "[Grid-{}] {} levels between {} and {}, allocation {}",
            self.symbol,
            levels.len(),
            self.config.lower_price,
            self.config.upper_price,
            self.config.total_amount
        );
        *self.levels.lock().await = levels;
        Ok(())
    }

    async fn process_tick(&self, tick: &Tick) -> EngineResult<Option<Signal>> {
        let levels = self.levels.lock().await;
        let price = tick.price;

        if price < self.config.lower_price || price > self.config.upper_price {
            debug!(
                "[Grid-{}] price {} outside grid [{}, {}]",
                self.symbol, price, self.config.lower_price, self.config.upper_price
            );
            return Ok(None);
        }

        let Some(action) = grid_signal(&levels, price) else {
            return Ok(None);
        };

        info!("[Grid-{}] {} signal at {}", self.symbol, action, price);
        Ok(Some(Signal {
            symbol: self.symbol.clone(),
            strategy: GRID_STRATEGY_NAME.to_string(),
            action,
            price,
            amount: GRID_UNIT,
            timestamp: tick.timestamp,
        }))
    }

    async fn stop(&self) {
        self.levels.lock().await.clear();
        info!("[Grid-{}] stopped", self.symbol);
    }
}
