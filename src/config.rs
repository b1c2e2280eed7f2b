// src/config.rs

use crate::error::EngineError;
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    #[default]
    Simulation,
    Live,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    #[default]
    Spot,
    Futures,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Spot => "spot",
            TradeType::Futures => "futures",
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct EntryRange {
    pub min: Decimal,
    pub max: Decimal,
}

impl EntryRange {
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Range-entry and exit settings for one position side.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PositionRuleConfig {
    pub enabled: bool,
    pub entry_range: EntryRange,
    /// Fraction of notional, e.g. 0.05 closes at +5%.
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub position_size: Decimal,
    /// Fraction; monitor compares it x100.
    pub margin_ratio: Decimal,
    pub auto_margin: bool,
    pub margin_amount: Decimal,
    pub symbol_margin_ratios: HashMap<String, Decimal>,
}

impl PositionRuleConfig {
    /// Margin threshold for `symbol` as a fraction: explicit override, else the side default.
    ///
    /// Keys are matched case-insensitively since the config loader lowercases them.
    pub fn margin_threshold(&self, symbol: &str) -> Decimal {
        self.symbol_margin_ratios
            .get(symbol)
            .or_else(|| {
                self.symbol_margin_ratios
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(symbol))
                    .map(|(_, v)| v)
            })
            .copied()
            .unwrap_or(self.margin_ratio)
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    pub enabled: bool,
    pub upper_price: Decimal,
    pub lower_price: Decimal,
    pub grid_number: u32,
    pub total_amount: Decimal,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RsiConfig {
    pub enabled: bool,
    pub period: usize,
    pub overbought_threshold: f64,
    pub oversold_threshold: f64,
    pub signal_confirmation: u32,
    pub min_change: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            period: 14,
            overbought_threshold: 70.0,
            oversold_threshold: 30.0,
            signal_confirmation: 1,
            min_change: 0.0,
        }
    }
}

/// Everything the engine needs; read-only once the engine is built.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: TradingMode,
    pub trade_type: TradeType,
    pub leverage: u32,
    pub margin_mode: String,
    pub reserve_balance: Decimal,
    pub symbols: Vec<String>,
    pub long_position: PositionRuleConfig,
    pub short_position: PositionRuleConfig,
    #[serde(alias = "grid_strategy")]
    pub grid: GridConfig,
    #[serde(alias = "rsi_strategy")]
    pub rsi: RsiConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: TradingMode::Simulation,
            trade_type: TradeType::Spot,
            leverage: 1,
            margin_mode: "isolated".to_string(),
            reserve_balance: Decimal::ZERO,
            symbols: Vec::new(),
            long_position: PositionRuleConfig::default(),
            short_position: PositionRuleConfig::default(),
            grid: GridConfig::default(),
            rsi: RsiConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Symbols matching the instrument class: perpetual swaps in futures mode, the rest otherwise.
    pub fn tradable_symbols(&self) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|s| s.ends_with("-SWAP") == (self.trade_type == TradeType::Futures))
            .cloned()
            .collect()
    }

    pub fn position_rules(&self, side: crate::types::PositionSide) -> &PositionRuleConfig {
        match side {
            crate::types::PositionSide::Long => &self.long_position,
            crate::types::PositionSide::Short => &self.short_position,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.symbols.is_empty() {
            return Err(EngineError::Config("no symbols configured".into()));
        }
        if self.leverage == 0 {
            return Err(EngineError::Config("leverage must be at least 1".into()));
        }
        if self.grid.enabled {
            if self.grid.grid_number == 0 {
                return Err(EngineError::Config("grid_number must be positive".into()));
            }
            if self.grid.lower_price >= self.grid.upper_price {
                return Err(EngineError::Config(format!(
                    "grid lower_price {} must be below upper_price {}",
                    self.grid.lower_price, self.grid.upper_price
                )));
            }
        }
        if self.rsi.enabled {
            if self.rsi.period == 0 {
                return Err(EngineError::Config("rsi period must be positive".into()));
            }
            if self.rsi.oversold_threshold >= self.rsi.overbought_threshold {
                return Err(EngineError::Config(
                    "rsi oversold_threshold must be below overbought_threshold".into(),
                ));
            }
        }
        for (name, rules) in [("long_position", &self.long_position), ("short_position", &self.short_position)] {
            if rules.enabled && rules.entry_range.min > rules.entry_range.max {
                return Err(EngineError::Config(format!("{name} entry_range min exceeds max")));
            }
        }
        Ok(())
    }
}

/// Order sizing, timing and gateway discipline.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Contracts sent with every signal-driven order.
    pub order_size: Decimal,
    /// Smallest quantity a closing order may carry.
    pub min_lot: Decimal,
    pub lot_step: Decimal,
    pub settlement_currency: String,
    pub kline_interval: String,
    pub poll_interval_ms: u64,
    pub pnl_interval_ms: u64,
    pub margin_interval_ms: u64,
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_requests_per_second: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            order_size: dec!(200),
            min_lot: dec!(200),
            lot_step: Decimal::ONE,
            settlement_currency: "USDT".to_string(),
            kline_interval: "1m".to_string(),
            poll_interval_ms: 1_000,
            pnl_interval_ms: 1_000,
            margin_interval_ms: 5_000,
            queue_capacity: 100,
            max_retries: 3,
            retry_delay_ms: 1_000,
            max_requests_per_second: 6,
        }
    }
}

impl ExecutionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn pnl_interval(&self) -> Duration {
        Duration::from_millis(self.pnl_interval_ms)
    }

    pub fn margin_interval(&self) -> Duration {
        Duration::from_millis(self.margin_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub key: String,
    pub secret: String,
    pub passphrase: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            secret: String::new(),
            passphrase: String::new(),
            base_url: "https://www.okx.com".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub trades_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            trades_path: PathBuf::from("data/trades.jsonl"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily-rolling log files are written here when set.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub trading: EngineConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl AppConfig {
    /// Reads `Settings` (or the file named by `APP_CONFIG`), then `APP__*` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("APP_CONFIG").unwrap_or_else(|_| "Settings".to_string());
        Self::from_file(&file)
    }

    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(name))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__"),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        // simulated trading uses demo keys, but still needs all three
        if self.api.key.is_empty() || self.api.secret.is_empty() || self.api.passphrase.is_empty() {
            return Err(EngineError::Config(
                "api key, secret and passphrase are required".into(),
            ));
        }
        if self.execution.queue_capacity == 0 {
            return Err(EngineError::Config("queue_capacity must be positive".into()));
        }
        if self.execution.max_requests_per_second == 0 {
            return Err(EngineError::Config("max_requests_per_second must be positive".into()));
        }
        self.trading.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EngineConfig {
        EngineConfig {
            symbols: vec!["BTC-USDT-SWAP".into(), "BTC-USDT".into()],
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_tradable_symbols_follow_trade_type() {
        let mut cfg = base();
        assert_eq!(cfg.tradable_symbols(), vec!["BTC-USDT".to_string()]);

        cfg.trade_type = TradeType::Futures;
        assert_eq!(cfg.tradable_symbols(), vec!["BTC-USDT-SWAP".to_string()]);
    }

    #[test]
    fn test_margin_threshold_override() {
        let mut rules = PositionRuleConfig {
            margin_ratio: dec!(0.10),
            ..PositionRuleConfig::default()
        };
        rules.symbol_margin_ratios.insert("ETH-USDT-SWAP".into(), dec!(0.25));

        assert_eq!(rules.margin_threshold("ETH-USDT-SWAP"), dec!(0.25));
        assert_eq!(rules.margin_threshold("BTC-USDT-SWAP"), dec!(0.10));
    }

    #[test]
    fn test_validate_rejects_inverted_grid() {
        let mut cfg = base();
        cfg.grid = GridConfig {
            enabled: true,
            upper_price: dec!(100),
            lower_price: dec!(110),
            grid_number: 5,
            total_amount: dec!(1000),
        };
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));

        cfg.grid.enabled = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_with_defaults() {
        let path = std::env::temp_dir().join(format!("okx_autotrader_cfg_{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[api]
key = "k"
secret = "s"
passphrase = "p"

[trading]
trade_type = "futures"
leverage = 5
symbols = ["BTC-USDT-SWAP"]

[trading.long_position]
enabled = true
entry_range = { min = "29000", max = "30000" }
margin_ratio = "0.10"

[trading.long_position.symbol_margin_ratios]
"BTC-USDT-SWAP" = "0.2"

[trading.rsi_strategy]
enabled = true
period = 7
"#,
        )
        .unwrap();

        let cfg = AppConfig::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.trading.mode, TradingMode::Simulation);
        assert_eq!(cfg.trading.leverage, 5);
        assert_eq!(cfg.trading.long_position.entry_range.max, dec!(30000));
        assert_eq!(cfg.trading.long_position.margin_threshold("BTC-USDT-SWAP"), dec!(0.2));
        assert!(cfg.trading.rsi.enabled);
        assert_eq!(cfg.trading.rsi.period, 7);
        assert_eq!(cfg.trading.rsi.overbought_threshold, 70.0);
        assert_eq!(cfg.execution, ExecutionConfig::default());
        assert_eq!(cfg.api.base_url, "https://www.okx.com");
    }

    #[test]
    fn test_validate_rejects_empty_symbols() {
        let cfg = EngineConfig::default();
        assert!(matches!(cfg.validate(), Err(EngineError::Config(_))));
    }
}
