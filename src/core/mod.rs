// src/core/mod.rs
pub mod engine;
pub mod executor;
pub mod monitor;

pub use engine::TradingEngine;
pub use executor::{check_balance, OrderExecutor};
pub use monitor::{MarginDecision, MarginMonitor, PositionMonitor};
