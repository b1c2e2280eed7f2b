mod common;

use approx::assert_abs_diff_eq;
use common::MockGateway;
use okx_autotrader::config::RsiConfig;
use okx_autotrader::strategies::{RsiStrategy, Strategy};
use okx_autotrader::types::{Side, Tick};
use rust_decimal::Decimal;
use std::sync::Arc;

const SYMBOL: &str = "ETH-USDT";

fn falling(from: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| from - i as f64).collect()
}

fn rising(from: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| from + i as f64).collect()
}

fn tick(price: f64) -> Tick {
    Tick {
        symbol: SYMBOL.into(),
        price: Decimal::try_from(price).unwrap(),
        volume: Decimal::ONE,
        timestamp: 1_700_000_000,
    }
}

fn strategy(gateway: Arc<MockGateway>, confirmation: u32, min_change: f64) -> RsiStrategy {
    let config = RsiConfig {
        enabled: true,
        period: 14,
        overbought_threshold: 70.0,
        oversold_threshold: 30.0,
        signal_confirmation: confirmation,
        min_change,
    };
    RsiStrategy::new(SYMBOL, config, gateway, "1m")
}

#[tokio::test]
async fn test_initialize_keeps_latest_history_in_order() {
    let gateway = Arc::new(MockGateway::new());
    gateway.set_history(SYMBOL, &falling(2000.0, 60));
    let rsi = strategy(gateway, 1, 0.0);

    rsi.initialize().await.unwrap();

    assert_eq!(rsi.buffered().await, 42);
    assert_abs_diff_eq!(rsi.last_rsi().await, 0.0);
}

#[tokio::test]
async fn test_oversold_needs_consecutive_confirmations() {
    let gateway = Arc::new(MockGateway::new());
    gateway.set_history(SYMBOL, &falling(2000.0, 42));
    let rsi = strategy(gateway, 2, 0.0);
    rsi.initialize().await.unwrap();

    assert!(rsi.process_tick(&tick(1900.0)).await.unwrap().is_none());
    let signal = rsi.process_tick(&tick(1899.0)).await.unwrap().unwrap();

    assert_eq!(signal.action, Side::Buy);
    assert_eq!(signal.strategy, "RSI");
    assert_eq!(signal.amount, Decimal::ONE);
    assert_eq!(rsi.buffered().await, 42);

    // counter restarts after firing
    assert!(rsi.process_tick(&tick(1898.0)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_overbought_confirmation_emits_sell() {
    let gateway = Arc::new(MockGateway::new());
    gateway.set_history(SYMBOL, &rising(1000.0, 42));
    let rsi = strategy(gateway, 2, 0.0);
    rsi.initialize().await.unwrap();
    assert_abs_diff_eq!(rsi.last_rsi().await, 100.0);

    assert!(rsi.process_tick(&tick(1042.0)).await.unwrap().is_none());
    let signal = rsi.process_tick(&tick(1043.0)).await.unwrap().unwrap();

    assert_eq!(signal.action, Side::Sell);
    assert_eq!(signal.symbol, SYMBOL);
    assert_eq!(signal.price, Decimal::from(1043));
}

#[tokio::test]
async fn test_neutral_reading_restarts_confirmation() {
    let gateway = Arc::new(MockGateway::new());
    gateway.set_history(SYMBOL, &falling(2000.0, 42));
    let rsi = strategy(gateway, 2, 0.0);
    rsi.initialize().await.unwrap();

    assert!(rsi.process_tick(&tick(1958.0)).await.unwrap().is_none());

    // +15 lifts RSI to ~53.6
    assert!(rsi.process_tick(&tick(1973.0)).await.unwrap().is_none());
    let rsi_value = rsi.last_rsi().await;
    assert!(rsi_value > 30.0 && rsi_value < 70.0, "rsi {}", rsi_value);

    // back to ~21: first oversold reading after the reset
    assert!(rsi.process_tick(&tick(1933.0)).await.unwrap().is_none());
    assert!(rsi.last_rsi().await < 30.0);

    let signal = rsi.process_tick(&tick(1932.0)).await.unwrap().unwrap();
    assert_eq!(signal.action, Side::Buy);
}

#[tokio::test]
async fn test_flat_readings_below_min_change_never_fire() {
    let gateway = Arc::new(MockGateway::new());
    gateway.set_history(SYMBOL, &falling(2000.0, 42));
    let rsi = strategy(gateway, 1, 1.0);
    rsi.initialize().await.unwrap();

    for price in [1900.0, 1899.0, 1898.0] {
        assert!(rsi.process_tick(&tick(price)).await.unwrap().is_none());
    }
}

#[tokio::test]
async fn test_warm_up_without_history() {
    let gateway = Arc::new(MockGateway::new());
    let rsi = strategy(gateway, 1, 0.0);
    rsi.initialize().await.unwrap();

    for i in 0..13 {
        assert!(rsi.process_tick(&tick(100.0 + i as f64)).await.unwrap().is_none());
    }
    assert_eq!(rsi.buffered().await, 13);

    rsi.stop().await;
    assert_eq!(rsi.buffered().await, 0);
}
