// src/main.rs
use anyhow::Context;
use dotenvy::dotenv;
use okx_autotrader::config::{AppConfig, TradingMode};
use okx_autotrader::connectors::{GuardedGateway, OkxClient};
use okx_autotrader::core::TradingEngine;
use okx_autotrader::logging;
use okx_autotrader::storage::JsonlTradeStore;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    let _log_guard = logging::init(&config.logging)?;
    config.validate().context("invalid configuration")?;

    info!("========================================");
    info!("       OKX AUTOTRADER v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("Symbols: {}", config.trading.symbols.join(", "));
    match config.trading.mode {
        TradingMode::Live => warn!("Mode:    LIVE TRADING"),
        TradingMode::Simulation => info!("Mode:    SIMULATED TRADING"),
    }
    info!("Type:    {} @ {}x", config.trading.trade_type.as_str(), config.trading.leverage);

    let client = OkxClient::new(&config.api, config.trading.mode).context("failed to build OKX client")?;
    let gateway = Arc::new(GuardedGateway::from_config(client, &config.execution));
    let store = Arc::new(
        JsonlTradeStore::open(&config.storage.trades_path)
            .await
            .with_context(|| format!("failed to open trade log {}", config.storage.trades_path.display()))?,
    );

    let engine = TradingEngine::new(config.trading.clone(), config.execution.clone(), gateway, store)?;

    match engine.get_balance().await {
        Ok(balances) => {
            for b in balances.iter().filter(|b| !b.balance.is_zero()) {
                info!("Balance {}: {} (available {})", b.currency, b.balance, b.available);
            }
        }
        Err(e) => warn!("Could not fetch balances: {}", e),
    }

    engine.start().await.context("engine failed to start")?;
    info!("Press Ctrl+C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    engine.stop().await;

    Ok(())
}
