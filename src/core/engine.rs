// src/core/engine.rs
use crate::config::{EngineConfig, ExecutionConfig};
use crate::connectors::traits::ExchangeGateway;
use crate::core::executor::OrderExecutor;
use crate::core::monitor::{MarginMonitor, PositionMonitor};
use crate::error::{EngineError, EngineResult};
use crate::storage::TradeStore;
use crate::strategies::{GridStrategy, RangeEntryRules, RsiStrategy, Strategy};
use crate::types::{Balance, Signal, Tick};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// A registered strategy and whether it currently receives ticks.
struct StrategySlot {
    strategy: Box<dyn Strategy>,
    active: AtomicBool,
}

impl StrategySlot {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

struct Shared {
    config: Arc<EngineConfig>,
    execution: ExecutionConfig,
    gateway: Arc<dyn ExchangeGateway>,
    strategies: Vec<StrategySlot>,
    executor: OrderExecutor,
    positions: PositionMonitor,
    margins: MarginMonitor,
}

struct Running {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

pub struct TradingEngine {
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

impl TradingEngine {
    /// Builds the engine with one Grid and/or RSI instance per tradable symbol.
    pub fn new(
        config: EngineConfig,
        execution: ExecutionConfig,
        gateway: Arc<dyn ExchangeGateway>,
        store: Arc<dyn TradeStore>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let mut strategies: Vec<Box<dyn Strategy>> = Vec::new();
        for symbol in config.tradable_symbols() {
            if config.grid.enabled {
                strategies.push(Box::new(GridStrategy::new(symbol.clone(), config.grid.clone())));
            }
            if config.rsi.enabled {
                strategies.push(Box::new(RsiStrategy::new(
                    symbol.clone(),
                    config.rsi.clone(),
                    gateway.clone(),
                    execution.kline_interval.clone(),
                )));
            }
        }

        Ok(Self::with_strategies(config, execution, gateway, store, strategies))
    }

    /// Builds the engine around an explicit strategy set.
    pub fn with_strategies(
        config: EngineConfig,
        execution: ExecutionConfig,
        gateway: Arc<dyn ExchangeGateway>,
        store: Arc<dyn TradeStore>,
        strategies: Vec<Box<dyn Strategy>>,
    ) -> Self {
        let config = Arc::new(config);
        let shared = Shared {
            executor: OrderExecutor::new(config.clone(), execution.clone(), gateway.clone(), store),
            positions: PositionMonitor::new(config.clone(), execution.clone(), gateway.clone()),
            margins: MarginMonitor::new(config.clone(), execution.clone(), gateway.clone()),
            strategies: strategies
                .into_iter()
                .map(|strategy| StrategySlot {
                    strategy,
                    active: AtomicBool::new(true),
                })
                .collect(),
            config,
            execution,
            gateway,
        };

        Self {
            shared: Arc::new(shared),
            running: Mutex::new(None),
        }
    }

    /// Initializes every active strategy, then spawns the pollers, the order
    /// consumer and the margin auditor. Any initialization failure aborts the start.
    pub async fn start(&self) -> EngineResult<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        info!("Engine starting...");
        for slot in self.shared.strategies.iter().filter(|s| s.is_active()) {
            if let Err(e) = slot.strategy.initialize().await {
                error!(
                    "[{}-{}] initialization failed: {}",
                    slot.strategy.name(),
                    slot.strategy.symbol(),
                    e
                );
                return Err(e);
            }
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let (signal_tx, signal_rx) = mpsc::channel(self.shared.execution.queue_capacity.max(1));
        let mut handles = Vec::with_capacity(self.shared.config.symbols.len() + 2);

        handles.push(tokio::spawn(consume_signals(
            self.shared.clone(),
            signal_rx,
            shutdown_rx.clone(),
        )));
        for symbol in &self.shared.config.symbols {
            handles.push(tokio::spawn(poll_symbol(
                self.shared.clone(),
                symbol.clone(),
                signal_tx.clone(),
                shutdown_rx.clone(),
            )));
        }
        handles.push(tokio::spawn(audit_margins(self.shared.clone(), shutdown_rx)));

        info!(
            "Engine running: {} symbols, {} strategies, mode {:?}",
            self.shared.config.symbols.len(),
            self.shared.strategies.len(),
            self.shared.config.mode
        );
        *running = Some(Running { shutdown, handles });
        Ok(())
    }

    /// Signals every task to finish, waits for them, then clears strategy state.
    /// Calling it on a stopped engine does nothing.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        info!("Engine stopping...");
        let _ = running.shutdown.send(true);
        for result in futures::future::join_all(running.handles).await {
            if let Err(e) = result {
                error!("Engine task ended abnormally: {}", e);
            }
        }

        for slot in &self.shared.strategies {
            slot.strategy.stop().await;
        }
        info!("Engine stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Re-initializes every instance named `name` and resumes feeding it ticks.
    pub async fn enable_strategy(&self, name: &str) -> EngineResult<()> {
        let slots = self.slots_named(name)?;
        for slot in slots {
            slot.strategy.initialize().await?;
            slot.active.store(true, Ordering::SeqCst);
        }
        info!("Strategy {} enabled", name);
        Ok(())
    }

    /// Stops every instance named `name`; it gets no ticks until re-enabled.
    pub async fn disable_strategy(&self, name: &str) -> EngineResult<()> {
        let slots = self.slots_named(name)?;
        for slot in slots {
            slot.active.store(false, Ordering::SeqCst);
            slot.strategy.stop().await;
        }
        info!("Strategy {} disabled", name);
        Ok(())
    }

    pub async fn get_balance(&self) -> EngineResult<Vec<Balance>> {
        Ok(self.shared.gateway.get_balances().await?)
    }

    pub fn get_config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// `(name, symbol, active)` for every registered strategy instance.
    pub fn strategies(&self) -> Vec<(String, String, bool)> {
        self.shared
            .strategies
            .iter()
            .map(|s| (s.strategy.name().to_string(), s.strategy.symbol().to_string(), s.is_active()))
            .collect()
    }

    fn slots_named(&self, name: &str) -> EngineResult<Vec<&StrategySlot>> {
        let slots: Vec<_> = self
            .shared
            .strategies
            .iter()
            .filter(|s| s.strategy.name() == name)
            .collect();
        if slots.is_empty() {
            return Err(EngineError::StrategyNotFound(name.to_string()));
        }
        Ok(slots)
    }
}

fn ticker(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Pushes a signal, giving up if shutdown arrives while the queue is full.
async fn enqueue(
    queue: &mpsc::Sender<Signal>,
    signal: Signal,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        sent = queue.send(signal) => sent.is_ok(),
        _ = shutdown.changed() => false,
    }
}

async fn poll_symbol(
    shared: Arc<Shared>,
    symbol: String,
    queue: mpsc::Sender<Signal>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut market = ticker(shared.execution.poll_interval());
    let mut pnl = ticker(shared.execution.pnl_interval());
    let mut rules = RangeEntryRules::new(&shared.config);
    info!("[{}] market polling started", symbol);

    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = market.tick() => {
                if let Err(e) = shared.poll_once(&symbol, &mut rules, &queue, &mut shutdown).await {
                    warn!("[{}] market update failed: {}", symbol, e);
                }
            }
            _ = pnl.tick() => {
                if let Err(e) = shared.positions.check_positions(&symbol).await {
                    warn!("[{}] take-profit/stop-loss check failed: {}", symbol, e);
                }
            }
        }
    }
    info!("[{}] market polling stopped", symbol);
}

async fn consume_signals(
    shared: Arc<Shared>,
    mut queue: mpsc::Receiver<Signal>,
    mut shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            next = queue.recv() => match next {
                Some(signal) => {
                    if let Err(e) = shared.executor.execute(&signal).await {
                        error!("[{}] signal from {} dropped: {}", signal.symbol, signal.strategy, e);
                    }
                }
                None => break,
            },
        }
    }
    info!("Signal consumer stopped");
}

async fn audit_margins(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut audit = ticker(shared.execution.margin_interval());
    while !*shutdown.borrow() {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = audit.tick() => shared.margins.audit().await,
        }
    }
    info!("Margin auditor stopped");
}

impl Shared {
    /// Fetches the latest price and runs it through the entry rules and this symbol's strategies.
    async fn poll_once(
        &self,
        symbol: &str,
        rules: &mut RangeEntryRules,
        queue: &mpsc::Sender<Signal>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> EngineResult<()> {
        let candles = self
            .gateway
            .get_klines(symbol, &self.execution.kline_interval, 1)
            .await?;
        let Some(candle) = candles.first() else {
            warn!("[{}] no candle data", symbol);
            return Ok(());
        };

        let tick = Tick {
            symbol: symbol.to_string(),
            price: candle.close,
            volume: candle.volume,
            timestamp: Utc::now().timestamp(),
        };

        for signal in rules.evaluate(&tick) {
            if !enqueue(queue, signal, shutdown).await {
                return Ok(());
            }
        }

        let strategies = self
            .strategies
            .iter()
            .filter(|s| s.strategy.symbol() == symbol && s.is_active());
        for slot in strategies {
            match slot.strategy.process_tick(&tick).await {
                Ok(Some(signal)) => {
                    if !enqueue(queue, signal, shutdown).await {
                        return Ok(());
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("[{}-{}] tick processing failed: {}", symbol, slot.strategy.name(), e),
            }
        }
        Ok(())
    }
}
