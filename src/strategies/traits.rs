// src/strategies/traits.rs
use crate::error::EngineResult;
use crate::types::{Signal, Tick};
use async_trait::async_trait;

/// A per-symbol evaluation unit. Implementations keep their mutable state
/// behind their own lock, so every method takes `&self`.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn symbol(&self) -> &str;

    // Prepare internal state (e.g. load history)
    async fn initialize(&self) -> EngineResult<()>;

    // Process new tick
    async fn process_tick(&self, tick: &Tick) -> EngineResult<Option<Signal>>;

    // Drop all internal state
    async fn stop(&self);
}
