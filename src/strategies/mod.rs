// src/strategies/mod.rs
pub mod grid;
pub mod range_entry;
pub mod rsi;
pub mod traits;

pub use grid::GridStrategy;
pub use range_entry::{EntryState, RangeEntryRules};
pub use rsi::RsiStrategy;
pub use traits::Strategy;
