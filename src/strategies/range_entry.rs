// src/strategies/range_entry.rs
use crate::config::{EngineConfig, PositionRuleConfig};
use crate::types::{PositionSide, Side, Signal, Tick};
use tracing::info;

pub const LONG_RULE_NAME: &str = "LongPosition";
pub const SHORT_RULE_NAME: &str = "ShortPosition";

/// Edge-triggered entry state for one side of one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Waiting for price to enter the band.
    Armed,
    /// Already fired for the current stay inside the band.
    Triggered,
}

#[derive(Debug, Clone)]
pub struct EntryRule {
    side: PositionSide,
    rules: PositionRuleConfig,
    state: EntryState,
}

impl EntryRule {
    pub fn new(side: PositionSide, rules: PositionRuleConfig) -> Self {
        Self {
            side,
            rules,
            state: EntryState::Armed,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    fn name(&self) -> &'static str {
        match self.side {
            PositionSide::Long => LONG_RULE_NAME,
            PositionSide::Short => SHORT_RULE_NAME,
        }
    }

    /// Advances the state machine with one tick; fires at most once per stay in the band.
    pub fn on_tick(&mut self, tick: &Tick) -> Option<Signal> {
        if !self.rules.entry_range.contains(tick.price) {
            self.state = EntryState::Armed;
            return None;
        }
        if !self.rules.enabled || self.state == EntryState::Triggered {
            return None;
        }

        self.state = EntryState::Triggered;
        let action = match self.side {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        };
        info!(
            "[{}] price {} inside {} entry range [{}, {}]",
            tick.symbol, tick.price, self.side, self.rules.entry_range.min, self.rules.entry_range.max
        );

        Some(Signal {
            symbol: tick.symbol.clone(),
            strategy: self.name().to_string(),
            action,
            price: tick.price,
            amount: self.rules.position_size,
            timestamp: tick.timestamp,
        })
    }
}

/// Static long/short entry bands for a single symbol.
#[derive(Debug, Clone)]
pub struct RangeEntryRules {
    long: EntryRule,
    short: EntryRule,
}

impl RangeEntryRules {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            long: EntryRule::new(PositionSide::Long, config.long_position.clone()),
            short: EntryRule::new(PositionSide::Short, config.short_position.clone()),
        }
    }

    pub fn evaluate(&mut self, tick: &Tick) -> Vec<Signal> {
        [self.long.on_tick(tick), self.short.on_tick(tick)]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn state(&self, side: PositionSide) -> EntryState {
        match side {
            PositionSide::Long => self.long.state(),
            PositionSide::Short => self.short.state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntryRange;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn tick(price: Decimal) -> Tick {
        Tick {
            symbol: "BTC-USDT-SWAP".into(),
            price,
            volume: Decimal::ZERO,
            timestamp: 1_700_000_000,
        }
    }

    fn config(long_enabled: bool, short_enabled: bool) -> EngineConfig {
        let band = EntryRange {
            min: dec!(30000),
            max: dec!(30100),
        };
        EngineConfig {
            long_position: PositionRuleConfig {
                enabled: long_enabled,
                entry_range: band,
                position_size: dec!(2),
                ..PositionRuleConfig::default()
            },
            short_position: PositionRuleConfig {
                enabled: short_enabled,
                entry_range: band,
                position_size: dec!(3),
                ..PositionRuleConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_hysteresis_one_signal_per_dwell() {
        let mut rules = RangeEntryRules::new(&config(true, false));
        let mut signals = Vec::new();
        for price in [dec!(30050), dec!(30050), dec!(29900), dec!(30050)] {
            signals.extend(rules.evaluate(&tick(price)));
        }

        assert_eq!(signals.len(), 2);
        assert!(signals.iter().all(|s| s.action == Side::Buy && s.strategy == LONG_RULE_NAME));
        assert_eq!(signals[0].amount, dec!(2));
    }

    #[test]
    fn test_band_edges_are_inclusive() {
        let mut rules = RangeEntryRules::new(&config(true, false));
        assert_eq!(rules.evaluate(&tick(dec!(30100))).len(), 1);
        assert_eq!(rules.state(PositionSide::Long), EntryState::Triggered);

        assert!(rules.evaluate(&tick(dec!(30100.01))).is_empty());
        assert_eq!(rules.state(PositionSide::Long), EntryState::Armed);
        assert_eq!(rules.evaluate(&tick(dec!(30000))).len(), 1);
    }

    #[test]
    fn test_both_sides_fire_independently() {
        let mut rules = RangeEntryRules::new(&config(true, true));
        let signals = rules.evaluate(&tick(dec!(30010)));

        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].action, Side::Buy);
        assert_eq!(signals[1].action, Side::Sell);
        assert_eq!(signals[1].strategy, SHORT_RULE_NAME);
        assert_eq!(signals[1].amount, dec!(3));
    }

    #[test]
    fn test_disabled_side_stays_silent() {
        let mut rules = RangeEntryRules::new(&config(false, false));
        assert!(rules.evaluate(&tick(dec!(30050))).is_empty());
        assert_eq!(rules.state(PositionSide::Long), EntryState::Armed);
    }
}
