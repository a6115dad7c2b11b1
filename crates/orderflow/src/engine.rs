use crate::bar::{BarAggregate, BarSummary};
use crate::classifier::{classify_tick, Classification, DropReason};
use crate::config::EngineConfig;
use crate::ladder::Imbalance;
use crate::profile::{VolumeProfile, VolumeProfileSnapshot};
use crate::store::BarStore;
use crate::OrderFlowError;
use ladderflow_core::{FeedEvent, FeedMode, Side, TradeTick};
use rust_decimal::Decimal;
use serde::Serialize;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened to a single trade tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickOutcome {
    Recorded {
        bar_index: usize,
        side: Side,
        price: Decimal,
        volume: u64,
    },
    /// Rejected by the classifier.
    Dropped(DropReason),
    /// No bar is open to receive the trade.
    NoOpenBar,
    /// Live tick addressed to a bar older than the one forming.
    Stale { bar_index: usize, current: usize },
}

/// What happened to a bar-boundary signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryOutcome {
    /// A new aggregate was created and is now the forming bar.
    Opened { bar_index: usize, prior_cumulative_delta: i64 },
    /// The bar already existed (created ahead or lazily); it is now forming.
    Resumed { bar_index: usize },
    /// Live boundary for an index behind the forming bar.
    Stale { bar_index: usize, current: usize },
    /// Index is below `bars_required`.
    BelowRequired { bar_index: usize },
}

/// Outcome of [`OrderFlowEngine::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedOutcome {
    Boundary(BoundaryOutcome),
    Tick(TickOutcome),
}

/// Running counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub ticks_recorded: u64,
    pub ticks_dropped: u64,
    pub ticks_without_bar: u64,
    pub stale_events: u64,
}

/// Order-flow aggregation for one chart/instrument session.
///
/// Bar boundaries and trade ticks must be delivered serially. The bar store
/// is created by the first accepted boundary; until then ticks have nowhere
/// to go and profiles cannot be built.
#[derive(Debug)]
pub struct OrderFlowEngine {
    id: Uuid,
    config: EngineConfig,
    profile: VolumeProfile,
    store: Option<BarStore>,
    current_bar: Option<usize>,
    mode: FeedMode,
    stats: EngineStats,
}

impl OrderFlowEngine {
    pub fn new(config: EngineConfig) -> Self {
        let id = Uuid::new_v4();
        info!(
            session = %id,
            tick_size = %config.tick_size,
            chain_cumulative_delta = config.chain_cumulative_delta,
            "Order flow session created"
        );
        Self {
            id,
            profile: VolumeProfile::new(config.profile_warmup_floor),
            config,
            store: None,
            current_bar: None,
            mode: FeedMode::Backfill,
            stats: EngineStats::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Index of the bar currently receiving ticks.
    pub fn current_bar_index(&self) -> Option<usize> {
        self.current_bar
    }

    pub fn store(&self) -> Option<&BarStore> {
        self.store.as_ref()
    }

    pub fn bar(&self, index: usize) -> Option<&BarAggregate> {
        self.store.as_ref().and_then(|s| s.get(index))
    }

    /// Dispatch one feed event.
    pub fn handle(&mut self, event: &FeedEvent) -> FeedOutcome {
        match event {
            FeedEvent::BarBoundary { bar_index, mode } => {
                FeedOutcome::Boundary(self.on_bar_boundary(*bar_index, *mode))
            }
            FeedEvent::Tick(tick) => FeedOutcome::Tick(self.on_tick(tick)),
        }
    }

    /// A new bar has started.
    ///
    /// In [`FeedMode::Backfill`] any index is accepted, including indices
    /// behind the forming bar. In [`FeedMode::Live`] bar indices only move
    /// forward; an older index is logged and ignored.
    pub fn on_bar_boundary(&mut self, bar_index: usize, mode: FeedMode) -> BoundaryOutcome {
        if mode != self.mode {
            info!(session = %self.id, from = ?self.mode, to = ?mode, bar = bar_index, "Feed mode changed");
            self.mode = mode;
        }

        if bar_index < self.config.bars_required {
            debug!(session = %self.id, bar = bar_index, "Boundary below bars_required, ignoring");
            return BoundaryOutcome::BelowRequired { bar_index };
        }

        if mode == FeedMode::Live {
            if let Some(current) = self.current_bar {
                if bar_index < current {
                    warn!(
                        session = %self.id,
                        bar = bar_index,
                        current,
                        "Live boundary for an older bar, ignoring"
                    );
                    self.stats.stale_events += 1;
                    return BoundaryOutcome::Stale { bar_index, current };
                }
            }
        }

        if let Some(current) = self.current_bar {
            if bar_index > current.saturating_add(1) {
                debug!(session = %self.id, bar = bar_index, current, "Bar index gap");
            }
        }

        let chain = self.config.chain_cumulative_delta;
        let store = self.store.get_or_insert_with(BarStore::new);
        let outcome = if store.contains(bar_index) {
            BoundaryOutcome::Resumed { bar_index }
        } else {
            let prior = if chain { store.cumulative_before(bar_index) } else { 0 };
            store.open_bar(bar_index, prior);
            BoundaryOutcome::Opened {
                bar_index,
                prior_cumulative_delta: prior,
            }
        };
        self.current_bar = Some(bar_index);
        outcome
    }

    /// Classify a trade and add it to the forming bar.
    pub fn on_tick(&mut self, tick: &TradeTick) -> TickOutcome {
        let (side, price, volume) = match self.classify(tick) {
            Ok(c) => c,
            Err(outcome) => return outcome,
        };
        let Some(index) = self.current_bar else {
            debug!(session = %self.id, "Tick before any bar opened, dropping");
            self.stats.ticks_without_bar += 1;
            return TickOutcome::NoOpenBar;
        };
        self.store
            .get_or_insert_with(BarStore::new)
            .get_or_create(index)
            .add_order(volume, side, price);
        self.stats.ticks_recorded += 1;
        TickOutcome::Recorded {
            bar_index: index,
            side,
            price,
            volume,
        }
    }

    /// Classify a trade and add it to an explicit bar.
    ///
    /// A bar that does not exist yet is created on the spot, which lets
    /// backfill deliver ticks for bars the boundary stream has not reached.
    /// In live mode a tick for a bar older than the forming one is ignored.
    pub fn on_tick_at(&mut self, bar_index: usize, tick: &TradeTick) -> TickOutcome {
        let (side, price, volume) = match self.classify(tick) {
            Ok(c) => c,
            Err(outcome) => return outcome,
        };
        if bar_index < self.config.bars_required {
            self.stats.ticks_without_bar += 1;
            return TickOutcome::NoOpenBar;
        }
        if self.mode == FeedMode::Live {
            if let Some(current) = self.current_bar {
                if bar_index < current {
                    warn!(
                        session = %self.id,
                        bar = bar_index,
                        current,
                        "Live tick for an older bar, ignoring"
                    );
                    self.stats.stale_events += 1;
                    return TickOutcome::Stale { bar_index, current };
                }
            }
        }

        let chain = self.config.chain_cumulative_delta;
        let store = self.store.get_or_insert_with(BarStore::new);
        let prior = if chain && !store.contains(bar_index) {
            store.cumulative_before(bar_index)
        } else {
            0
        };
        store.open_bar(bar_index, prior).add_order(volume, side, price);
        self.stats.ticks_recorded += 1;
        TickOutcome::Recorded {
            bar_index,
            side,
            price,
            volume,
        }
    }

    fn classify(&mut self, tick: &TradeTick) -> Result<(Side, Decimal, u64), TickOutcome> {
        match classify_tick(tick) {
            Classification::Classified { side, price, volume } => Ok((side, price, volume)),
            Classification::Unclassified(reason) => {
                debug!(session = %self.id, ?reason, price = %tick.price, "Tick not classified");
                self.stats.ticks_dropped += 1;
                Err(TickOutcome::Dropped(reason))
            }
        }
    }

    /// Volume profile over `bars` (inclusive). Fails if no bar store exists
    /// yet, which means the engine is being queried before it was fed.
    pub fn build_profile(
        &self,
        bars: RangeInclusive<usize>,
    ) -> Result<(VolumeProfileSnapshot, u64), OrderFlowError> {
        let store = self.store.as_ref().ok_or(OrderFlowError::StoreNotInitialized)?;
        Ok(self.profile.build_snapshot(bars, store))
    }

    /// Summaries of every stored bar in index order.
    pub fn bar_summaries(&self) -> Vec<BarSummary> {
        self.store
            .iter()
            .flat_map(|s| s.iter())
            .map(|(i, bar)| bar.summary(i))
            .collect()
    }

    /// Diagonal imbalances in a bar using the configured tick size and ratio.
    pub fn imbalances(&self, bar_index: usize) -> Vec<Imbalance> {
        self.bar(bar_index)
            .map(|bar| {
                bar.ladder()
                    .imbalances(self.config.tick_size, self.config.imbalance_ratio)
            })
            .unwrap_or_default()
    }
}

impl Default for OrderFlowEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ladder::Rung;
    use rust_decimal_macros::dec;

    fn tick(price: Decimal, volume: u64, bid: Decimal, ask: Decimal) -> TradeTick {
        TradeTick::new(Default::default(), price, Decimal::from(volume), bid, ask)
    }

    #[test]
    fn test_three_tick_scenario() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(0, FeedMode::Live);

        let buy = engine.on_tick(&tick(dec!(100.25), 5, dec!(100.00), dec!(100.25)));
        let sell = engine.on_tick(&tick(dec!(100.00), 3, dec!(100.00), dec!(100.25)));
        let mid = engine.on_tick(&tick(dec!(100.10), 2, dec!(100.00), dec!(100.25)));

        assert_eq!(
            buy,
            TickOutcome::Recorded { bar_index: 0, side: Side::Buy, price: dec!(100.25), volume: 5 }
        );
        assert_eq!(
            sell,
            TickOutcome::Recorded { bar_index: 0, side: Side::Sell, price: dec!(100.00), volume: 3 }
        );
        assert_eq!(mid, TickOutcome::Dropped(DropReason::InsideSpread));

        let bar = engine.bar(0).unwrap();
        let ladder: Vec<(Decimal, Rung)> = bar.ladder().iter().collect();
        assert_eq!(
            ladder,
            vec![(dec!(100.00), Rung::new(0, 3)), (dec!(100.25), Rung::new(5, 0))]
        );
        assert_eq!(bar.net_delta(), 2);
        assert_eq!(bar.pivot_price(), Some(dec!(100.25)));
        // The mid-spread print left no trace at its raw price
        assert!(bar.rung(dec!(100.10)).is_none());
    }

    #[test]
    fn test_cumulative_delta_chained_across_bars() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(0, FeedMode::Live);
        engine.on_tick(&tick(dec!(100.25), 10, dec!(100.00), dec!(100.25)));

        let opened = engine.on_bar_boundary(1, FeedMode::Live);
        assert_eq!(
            opened,
            BoundaryOutcome::Opened { bar_index: 1, prior_cumulative_delta: 10 }
        );
        engine.on_tick(&tick(dec!(100.00), 4, dec!(100.00), dec!(100.25)));

        let bar1 = engine.bar(1).unwrap();
        assert_eq!(bar1.net_delta(), -4);
        assert_eq!(bar1.cumulative_delta(), 6);
        assert_eq!(engine.bar(0).unwrap().cumulative_delta(), 10);
    }

    #[test]
    fn test_chaining_disabled_starts_from_zero() {
        let mut engine = OrderFlowEngine::new(EngineConfig {
            chain_cumulative_delta: false,
            ..Default::default()
        });
        engine.on_bar_boundary(0, FeedMode::Live);
        engine.on_tick(&tick(dec!(100.25), 10, dec!(100.00), dec!(100.25)));
        engine.on_bar_boundary(1, FeedMode::Live);
        engine.on_tick(&tick(dec!(100.00), 4, dec!(100.00), dec!(100.25)));

        assert_eq!(engine.bar(1).unwrap().prior_cumulative_delta(), 0);
        assert_eq!(engine.bar(1).unwrap().cumulative_delta(), -4);
    }

    #[test]
    fn test_live_stale_boundary_ignored() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(5, FeedMode::Live);
        engine.on_bar_boundary(6, FeedMode::Live);

        let outcome = engine.on_bar_boundary(4, FeedMode::Live);
        assert_eq!(outcome, BoundaryOutcome::Stale { bar_index: 4, current: 6 });
        assert_eq!(engine.current_bar_index(), Some(6));
        assert!(engine.bar(4).is_none());
        assert_eq!(engine.stats().stale_events, 1);

        // Repeating the current boundary is harmless
        assert_eq!(
            engine.on_bar_boundary(6, FeedMode::Live),
            BoundaryOutcome::Resumed { bar_index: 6 }
        );
    }

    #[test]
    fn test_live_tick_for_older_bar_ignored() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(1, FeedMode::Live);
        engine.on_bar_boundary(2, FeedMode::Live);

        let outcome = engine.on_tick_at(1, &tick(dec!(100.25), 3, dec!(100.00), dec!(100.25)));
        assert_eq!(outcome, TickOutcome::Stale { bar_index: 1, current: 2 });
        assert!(engine.bar(1).unwrap().is_empty());
    }

    #[test]
    fn test_backfill_tolerates_out_of_order_and_gaps() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(20, FeedMode::Backfill);
        engine.on_bar_boundary(17, FeedMode::Backfill);
        engine.on_tick(&tick(dec!(100.25), 2, dec!(100.00), dec!(100.25)));

        assert_eq!(engine.current_bar_index(), Some(17));
        assert_eq!(engine.bar(17).unwrap().total_buys(), 2);

        // Tick for a bar no boundary has mentioned yet
        let outcome = engine.on_tick_at(25, &tick(dec!(100.00), 1, dec!(100.00), dec!(100.25)));
        assert!(matches!(outcome, TickOutcome::Recorded { bar_index: 25, .. }));
        let indices: Vec<usize> = engine.store().unwrap().iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![17, 20, 25]);
    }

    #[test]
    fn test_lazy_bar_takes_prior_from_nearest_lower_bar() {
        for chain in [true, false] {
            let mut engine = OrderFlowEngine::new(EngineConfig {
                chain_cumulative_delta: chain,
                ..Default::default()
            });
            engine.on_bar_boundary(0, FeedMode::Backfill);
            engine.on_tick(&tick(dec!(100.25), 7, dec!(100.00), dec!(100.25)));
            engine.on_tick(&tick(dec!(100.00), 2, dec!(100.00), dec!(100.25)));
            let expected = if chain {
                engine.store().unwrap().cumulative_before(3)
            } else {
                0
            };

            engine.on_tick_at(3, &tick(dec!(100.00), 1, dec!(100.00), dec!(100.25)));
            let bar3 = engine.bar(3).unwrap();
            assert_eq!(bar3.prior_cumulative_delta(), expected);
            assert_eq!(bar3.prior_cumulative_delta(), if chain { 5 } else { 0 });
            assert_eq!(bar3.cumulative_delta(), expected - 1);

            // A second tick for the same bar keeps the prior fixed at creation
            engine.on_tick(&tick(dec!(100.25), 4, dec!(100.00), dec!(100.25)));
            engine.on_tick_at(3, &tick(dec!(100.25), 1, dec!(100.00), dec!(100.25)));
            assert_eq!(engine.bar(3).unwrap().prior_cumulative_delta(), expected);
            assert_eq!(engine.current_bar_index(), Some(0));
        }
    }

    #[test]
    fn test_oversized_volume_dropped() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(0, FeedMode::Live);
        let mut huge = tick(dec!(100.25), 0, dec!(100.00), dec!(100.25));
        huge.volume = Decimal::from(i64::MAX) + Decimal::ONE;

        assert_eq!(
            engine.on_tick(&huge),
            TickOutcome::Dropped(DropReason::VolumeOutOfRange)
        );
        assert!(engine.bar(0).unwrap().is_empty());
        assert_eq!(engine.stats().ticks_dropped, 1);
    }

    #[test]
    fn test_boundary_at_max_index() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(usize::MAX, FeedMode::Backfill);
        assert_eq!(
            engine.on_bar_boundary(usize::MAX, FeedMode::Backfill),
            BoundaryOutcome::Resumed { bar_index: usize::MAX }
        );
        assert!(matches!(
            engine.on_bar_boundary(3, FeedMode::Backfill),
            BoundaryOutcome::Opened { bar_index: 3, .. }
        ));
        assert_eq!(engine.current_bar_index(), Some(3));
    }

    #[test]
    fn test_backfill_then_live_transition() {
        let mut engine = OrderFlowEngine::default();
        engine.handle(&FeedEvent::boundary(0, true));
        engine.handle(&FeedEvent::boundary(1, true));
        assert_eq!(engine.mode(), FeedMode::Backfill);

        let outcome = engine.handle(&FeedEvent::boundary(2, false));
        assert_eq!(
            outcome,
            FeedOutcome::Boundary(BoundaryOutcome::Opened { bar_index: 2, prior_cumulative_delta: 0 })
        );
        assert_eq!(engine.mode(), FeedMode::Live);
    }

    #[test]
    fn test_tick_before_boundary_has_no_bar() {
        let mut engine = OrderFlowEngine::default();
        let outcome = engine.on_tick(&tick(dec!(100.25), 1, dec!(100.00), dec!(100.25)));
        assert_eq!(outcome, TickOutcome::NoOpenBar);
        assert!(engine.store().is_none());
        assert_eq!(engine.stats().ticks_without_bar, 1);
    }

    #[test]
    fn test_bars_required_gates_boundaries() {
        let mut engine = OrderFlowEngine::new(EngineConfig {
            bars_required: 5,
            ..Default::default()
        });
        assert_eq!(
            engine.on_bar_boundary(3, FeedMode::Backfill),
            BoundaryOutcome::BelowRequired { bar_index: 3 }
        );
        assert!(engine.store().is_none());
        assert!(matches!(
            engine.on_bar_boundary(5, FeedMode::Backfill),
            BoundaryOutcome::Opened { bar_index: 5, .. }
        ));
    }

    #[test]
    fn test_build_profile_requires_store() {
        let engine = OrderFlowEngine::default();
        let err = engine.build_profile(0..=100).unwrap_err();
        assert!(matches!(err, OrderFlowError::StoreNotInitialized));
    }

    #[test]
    fn test_build_profile_over_session() {
        let mut engine = OrderFlowEngine::default();
        for index in 0..15 {
            engine.on_bar_boundary(index, FeedMode::Backfill);
            engine.on_tick(&tick(dec!(100.25), 1, dec!(100.00), dec!(100.25)));
            engine.on_tick(&tick(dec!(100.00), 2, dec!(100.00), dec!(100.25)));
        }

        let (snapshot, max) = engine.build_profile(0..=14).unwrap();
        // Bars 10..=14 only
        assert_eq!(snapshot.bars_included(), 5);
        assert_eq!(snapshot.get(dec!(100.25)), Some(&Rung::new(5, 0)));
        assert_eq!(snapshot.get(dec!(100.00)), Some(&Rung::new(0, 10)));
        assert_eq!(max, 10);
    }

    #[test]
    fn test_reads_are_idempotent() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(0, FeedMode::Live);
        engine.on_tick(&tick(dec!(100.25), 3, dec!(100.00), dec!(100.25)));

        let a = engine.bar_summaries();
        let b = engine.bar_summaries();
        assert_eq!(a, b);
        assert_eq!(engine.bar(0).unwrap().net_delta(), engine.bar(0).unwrap().net_delta());
    }

    #[test]
    fn test_engine_imbalances_use_config() {
        let mut engine = OrderFlowEngine::default();
        engine.on_bar_boundary(0, FeedMode::Live);
        engine.on_tick(&tick(dec!(100.00), 9, dec!(100.00), dec!(100.25)));
        engine.on_tick(&tick(dec!(100.50), 3, dec!(100.00), dec!(100.25)));

        let found = engine.imbalances(0);
        assert_eq!(found, vec![Imbalance { price: dec!(100.00), side: Side::Sell }]);
        assert!(engine.imbalances(42).is_empty());
    }
}
