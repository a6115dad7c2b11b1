use crate::ladder::{PriceLadder, Rung};
use crate::store::BarStore;
use rust_decimal::Decimal;
use serde::Serialize;
use std::ops::RangeInclusive;

/// Bars below this index are left out of the profile; the first bars of a
/// chart usually carry partial data.
pub const DEFAULT_WARMUP_FLOOR: usize = 10;

/// Volume by price summed across a range of bars. Rebuilt on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VolumeProfileSnapshot {
    levels: PriceLadder,
    bars_included: usize,
}

impl VolumeProfileSnapshot {
    /// Levels in ascending price order.
    pub fn rungs(&self) -> impl Iterator<Item = (Decimal, Rung)> + '_ {
        self.levels.iter()
    }

    pub fn ladder(&self) -> &PriceLadder {
        &self.levels
    }

    pub fn get(&self, price: Decimal) -> Option<&Rung> {
        self.levels.get(price)
    }

    /// Largest combined volume at any level; 0 when nothing was aggregated.
    pub fn max_volume(&self) -> u64 {
        self.levels.max_volume()
    }

    pub fn total_volume(&self) -> u64 {
        self.levels.total_volume()
    }

    pub fn point_of_control(&self) -> Option<Decimal> {
        self.levels.point_of_control()
    }

    /// Number of bars that contributed to the snapshot.
    pub fn bars_included(&self) -> usize {
        self.bars_included
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Builds [`VolumeProfileSnapshot`]s from a [`BarStore`].
#[derive(Debug, Clone, Copy)]
pub struct VolumeProfile {
    warmup_floor: usize,
}

impl VolumeProfile {
    pub fn new(warmup_floor: usize) -> Self {
        Self { warmup_floor }
    }

    pub fn warmup_floor(&self) -> usize {
        self.warmup_floor
    }

    /// Sum the ladders of every present bar in `bars` (inclusive) at or above
    /// the warm-up floor. Returns the snapshot and its maximum level volume.
    pub fn build_snapshot(
        &self,
        bars: RangeInclusive<usize>,
        store: &BarStore,
    ) -> (VolumeProfileSnapshot, u64) {
        let mut snapshot = VolumeProfileSnapshot::default();
        let (start, end) = bars.into_inner();
        let start = start.max(self.warmup_floor);
        if start > end {
            return (snapshot, 0);
        }

        for (_, bar) in store.range(start..=end) {
            snapshot.levels.merge(bar.ladder());
            snapshot.bars_included += 1;
        }

        let max_volume = snapshot.max_volume();
        (snapshot, max_volume)
    }
}

impl Default for VolumeProfile {
    fn default() -> Self {
        Self::new(DEFAULT_WARMUP_FLOOR)
    }
}
