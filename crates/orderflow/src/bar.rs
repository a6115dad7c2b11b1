use crate::ladder::{signed_delta, PriceLadder, Rung};
use ladderflow_core::Side;
use rust_decimal::Decimal;
use serde::Serialize;

/// Order flow accumulated for one bar: the price ladder plus running delta
/// statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BarAggregate {
    ladder: PriceLadder,
    total_buys: u64,
    total_sells: u64,
    max_delta: Option<i64>,
    min_delta: Option<i64>,
    pivot_price: Option<Decimal>,
    /// Cumulative delta carried in from the previous bar. Fixed at creation.
    prior_cumulative_delta: i64,
}

impl BarAggregate {
    pub fn new(prior_cumulative_delta: i64) -> Self {
        Self {
            prior_cumulative_delta,
            ..Default::default()
        }
    }

    /// Record classified volume and refresh the derived statistics.
    pub fn add_order(&mut self, volume: u64, side: Side, price: Decimal) {
        let touched = self.ladder.add_order(volume, side, price);
        match side {
            Side::Buy => self.total_buys = self.total_buys.saturating_add(volume),
            Side::Sell => self.total_sells = self.total_sells.saturating_add(volume),
        }

        let delta = self.net_delta();
        self.max_delta = Some(self.max_delta.map_or(delta, |m| m.max(delta)));
        self.min_delta = Some(self.min_delta.map_or(delta, |m| m.min(delta)));

        // Strict greater-than: the first level to reach a volume keeps the pivot.
        let pivot_volume = self
            .pivot_price
            .map(|p| self.ladder.rung_or_zero(p).total());
        match pivot_volume {
            Some(current) if touched.total() <= current => {}
            _ => self.pivot_price = Some(price),
        }
    }

    pub fn ladder(&self) -> &PriceLadder {
        &self.ladder
    }

    pub fn rung(&self, price: Decimal) -> Option<&Rung> {
        self.ladder.get(price)
    }

    pub fn total_buys(&self) -> u64 {
        self.total_buys
    }

    pub fn total_sells(&self) -> u64 {
        self.total_sells
    }

    pub fn total_volume(&self) -> u64 {
        self.total_buys.saturating_add(self.total_sells)
    }

    /// Buys minus sells for this bar.
    pub fn net_delta(&self) -> i64 {
        signed_delta(self.total_buys, self.total_sells)
    }

    pub fn cumulative_delta(&self) -> i64 {
        self.net_delta().saturating_add(self.prior_cumulative_delta)
    }

    pub fn prior_cumulative_delta(&self) -> i64 {
        self.prior_cumulative_delta
    }

    /// Highest running delta seen inside the bar. `None` before the first trade.
    pub fn max_delta(&self) -> Option<i64> {
        self.max_delta
    }

    pub fn min_delta(&self) -> Option<i64> {
        self.min_delta
    }

    pub fn pivot_price(&self) -> Option<Decimal> {
        self.pivot_price
    }

    pub fn is_empty(&self) -> bool {
        self.ladder.is_empty()
    }

    pub fn summary(&self, index: usize) -> BarSummary {
        BarSummary {
            index,
            buys: self.total_buys,
            sells: self.total_sells,
            delta: self.net_delta(),
            min_delta: self.min_delta,
            max_delta: self.max_delta,
            cumulative_delta: self.cumulative_delta(),
            pivot_price: self.pivot_price,
            levels: self.ladder.len(),
        }
    }
}

/// Flat view of a bar's statistics for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BarSummary {
    pub index: usize,
    pub buys: u64,
    pub sells: u64,
    pub delta: i64,
    pub min_delta: Option<i64>,
    pub max_delta: Option<i64>,
    pub cumulative_delta: i64,
    pub pivot_price: Option<Decimal>,
    pub levels: usize,
}
