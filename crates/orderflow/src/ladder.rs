use ladderflow_core::Side;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Buy and sell volume accumulated at one price level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rung {
    pub buy: u64,
    pub sell: u64,
}

impl Rung {
    pub fn new(buy: u64, sell: u64) -> Self {
        Self { buy, sell }
    }

    pub fn total(&self) -> u64 {
        self.buy.saturating_add(self.sell)
    }

    pub fn delta(&self) -> i64 {
        signed_delta(self.buy, self.sell)
    }

    /// Accumulated volume saturates at `u64::MAX` rather than wrapping.
    pub fn add(&mut self, volume: u64, side: Side) {
        match side {
            Side::Buy => self.buy = self.buy.saturating_add(volume),
            Side::Sell => self.sell = self.sell.saturating_add(volume),
        }
    }

    fn absorb(&mut self, other: &Rung) {
        self.buy = self.buy.saturating_add(other.buy);
        self.sell = self.sell.saturating_add(other.sell);
    }
}

/// `buy - sell`, clamped to the `i64` range.
pub(crate) fn signed_delta(buy: u64, sell: u64) -> i64 {
    let delta = i128::from(buy) - i128::from(sell);
    i64::try_from(delta).unwrap_or(if delta > 0 { i64::MAX } else { i64::MIN })
}

/// A price level where one side's aggression dwarfs the other side's on the
/// diagonally adjacent level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Imbalance {
    pub price: Decimal,
    pub side: Side,
}

/// Price level -> [`Rung`] for a single aggregation window.
///
/// Iterates in ascending price order. Reads never create entries: use
/// [`PriceLadder::get`] to observe absence, [`PriceLadder::rung_or_zero`]
/// for arithmetic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PriceLadder {
    rungs: BTreeMap<Decimal, Rung>,
}

impl PriceLadder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add classified volume at `price`, creating the rung on first touch.
    /// Returns the updated rung.
    pub fn add_order(&mut self, volume: u64, side: Side, price: Decimal) -> Rung {
        let rung = self.rungs.entry(price).or_default();
        rung.add(volume, side);
        *rung
    }

    pub fn get(&self, price: Decimal) -> Option<&Rung> {
        self.rungs.get(&price)
    }

    pub fn rung_or_zero(&self, price: Decimal) -> Rung {
        self.rungs.get(&price).copied().unwrap_or_default()
    }

    pub fn contains(&self, price: Decimal) -> bool {
        self.rungs.contains_key(&price)
    }

    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    /// Rungs in ascending price order.
    pub fn iter(&self) -> impl Iterator<Item = (Decimal, Rung)> + '_ {
        self.rungs.iter().map(|(p, r)| (*p, *r))
    }

    /// Sum of `buy - sell` across every rung.
    pub fn net_delta(&self) -> i64 {
        signed_delta(self.total_buys(), self.total_sells())
    }

    pub fn total_buys(&self) -> u64 {
        self.rungs.values().fold(0, |acc, r| acc.saturating_add(r.buy))
    }

    pub fn total_sells(&self) -> u64 {
        self.rungs.values().fold(0, |acc, r| acc.saturating_add(r.sell))
    }

    pub fn total_volume(&self) -> u64 {
        self.rungs.values().fold(0, |acc, r| acc.saturating_add(r.total()))
    }

    /// Largest combined volume at any level, 0 when empty.
    pub fn max_volume(&self) -> u64 {
        self.rungs.values().map(Rung::total).max().unwrap_or(0)
    }

    /// Price with the highest combined volume. Ties resolve to the lowest
    /// price since a merged ladder has no arrival order to fall back on.
    pub fn point_of_control(&self) -> Option<Decimal> {
        let mut best: Option<(Decimal, u64)> = None;
        for (price, rung) in &self.rungs {
            match best {
                Some((_, vol)) if rung.total() <= vol => {}
                _ => best = Some((*price, rung.total())),
            }
        }
        best.map(|(price, _)| price)
    }

    /// Add every rung of `other` into this ladder.
    pub fn merge(&mut self, other: &PriceLadder) {
        for (price, rung) in &other.rungs {
            self.rungs.entry(*price).or_default().absorb(rung);
        }
    }

    /// Selling at `price` versus buying one tick above.
    ///
    /// True when both levels exist, the buy volume above is non-zero and
    /// `sell(price) / buy(price + tick_size) >= ratio`.
    pub fn is_selling_significant(&self, price: Decimal, tick_size: Decimal, ratio: Decimal) -> bool {
        let (Some(here), Some(above)) = (self.get(price), self.get(price + tick_size)) else {
            return false;
        };
        if above.buy == 0 {
            return false;
        }
        Decimal::from(here.sell) / Decimal::from(above.buy) >= ratio
    }

    /// Buying at `price` versus selling one tick below.
    pub fn is_buying_significant(&self, price: Decimal, tick_size: Decimal, ratio: Decimal) -> bool {
        let (Some(here), Some(below)) = (self.get(price), self.get(price - tick_size)) else {
            return false;
        };
        if below.sell == 0 {
            return false;
        }
        Decimal::from(here.buy) / Decimal::from(below.sell) >= ratio
    }

    /// Every level flagged by either significance check, ascending by price.
    pub fn imbalances(&self, tick_size: Decimal, ratio: Decimal) -> Vec<Imbalance> {
        let mut out = Vec::new();
        for price in self.rungs.keys() {
            if self.is_buying_significant(*price, tick_size, ratio) {
                out.push(Imbalance { price: *price, side: Side::Buy });
            }
            if self.is_selling_significant(*price, tick_size, ratio) {
                out.push(Imbalance { price: *price, side: Side::Sell });
            }
        }
        out
    }
}
