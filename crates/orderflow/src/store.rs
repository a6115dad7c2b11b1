use crate::bar::BarAggregate;
use std::collections::BTreeMap;
use std::ops::RangeBounds;
use tracing::debug;

/// Bar index -> [`BarAggregate`] for one chart session.
///
/// Indices are normally dense and increasing, but gaps and out-of-order
/// creation during historical replay are tolerated. Bars are never removed.
#[derive(Debug, Clone, Default)]
pub struct BarStore {
    bars: BTreeMap<usize, BarAggregate>,
}

impl BarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the bar at `index`, creating an empty one with no carried-in
    /// cumulative delta if it does not exist yet.
    pub fn get_or_create(&mut self, index: usize) -> &mut BarAggregate {
        self.open_bar(index, 0)
    }

    /// Like [`BarStore::get_or_create`], but a newly created bar starts from
    /// `prior_cumulative_delta`. An existing bar keeps the prior it was
    /// created with.
    pub fn open_bar(&mut self, index: usize, prior_cumulative_delta: i64) -> &mut BarAggregate {
        self.bars.entry(index).or_insert_with(|| {
            debug!(bar = index, prior = prior_cumulative_delta, "Opened bar");
            BarAggregate::new(prior_cumulative_delta)
        })
    }

    pub fn get(&self, index: usize) -> Option<&BarAggregate> {
        self.bars.get(&index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut BarAggregate> {
        self.bars.get_mut(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.bars.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_index(&self) -> Option<usize> {
        self.bars.keys().next().copied()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.bars.keys().next_back().copied()
    }

    /// Bars in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &BarAggregate)> + '_ {
        self.bars.iter().map(|(i, b)| (*i, b))
    }

    /// Present bars whose index falls within `range`, ascending.
    pub fn range<R>(&self, range: R) -> impl Iterator<Item = (usize, &BarAggregate)> + '_
    where
        R: RangeBounds<usize>,
    {
        self.bars.range(range).map(|(i, b)| (*i, b))
    }

    /// Cumulative delta of the nearest present bar below `index`, or 0.
    pub fn cumulative_before(&self, index: usize) -> i64 {
        self.bars
            .range(..index)
            .next_back()
            .map(|(_, bar)| bar.cumulative_delta())
            .unwrap_or(0)
    }
}
