use ladderflow_core::{FeedEvent, FeedMode, Timeframe, TradeTick};
use tracing::debug;

/// Assigns bar indices to a time-ordered tick stream and reports bar
/// boundaries the way a charting host would.
///
/// Indices are dense: a time bucket with no trades produces no bar.
#[derive(Debug, Clone)]
pub struct BarClock {
    timeframe: Timeframe,
    /// Bars with an index below this are reported as backfill; the rest live.
    backfill_bars: usize,
    current_bucket: Option<i64>,
    current_index: Option<usize>,
    ticks_seen: u64,
}

impl BarClock {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            backfill_bars: usize::MAX,
            current_bucket: None,
            current_index: None,
            ticks_seen: 0,
        }
    }

    /// Report the first `count` bars as historical and every later bar as
    /// live, simulating a chart that loads history then starts streaming.
    pub fn with_backfill_bars(mut self, count: usize) -> Self {
        self.backfill_bars = count;
        self
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    fn bucket(&self, tick: &TradeTick) -> i64 {
        match (self.timeframe, self.timeframe.seconds()) {
            (Timeframe::Tick(n), _) => (self.ticks_seen / u64::from(n.max(1))) as i64,
            (_, Some(secs)) => tick.timestamp.timestamp().div_euclid(secs.max(1)),
            (_, None) => 0,
        }
    }

    fn mode_for(&self, index: usize) -> FeedMode {
        if index < self.backfill_bars {
            FeedMode::Backfill
        } else {
            FeedMode::Live
        }
    }

    /// Advance the clock by one tick. Returns a boundary event when the tick
    /// starts a new bar.
    pub fn push(&mut self, tick: &TradeTick) -> Option<FeedEvent> {
        let bucket = self.bucket(tick);
        self.ticks_seen += 1;

        if self.current_bucket == Some(bucket) {
            return None;
        }
        let index = self.current_index.map_or(0, |i| i + 1);
        self.current_bucket = Some(bucket);
        self.current_index = Some(index);
        debug!(bar = index, bucket, "Bar boundary");
        Some(FeedEvent::BarBoundary {
            bar_index: index,
            mode: self.mode_for(index),
        })
    }

    /// Interleave boundary and tick events for a whole recorded session.
    pub fn events(&mut self, ticks: &[TradeTick]) -> Vec<FeedEvent> {
        let mut events = Vec::with_capacity(ticks.len() + ticks.len() / 8);
        for tick in ticks {
            if let Some(boundary) = self.push(tick) {
                events.push(boundary);
            }
            events.push(FeedEvent::Tick(tick.clone()));
        }
        events
    }
}
