use crate::models::*;
use serde::{Deserialize, Serialize};

/// Events delivered serially by a market data feed to one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeedEvent {
    /// A new bar has started.
    BarBoundary { bar_index: usize, mode: FeedMode },
    /// A trade printed inside the currently forming bar.
    Tick(TradeTick),
}

impl FeedEvent {
    pub fn boundary(bar_index: usize, is_historical: bool) -> Self {
        FeedEvent::BarBoundary {
            bar_index,
            mode: FeedMode::from_historical(is_historical),
        }
    }
}
