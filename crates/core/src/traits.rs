use crate::events::FeedEvent;
use crate::models::Timeframe;

// ---------------------------------------------------------------------------
// Feed Provider Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while loading recorded market data.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("Data not found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Supplies a recorded session as the ordered stream of events a live feed
/// would have delivered.
pub trait FeedProvider {
    /// Load every event for an instrument, bucketed into bars of `timeframe`.
    fn load_events(&self, instrument: &str, timeframe: Timeframe)
        -> Result<Vec<FeedEvent>, DataError>;

    /// List available instruments.
    fn available_instruments(&self) -> Result<Vec<String>, DataError>;
}
