pub mod bar_clock;
pub mod csv_loader;

use ladderflow_core::{DataError, FeedEvent, FeedProvider, Timeframe};
use std::path::PathBuf;
use tracing::info;

pub use bar_clock::BarClock;

/// A directory of recorded tick files (`<instrument>_ticks.csv`).
pub struct CsvFeedProvider {
    pub directory: PathBuf,
    /// Number of leading bars reported as backfill; `None` reports all.
    pub backfill_bars: Option<usize>,
}

impl CsvFeedProvider {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            backfill_bars: None,
        }
    }

    pub fn with_backfill_bars(mut self, count: usize) -> Self {
        self.backfill_bars = Some(count);
        self
    }

    fn tick_file(&self, instrument: &str) -> PathBuf {
        self.directory.join(format!("{}_ticks.csv", instrument))
    }
}

impl FeedProvider for CsvFeedProvider {
    fn load_events(
        &self,
        instrument: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<FeedEvent>, DataError> {
        let file_path = self.tick_file(instrument);
        if !file_path.exists() {
            return Err(DataError::NotFound(format!(
                "Tick CSV file not found: {}",
                file_path.display()
            )));
        }
        let ticks = csv_loader::load_ticks_from_csv(&file_path)?;

        let mut clock = BarClock::new(timeframe);
        if let Some(count) = self.backfill_bars {
            clock = clock.with_backfill_bars(count);
        }
        let events = clock.events(&ticks);
        info!(
            instrument,
            ticks = ticks.len(),
            bars = clock.current_index().map_or(0, |i| i + 1),
            "Loaded recorded session"
        );
        Ok(events)
    }

    fn available_instruments(&self) -> Result<Vec<String>, DataError> {
        let mut instruments = Vec::new();
        for entry in std::fs::read_dir(&self.directory)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "csv").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    let name = stem.to_string_lossy().to_string();
                    if let Some(symbol) = name.strip_suffix("_ticks") {
                        instruments.push(symbol.to_string());
                    }
                }
            }
        }
        instruments.sort();
        Ok(instruments)
    }
}
