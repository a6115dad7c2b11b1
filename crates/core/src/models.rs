use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// A single reported trade together with the quote prevailing when it printed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    pub timestamp: DateTime<Utc>,
    /// Trade (last) price.
    pub price: Decimal,
    pub volume: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
}

impl TradeTick {
    pub fn new(
        timestamp: DateTime<Utc>,
        price: Decimal,
        volume: Decimal,
        bid: Decimal,
        ask: Decimal,
    ) -> Self {
        Self {
            timestamp,
            price,
            volume,
            bid,
            ask,
        }
    }
}

/// Bar period used to bucket ticks into bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeframe {
    /// A fixed number of trades per bar.
    Tick(u32),
    Second(u32),
    Minute(u32),
    Hour(u32),
    Daily,
}

impl Timeframe {
    /// Bar length in seconds for time-based timeframes.
    pub fn seconds(&self) -> Option<i64> {
        match self {
            Timeframe::Tick(_) => None,
            Timeframe::Second(n) => Some(i64::from(*n)),
            Timeframe::Minute(n) => Some(i64::from(*n) * 60),
            Timeframe::Hour(n) => Some(i64::from(*n) * 3_600),
            Timeframe::Daily => Some(86_400),
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    /// Parses `1m`, `5s`, `1h`, `1d`, `500t`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "d" || s == "1d" || s == "daily" {
            return Ok(Timeframe::Daily);
        }
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("missing unit in timeframe '{}'", s))?;
        let (num, unit) = s.split_at(split);
        let n: u32 = num
            .parse()
            .map_err(|_| format!("invalid count in timeframe '{}'", s))?;
        if n == 0 {
            return Err(format!("timeframe '{}' must be greater than zero", s));
        }
        match unit {
            "t" | "tick" | "ticks" => Ok(Timeframe::Tick(n)),
            "s" | "sec" => Ok(Timeframe::Second(n)),
            "m" | "min" => Ok(Timeframe::Minute(n)),
            "h" | "hour" => Ok(Timeframe::Hour(n)),
            _ => Err(format!("unknown timeframe unit '{}'", unit)),
        }
    }
}

// ---------------------------------------------------------------------------
// Order flow
// ---------------------------------------------------------------------------

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

/// Whether the feed is replaying history or streaming live data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedMode {
    /// Historical replay. Bars may be opened ahead of time or out of order.
    Backfill,
    /// Real-time streaming. Bar indices only move forward.
    Live,
}

impl FeedMode {
    pub fn from_historical(is_historical: bool) -> Self {
        if is_historical {
            FeedMode::Backfill
        } else {
            FeedMode::Live
        }
    }
}
