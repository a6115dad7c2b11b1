use chrono::{DateTime, NaiveDateTime, Utc};
use ladderflow_core::{DataError, TradeTick};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

/// Load recorded trades with their prevailing quote from a CSV file.
///
/// Expected columns (case-insensitive, flexible ordering):
/// `timestamp` (or `date`, `datetime`, `time`), `bid`, `ask`,
/// `last` (or `price`), `volume` (or `vol`, `size`).
///
/// Rows are returned in timestamp order; rows sharing a timestamp keep their
/// file order.
pub fn load_ticks_from_csv(path: &Path) -> Result<Vec<TradeTick>, DataError> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::ParseError(format!("Failed to open CSV: {}", e)))?;
    read_ticks(reader)
}

/// Same as [`load_ticks_from_csv`] over any reader.
pub fn load_ticks_from_reader<R: std::io::Read>(rdr: R) -> Result<Vec<TradeTick>, DataError> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(rdr);
    read_ticks(reader)
}

fn read_ticks<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Vec<TradeTick>, DataError> {
    let headers = reader
        .headers()
        .map_err(|e| DataError::ParseError(format!("Failed to read headers: {}", e)))?
        .clone();

    let cols = resolve_tick_columns(&headers)?;

    let mut ticks = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| DataError::ParseError(format!("CSV record error: {}", e)))?;
        let field = |idx: usize, name: &str| {
            record.get(idx).ok_or_else(|| {
                DataError::ParseError(format!("Row {}: missing {} field", row + 1, name))
            })
        };

        let timestamp = parse_timestamp(field(cols.timestamp, "timestamp")?)?;
        let bid = parse_decimal(field(cols.bid, "bid")?, "bid")?;
        let ask = parse_decimal(field(cols.ask, "ask")?, "ask")?;
        let price = parse_decimal(field(cols.last, "last")?, "last")?;
        let volume = match cols.volume {
            Some(idx) => parse_decimal(field(idx, "volume")?, "volume")?,
            None => Decimal::ONE,
        };

        ticks.push(TradeTick {
            timestamp,
            price,
            volume,
            bid,
            ask,
        });
    }

    // Stable sort keeps same-timestamp prints in arrival order
    ticks.sort_by_key(|t| t.timestamp);
    Ok(ticks)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct TickColumnMap {
    timestamp: usize,
    bid: usize,
    ask: usize,
    last: usize,
    volume: Option<usize>,
}

fn resolve_tick_columns(headers: &csv::StringRecord) -> Result<TickColumnMap, DataError> {
    let timestamp = find_column(headers, &["timestamp", "date", "datetime", "time"])
        .ok_or_else(|| DataError::ParseError("No timestamp column found".into()))?;
    let bid = find_column(headers, &["bid"])
        .ok_or_else(|| DataError::ParseError("No bid column found".into()))?;
    let ask = find_column(headers, &["ask"])
        .ok_or_else(|| DataError::ParseError("No ask column found".into()))?;
    let last = find_column(headers, &["last", "price"])
        .ok_or_else(|| DataError::ParseError("No last/price column found".into()))?;
    let volume = find_column(headers, &["volume", "vol", "size"]);

    Ok(TickColumnMap {
        timestamp,
        bid,
        ask,
        last,
        volume,
    })
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|header| {
        let h = header.trim().to_lowercase();
        names.iter().any(|name| h == *name)
    })
}

fn parse_decimal(s: &str, field: &str) -> Result<Decimal, DataError> {
    Decimal::from_str(s.trim())
        .or_else(|_| Decimal::from_scientific(s.trim()))
        .map_err(|e| DataError::ParseError(format!("Failed to parse {} '{}': {}", field, s, e)))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DataError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Without timezone, assume UTC
    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%Y%m%d %H%M%S",
        "%Y%m%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
        }
    }

    // Unix seconds, or milliseconds when the value is too large for seconds
    if let Ok(ts) = s.parse::<i64>() {
        let dt = if ts.abs() >= 100_000_000_000 {
            DateTime::from_timestamp_millis(ts)
        } else {
            DateTime::from_timestamp(ts, 0)
        };
        if let Some(dt) = dt {
            return Ok(dt);
        }
    }

    Err(DataError::ParseError(format!(
        "Unable to parse timestamp: '{}'",
        s
    )))
}
