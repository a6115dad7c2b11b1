use ladderflow_core::{Side, TradeTick};
use rust_decimal::Decimal;
use serde::Serialize;

/// Why a trade did not reach the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Printed strictly inside the spread, so the aggressor is unknown.
    InsideSpread,
    NegativeVolume,
    FractionalVolume,
    /// Volume too large to aggregate, or not a finite number.
    VolumeOutOfRange,
    /// Price or quote was NaN or infinite.
    NonFinitePrice,
}

/// Result of classifying one trade against the prevailing quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Aggressor identified. `price` is the quote the volume is attributed
    /// to, not the raw trade price.
    Classified { side: Side, price: Decimal, volume: u64 },
    Unclassified(DropReason),
}

impl Classification {
    pub fn side(&self) -> Option<Side> {
        match self {
            Classification::Classified { side, .. } => Some(*side),
            Classification::Unclassified(_) => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Classification::Classified { .. })
    }
}

/// Classify a trade with the bid/ask proximity rule.
///
/// A trade at or through the ask is buyer-initiated and attributed to the ask;
/// at or through the bid it is seller-initiated and attributed to the bid.
/// Anything printed strictly between the two is dropped. The ask comparison
/// runs first, so a crossed quote resolves to Buy.
pub fn classify(trade_price: Decimal, bid: Decimal, ask: Decimal, volume: Decimal) -> Classification {
    if volume < Decimal::ZERO {
        return Classification::Unclassified(DropReason::NegativeVolume);
    }
    if !volume.fract().is_zero() {
        return Classification::Unclassified(DropReason::FractionalVolume);
    }
    // Capped at i64::MAX so a single trade always fits a signed delta.
    let volume = match i64::try_from(volume) {
        Ok(v) => v.unsigned_abs(),
        Err(_) => return Classification::Unclassified(DropReason::VolumeOutOfRange),
    };

    if trade_price >= ask {
        Classification::Classified {
            side: Side::Buy,
            price: ask,
            volume,
        }
    } else if trade_price <= bid {
        Classification::Classified {
            side: Side::Sell,
            price: bid,
            volume,
        }
    } else {
        Classification::Unclassified(DropReason::InsideSpread)
    }
}

/// Classify a [`TradeTick`].
pub fn classify_tick(tick: &TradeTick) -> Classification {
    classify(tick.price, tick.bid, tick.ask, tick.volume)
}

/// Classify raw floating-point feed values. Non-finite values are rejected
/// before conversion.
pub fn classify_f64(trade_price: f64, bid: f64, ask: f64, volume: f64) -> Classification {
    if !trade_price.is_finite() || !bid.is_finite() || !ask.is_finite() {
        return Classification::Unclassified(DropReason::NonFinitePrice);
    }
    if !volume.is_finite() {
        return Classification::Unclassified(DropReason::VolumeOutOfRange);
    }
    let (Ok(price), Ok(bid), Ok(ask)) = (
        Decimal::try_from(trade_price),
        Decimal::try_from(bid),
        Decimal::try_from(ask),
    ) else {
        return Classification::Unclassified(DropReason::NonFinitePrice);
    };
    let Ok(volume) = Decimal::try_from(volume) else {
        return Classification::Unclassified(DropReason::VolumeOutOfRange);
    };
    classify(price, bid, ask, volume)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_buy_at_or_through_ask() {
        let at = classify(dec!(100.25), dec!(100.00), dec!(100.25), dec!(5));
        assert_eq!(
            at,
            Classification::Classified { side: Side::Buy, price: dec!(100.25), volume: 5 }
        );

        // Lifted through the ask: still attributed to the ask, not the trade price
        let through = classify(dec!(100.50), dec!(100.00), dec!(100.25), dec!(2));
        assert_eq!(
            through,
            Classification::Classified { side: Side::Buy, price: dec!(100.25), volume: 2 }
        );
    }

    #[test]
    fn test_sell_at_or_through_bid() {
        let at = classify(dec!(100.00), dec!(100.00), dec!(100.25), dec!(3));
        assert_eq!(
            at,
            Classification::Classified { side: Side::Sell, price: dec!(100.00), volume: 3 }
        );

        let through = classify(dec!(99.75), dec!(100.00), dec!(100.25), dec!(1));
        assert_eq!(through.side(), Some(Side::Sell));
        if let Classification::Classified { price, .. } = through {
            assert_eq!(price, dec!(100.00));
        }
    }

    #[test]
    fn test_inside_spread_dropped() {
        let c = classify(dec!(100.10), dec!(100.00), dec!(100.25), dec!(2));
        assert_eq!(c, Classification::Unclassified(DropReason::InsideSpread));
        assert!(!c.is_classified());
    }

    #[test]
    fn test_malformed_volume_rejected() {
        assert_eq!(
            classify(dec!(100.25), dec!(100.00), dec!(100.25), dec!(-1)),
            Classification::Unclassified(DropReason::NegativeVolume)
        );
        assert_eq!(
            classify(dec!(100.25), dec!(100.00), dec!(100.25), dec!(1.5)),
            Classification::Unclassified(DropReason::FractionalVolume)
        );
    }

    #[test]
    fn test_volume_beyond_i64_rejected() {
        let max = Decimal::from(i64::MAX);
        assert_eq!(
            classify(dec!(100.25), dec!(100.00), dec!(100.25), max),
            Classification::Classified { side: Side::Buy, price: dec!(100.25), volume: i64::MAX as u64 }
        );
        assert_eq!(
            classify(dec!(100.25), dec!(100.00), dec!(100.25), max + Decimal::ONE),
            Classification::Unclassified(DropReason::VolumeOutOfRange)
        );
        assert_eq!(
            classify_f64(100.25, 100.0, 100.25, f64::INFINITY),
            Classification::Unclassified(DropReason::VolumeOutOfRange)
        );
        assert_eq!(
            classify_f64(100.25, 100.0, 100.25, 1e30),
            Classification::Unclassified(DropReason::VolumeOutOfRange)
        );
    }

    #[test]
    fn test_crossed_quote_prefers_buy() {
        let c = classify(dec!(100.00), dec!(100.25), dec!(100.00), dec!(1));
        assert_eq!(c.side(), Some(Side::Buy));
    }

    #[test]
    fn test_f64_non_finite_rejected() {
        assert_eq!(
            classify_f64(f64::NAN, 100.0, 100.25, 1.0),
            Classification::Unclassified(DropReason::NonFinitePrice)
        );
        assert_eq!(
            classify_f64(100.25, 100.0, f64::INFINITY, 1.0),
            Classification::Unclassified(DropReason::NonFinitePrice)
        );
        assert_eq!(classify_f64(100.25, 100.0, 100.25, 4.0).side(), Some(Side::Buy));
    }
}
