// Core types for the chart module

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Supported candle timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "3m")]
    Minute3,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "2h")]
    Hour2,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "6h")]
    Hour6,
    #[serde(rename = "12h")]
    Hour12,
    #[serde(rename = "1d")]
    Day1,
}

impl Timeframe {
    /// Nominal duration of one candle in milliseconds
    pub fn to_millis(&self) -> i64 {
        match self {
            Timeframe::Minute1 => 60_000,
            Timeframe::Minute3 => 180_000,
            Timeframe::Minute5 => 300_000,
            Timeframe::Minute15 => 900_000,
            Timeframe::Minute30 => 1_800_000,
            Timeframe::Hour1 => 3_600_000,
            Timeframe::Hour2 => 7_200_000,
            Timeframe::Hour4 => 14_400_000,
            Timeframe::Hour6 => 21_600_000,
            Timeframe::Hour12 => 43_200_000,
            Timeframe::Day1 => 86_400_000,
        }
    }

    /// Parse from the exchange interval notation ("5m", "1h", ...)
    pub fn parse(s: &str) -> Option<Timeframe> {
        match s {
            "1m" => Some(Timeframe::Minute1),
            "3m" => Some(Timeframe::Minute3),
            "5m" => Some(Timeframe::Minute5),
            "15m" => Some(Timeframe::Minute15),
            "30m" => Some(Timeframe::Minute30),
            "1h" => Some(Timeframe::Hour1),
            "2h" => Some(Timeframe::Hour2),
            "4h" => Some(Timeframe::Hour4),
            "6h" => Some(Timeframe::Hour6),
            "12h" => Some(Timeframe::Hour12),
            "1d" => Some(Timeframe::Day1),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute3 => "3m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Minute30 => "30m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour2 => "2h",
            Timeframe::Hour4 => "4h",
            Timeframe::Hour6 => "6h",
            Timeframe::Hour12 => "12h",
            Timeframe::Day1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Modification direction of the currently-forming candle relative to the
/// previous candle's close; reset when a new candle starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "u")]
    Up,
    #[serde(rename = "d")]
    Down,
    #[serde(rename = "o")]
    Flat,
    #[default]
    #[serde(rename = "-")]
    Unset,
}

/// Computed indicator values attached to a candle:
/// indicator id -> output name -> value (None while warming up)
pub type IndicatorValues = BTreeMap<String, BTreeMap<String, Option<f64>>>;

/// A single OHLCV candle
///
/// `is_final` marks a closed bar; a non-final candle is the currently
/// forming bar and is replaced in place until it finalizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub trades: u64,
    pub is_final: bool,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub indicators: IndicatorValues,
}

impl Candle {
    /// Validates that the OHLCV data is consistent
    pub fn is_valid(&self) -> bool {
        self.high >= self.low
            && self.open >= self.low
            && self.open <= self.high
            && self.close >= self.low
            && self.close <= self.high
            && self.volume >= 0.0
    }

    /// Resolve a named input series field ("open", "close", ...)
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "open" => Some(self.open),
            "high" => Some(self.high),
            "low" => Some(self.low),
            "close" => Some(self.close),
            "volume" => Some(self.volume),
            _ => None,
        }
    }

    /// Indicator output lookup, e.g. `indicator("fast", "ema")`
    pub fn indicator(&self, id: &str, output: &str) -> Option<f64> {
        self.indicators.get(id).and_then(|o| o.get(output)).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            time: 0,
            open,
            high,
            low,
            close,
            volume: 1.0,
            close_time: 0,
            trades: 1,
            is_final: true,
            direction: Direction::Unset,
            indicators: IndicatorValues::new(),
        }
    }

    #[test]
    fn timeframe_roundtrip() {
        for s in ["1m", "5m", "15m", "1h", "4h", "1d"] {
            let tf = Timeframe::parse(s).unwrap();
            assert_eq!(tf.as_str(), s);
        }
        assert!(Timeframe::parse("7m").is_none());
    }

    #[test]
    fn timeframe_duration() {
        assert_eq!(Timeframe::Minute5.to_millis(), 5 * 60 * 1000);
        assert_eq!(Timeframe::Day1.to_millis(), 24 * 60 * 60 * 1000);
    }

    #[test]
    fn candle_validity() {
        assert!(candle(10.0, 12.0, 9.0, 11.0).is_valid());
        assert!(!candle(10.0, 9.0, 12.0, 11.0).is_valid());
    }

    #[test]
    fn field_lookup() {
        let c = candle(1.0, 4.0, 0.5, 2.0);
        assert_eq!(c.field("close"), Some(2.0));
        assert_eq!(c.field("range"), None);
    }
}
