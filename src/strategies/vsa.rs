/*
 * Volume Spread Analysis strategy
 * https://www.tradingsetupsreview.com/guide-volume-spread-analysis-vsa/
 */

use super::{Signal, Strategy, StrategyParams};
use crate::charts::types::Candle;
use crate::errors::EngineError;
use crate::indicators::IndicatorSpec;
use std::collections::BTreeMap;

pub struct Vsa;

impl Strategy for Vsa {
    fn id(&self) -> &'static str {
        "vsa"
    }

    fn params_indicators(
        &self,
        _params: &StrategyParams,
    ) -> Option<BTreeMap<String, IndicatorSpec>> {
        // works on raw candles only
        Some(BTreeMap::new())
    }

    fn analyze(
        &self,
        candles: &[Candle],
        _is_final: bool,
        _params: &StrategyParams,
    ) -> Result<Vec<Signal>, EngineError> {
        let mut signals = Vec::new();
        if candles.len() < 3 {
            return Ok(signals);
        }
        let (current, prev, older) = (&candles[0], &candles[1], &candles[2]);
        let range = current.high - current.low;
        if range <= 0.0 {
            return Ok(signals);
        }
        let volume_spike =
            current.volume > prev.volume && current.volume > older.volume;

        if current.close < prev.low && prev.close < older.low {
            // Price moving down on expanding volume with buyers rejecting the lows
            if volume_spike && (current.close - current.low) / range > 0.5 {
                signals.push(Signal::Long);
            }
        } else if current.close > prev.high && prev.close > older.high {
            // Price moving up on expanding volume with sellers rejecting the highs
            if volume_spike && (current.high - current.close) / range > 0.5 {
                signals.push(Signal::Short);
            }
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::types::{Direction, IndicatorValues};

    fn candle(high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            time: 0,
            open: (high + low) / 2.0,
            high,
            low,
            close,
            volume,
            close_time: 0,
            trades: 10,
            is_final: true,
            direction: Direction::Unset,
            indicators: IndicatorValues::new(),
        }
    }

    #[test]
    fn selling_climax_emits_long() {
        // down move, volume above both prior bars, close in the upper half
        let window = vec![
            candle(96.0, 90.0, 94.0, 300.0), // current: closes off the lows
            candle(100.0, 97.0, 98.0, 100.0),
            candle(104.0, 101.0, 102.0, 150.0),
        ];
        let signals = Vsa.analyze(&window, true, &StrategyParams::default()).unwrap();
        assert_eq!(signals, vec![Signal::Long]);
    }

    #[test]
    fn buying_climax_emits_short() {
        let window = vec![
            candle(110.0, 104.0, 105.0, 300.0), // current: closes off the highs
            candle(103.0, 100.0, 102.0, 100.0),
            candle(99.0, 96.0, 98.0, 150.0),
        ];
        let signals = Vsa.analyze(&window, true, &StrategyParams::default()).unwrap();
        assert_eq!(signals, vec![Signal::Short]);
    }

    #[test]
    fn quiet_volume_stays_silent() {
        let window = vec![
            candle(96.0, 90.0, 94.0, 120.0), // volume below the older bar
            candle(100.0, 97.0, 98.0, 100.0),
            candle(104.0, 101.0, 102.0, 150.0),
        ];
        let signals = Vsa.analyze(&window, true, &StrategyParams::default()).unwrap();
        assert!(signals.is_empty());
    }

    #[test]
    fn short_window_stays_silent() {
        let window = vec![candle(96.0, 90.0, 94.0, 300.0)];
        let signals = Vsa.analyze(&window, true, &StrategyParams::default()).unwrap();
        assert!(signals.is_empty());
    }
}
