/*
 * Bollinger Bands strategy
 * (good for lateral non-trending markets)
 */

use super::{require_indicator, Signal, Strategy, StrategyParams};
use crate::charts::types::Candle;
use crate::errors::EngineError;
use crate::indicators::IndicatorSpec;
use std::collections::BTreeMap;

pub struct Bands;

impl Strategy for Bands {
    fn id(&self) -> &'static str {
        "bands"
    }

    fn params_indicators(
        &self,
        params: &StrategyParams,
    ) -> Option<BTreeMap<String, IndicatorSpec>> {
        if params.indicators.len() != 2 {
            return None;
        }
        let mut indicators = BTreeMap::new();
        indicators.insert(
            "bands".to_string(),
            IndicatorSpec::new(
                "bbands",
                "close",
                &[
                    ("period", params.indicators[0]),
                    ("stddev", params.indicators[1]),
                ],
            ),
        );
        Some(indicators)
    }

    fn analyze(
        &self,
        candles: &[Candle],
        is_final: bool,
        _params: &StrategyParams,
    ) -> Result<Vec<Signal>, EngineError> {
        let mut signals = Vec::new();
        if candles.len() < 2 {
            return Ok(signals);
        }
        let lower = require_indicator(&candles[0], "bands", "bbands_lower")?;
        let upper = require_indicator(&candles[0], "bands", "bbands_upper")?;
        let prev_lower = require_indicator(&candles[1], "bands", "bbands_lower")?;
        let prev_upper = require_indicator(&candles[1], "bands", "bbands_upper")?;

        if candles[0].close < lower && candles[1].close > prev_lower {
            // Price pierced the lower band this bar
            signals.push(Signal::CloseShort);
            if is_final {
                signals.push(Signal::Long);
            }
        } else if candles[0].close > upper && candles[1].close < prev_upper {
            // Price pierced the upper band this bar
            signals.push(Signal::CloseLong);
            if is_final {
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

    fn candle(close: f64, lower: f64, upper: f64) -> Candle {
        let mut indicators = IndicatorValues::new();
        indicators.insert(
            "bands".to_string(),
            [
                ("bbands_lower".to_string(), Some(lower)),
                ("bbands_middle".to_string(), Some((lower + upper) / 2.0)),
                ("bbands_upper".to_string(), Some(upper)),
            ]
            .into_iter()
            .collect(),
        );
        Candle {
            time: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            close_time: 0,
            trades: 1,
            is_final: true,
            direction: Direction::Unset,
            indicators,
        }
    }

    #[test]
    fn piercing_the_lower_band_goes_long() {
        let window = vec![
            candle(97.0, 98.0, 104.0), // close below the lower band
            candle(99.0, 98.0, 104.0), // previous close inside
        ];
        let signals = Bands.analyze(&window, true, &StrategyParams::default()).unwrap();
        assert_eq!(signals, vec![Signal::CloseShort, Signal::Long]);
    }

    #[test]
    fn piercing_the_upper_band_goes_short() {
        let window = vec![
            candle(105.0, 98.0, 104.0),
            candle(103.0, 98.0, 104.0),
        ];
        let signals = Bands.analyze(&window, true, &StrategyParams::default()).unwrap();
        assert_eq!(signals, vec![Signal::CloseLong, Signal::Short]);
    }

    #[test]
    fn forming_bar_only_closes() {
        let window = vec![
            candle(97.0, 98.0, 104.0),
            candle(99.0, 98.0, 104.0),
        ];
        let signals = Bands.analyze(&window, false, &StrategyParams::default()).unwrap();
        assert_eq!(signals, vec![Signal::CloseShort]);
    }
}
