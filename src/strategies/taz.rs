/*
 * Traders Action Zone strategy
 * http://www.swing-trade-stocks.com/traders-action-zone.html
 * (good for trending-up markets)
 */

use super::{require_indicator, Signal, Strategy, StrategyParams};
use crate::charts::types::Candle;
use crate::errors::EngineError;
use crate::indicators::IndicatorSpec;
use std::collections::BTreeMap;

pub struct Taz;

impl Strategy for Taz {
    fn id(&self) -> &'static str {
        "taz"
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
            "fast".to_string(),
            IndicatorSpec::new("ema", "close", &[("period", params.indicators[0])]),
        );
        indicators.insert(
            "slow".to_string(),
            IndicatorSpec::new("sma", "close", &[("period", params.indicators[1])]),
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
        let fast = require_indicator(&candles[0], "fast", "ema")?;
        let slow = require_indicator(&candles[0], "slow", "sma")?;
        let prev_fast = require_indicator(&candles[1], "fast", "ema")?;
        let prev_slow = require_indicator(&candles[1], "slow", "sma")?;

        if slow > fast {
            // Market is trending up
            if is_final
                && candles[0].close > fast
                && candles[0].close < slow // Price is in the zone
                && candles[1].close > prev_slow
            {
                signals.push(Signal::Long);
            }
        } else if prev_slow > prev_fast {
            // Market stopped trending up
            signals.push(Signal::CloseLong);
        }
        if slow < fast {
            // Market is trending down
            if is_final
                && candles[0].close < fast
                && candles[0].close > slow
                && candles[1].close < prev_slow
            {
                signals.push(Signal::Short);
            }
        } else if prev_slow < prev_fast {
            // Market stopped trending down
            signals.push(Signal::CloseShort);
        }
        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::types::{Direction, IndicatorValues};

    fn candle(close: f64, fast: f64, slow: f64) -> Candle {
        let mut indicators = IndicatorValues::new();
        indicators.insert(
            "fast".to_string(),
            [("ema".to_string(), Some(fast))].into_iter().collect(),
        );
        indicators.insert(
            "slow".to_string(),
            [("sma".to_string(), Some(slow))].into_iter().collect(),
        );
        Candle {
            time: 0,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
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
    fn declares_fast_and_slow_indicators() {
        let params = StrategyParams { indicators: vec![30.0, 10.0] };
        let specs = Taz.params_indicators(&params).unwrap();
        assert_eq!(specs["fast"].kind, "ema");
        assert_eq!(specs["slow"].kind, "sma");
        assert_eq!(specs["slow"].options["period"], 10.0);
    }

    #[test]
    fn wrong_param_count_is_invalid() {
        let params = StrategyParams { indicators: vec![30.0] };
        assert!(Taz.params_indicators(&params).is_none());
    }

    #[test]
    fn entering_the_zone_emits_long() {
        // uptrend (slow > fast), price dipped into the zone this bar
        let window = vec![
            candle(101.0, 100.0, 102.0),
            candle(103.5, 100.0, 103.0), // previous close above slow
        ];
        let signals = Taz.analyze(&window, true, &StrategyParams::default()).unwrap();
        assert_eq!(signals, vec![Signal::Long]);
    }

    #[test]
    fn trend_flip_closes_long() {
        // uptrend over (slow <= fast) after a bar where it still held
        let window = vec![
            candle(101.0, 103.0, 102.0),
            candle(102.0, 100.0, 103.0),
        ];
        let signals = Taz.analyze(&window, true, &StrategyParams::default()).unwrap();
        assert!(signals.contains(&Signal::CloseLong));
    }

    #[test]
    fn non_final_bar_never_opens() {
        let window = vec![
            candle(101.0, 100.0, 102.0),
            candle(103.5, 100.0, 103.0),
        ];
        let signals = Taz.analyze(&window, false, &StrategyParams::default()).unwrap();
        assert!(signals.is_empty());
    }

    #[test]
    fn missing_indicator_values_reject() {
        let mut bare = candle(101.0, 100.0, 102.0);
        bare.indicators.clear();
        let window = vec![bare.clone(), bare];
        assert!(Taz.analyze(&window, true, &StrategyParams::default()).is_err());
    }
}
