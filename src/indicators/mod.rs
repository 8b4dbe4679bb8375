//! Indicator adapter
//!
//! Maps a generic indicator declaration (kind + named inputs + numeric
//! options) onto the `ta` crate and attaches the computed output series to
//! each candle in a buffer. The math itself is a black box; this module
//! only resolves inputs, drives the streaming computation and aligns the
//! outputs, masking values that fall inside the indicator's warm-up window.
//!
//! Output names follow the conventional per-kind naming so strategies can
//! address them directly: `ema`, `sma`, `rsi`, and `bbands_lower` /
//! `bbands_middle` / `bbands_upper`.

use crate::charts::types::{Candle, IndicatorValues};
use crate::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ta::indicators::{
    BollingerBands, ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::Next;

/// Declaration of one indicator over a candle series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    /// Indicator kind: "sma", "ema", "rsi" or "bbands"
    #[serde(rename = "type")]
    pub kind: String,
    /// Input name -> candle field ("real" -> "close", ...)
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
    /// Option name -> numeric value ("period", "stddev", ...)
    #[serde(default)]
    pub options: BTreeMap<String, f64>,
}

impl IndicatorSpec {
    pub fn new(kind: &str, input: &str, options: &[(&str, f64)]) -> Self {
        let mut inputs = BTreeMap::new();
        inputs.insert("real".to_string(), input.to_string());
        Self {
            kind: kind.to_string(),
            inputs,
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    fn option(&self, name: &str, id: &str) -> Result<f64, EngineError> {
        self.options.get(name).copied().ok_or_else(|| EngineError::Indicator {
            id: id.to_string(),
            reason: format!("Missing option '{}'", name),
        })
    }

    fn period(&self, id: &str) -> Result<usize, EngineError> {
        let period = self.option("period", id)?;
        if period < 1.0 || period.fract() != 0.0 {
            return Err(EngineError::Indicator {
                id: id.to_string(),
                reason: format!("Bad period {}", period),
            });
        }
        Ok(period as usize)
    }
}

/// Check that an indicator kind is known, without computing anything.
/// Used by advisor validation at load time.
pub fn kind_exists(kind: &str) -> bool {
    matches!(kind, "sma" | "ema" | "rsi" | "bbands")
}

/// Compute all configured indicators over the buffer (oldest first) and
/// attach the aligned outputs to every candle. Failures reject per
/// indicator id; on error the buffer's existing values are left untouched.
pub fn with_indicators(
    candles: &mut [Candle],
    specs: &BTreeMap<String, IndicatorSpec>,
) -> Result<(), EngineError> {
    if candles.is_empty() || specs.is_empty() {
        return Ok(());
    }

    // indicator id -> output name -> full series
    let mut computed: BTreeMap<String, BTreeMap<String, Vec<Option<f64>>>> = BTreeMap::new();
    for (id, spec) in specs {
        let inputs = resolve_inputs(candles, spec, id)?;
        computed.insert(id.clone(), compute(spec, &inputs, id)?);
    }

    for (index, candle) in candles.iter_mut().enumerate() {
        let mut values = IndicatorValues::new();
        for (id, outputs) in &computed {
            let per_candle: BTreeMap<String, Option<f64>> = outputs
                .iter()
                .map(|(name, series)| (name.clone(), series[index]))
                .collect();
            values.insert(id.clone(), per_candle);
        }
        candle.indicators = values;
    }
    Ok(())
}

/// Resolve the indicator's single input series against the candle fields
fn resolve_inputs(
    candles: &[Candle],
    spec: &IndicatorSpec,
    id: &str,
) -> Result<Vec<f64>, EngineError> {
    let field = spec
        .inputs
        .get("real")
        .map(String::as_str)
        .unwrap_or("close");
    candles
        .iter()
        .map(|c| {
            c.field(field).ok_or_else(|| EngineError::Indicator {
                id: id.to_string(),
                reason: format!("Unknown input field '{}'", field),
            })
        })
        .collect()
}

fn compute(
    spec: &IndicatorSpec,
    inputs: &[f64],
    id: &str,
) -> Result<BTreeMap<String, Vec<Option<f64>>>, EngineError> {
    let mut outputs = BTreeMap::new();
    match spec.kind.as_str() {
        "sma" => {
            let period = spec.period(id)?;
            let mut sma = SimpleMovingAverage::new(period).map_err(|e| bad(id, &e))?;
            outputs.insert(
                "sma".to_string(),
                masked(inputs.iter().map(|v| sma.next(*v)).collect(), period - 1),
            );
        }
        "ema" => {
            let period = spec.period(id)?;
            let mut ema = ExponentialMovingAverage::new(period).map_err(|e| bad(id, &e))?;
            outputs.insert(
                "ema".to_string(),
                masked(inputs.iter().map(|v| ema.next(*v)).collect(), period - 1),
            );
        }
        "rsi" => {
            let period = spec.period(id)?;
            let mut rsi = RelativeStrengthIndex::new(period).map_err(|e| bad(id, &e))?;
            // RSI needs period + 1 values before it stabilizes
            outputs.insert(
                "rsi".to_string(),
                masked(inputs.iter().map(|v| rsi.next(*v)).collect(), period),
            );
        }
        "bbands" => {
            let period = spec.period(id)?;
            let stddev = spec.option("stddev", id)?;
            let mut bands =
                BollingerBands::new(period, stddev).map_err(|e| bad(id, &e))?;
            let mut lower = Vec::with_capacity(inputs.len());
            let mut middle = Vec::with_capacity(inputs.len());
            let mut upper = Vec::with_capacity(inputs.len());
            for v in inputs {
                let out = bands.next(*v);
                lower.push(out.lower);
                middle.push(out.average);
                upper.push(out.upper);
            }
            outputs.insert("bbands_lower".to_string(), masked(lower, period - 1));
            outputs.insert("bbands_middle".to_string(), masked(middle, period - 1));
            outputs.insert("bbands_upper".to_string(), masked(upper, period - 1));
        }
        other => {
            return Err(EngineError::Indicator {
                id: id.to_string(),
                reason: format!("Indicator type '{}' doesn't exist", other),
            });
        }
    }
    Ok(outputs)
}

fn bad(id: &str, err: &dyn std::fmt::Display) -> EngineError {
    EngineError::Indicator {
        id: id.to_string(),
        reason: err.to_string(),
    }
}

/// Hide values produced inside the warm-up window
fn masked(series: Vec<f64>, warmup: usize) -> Vec<Option<f64>> {
    series
        .into_iter()
        .enumerate()
        .map(|(i, v)| if i < warmup { None } else { Some(v) })
        .collect()
}
