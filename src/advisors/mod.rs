//! Advisors: named risk profiles evaluating strategies over charts
//!
//! An advisor is validated once at load time. Each of its sights (symbol +
//! timeframe + strategies) becomes one ChartConfig whose indicator map is
//! the union of every strategy's declared indicators; the validation fails
//! fast with a "Sight #n" context so a broken advisor is skipped without
//! taking the process down.

use crate::charts::config::ChartId;
use crate::charts::types::{Candle, Timeframe};
use crate::charts::ChartConfig;
use crate::errors::EngineError;
use crate::indicators;
use crate::strategies::{self, Signal, StrategyConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One configured (symbol, timeframe, strategies) entry in an advisor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sight {
    pub symbol: String,
    pub timeframe: String,
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategyConfig>,
}

/// A validated advisor: display name, margin fraction and the charts it
/// watches. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Advisor {
    pub name: String,
    /// Fraction of the available balance committed per position, in (0, 1]
    pub margin: f64,
    pub chart_ids: Vec<ChartId>,
}

/// One strategy's output for one chart tick
#[derive(Debug, Clone)]
pub struct Advice {
    pub signals: Vec<Signal>,
    pub strategy_id: String,
    pub config: StrategyConfig,
}

impl Advisor {
    pub fn new(name: String, margin: f64, chart_ids: Vec<ChartId>) -> Self {
        Self {
            name,
            margin,
            chart_ids,
        }
    }

    /// Validate sights into chart configurations, merging each strategy's
    /// declared indicators. Fails fast on the first bad sight.
    pub fn get_chart_configs(sights: &[Sight]) -> Result<Vec<ChartConfig>, EngineError> {
        let mut configs = Vec::with_capacity(sights.len());
        for (index, sight) in sights.iter().enumerate() {
            configs.push(
                chart_config_for(sight)
                    .map_err(|e| e.context(&format!("Sight #{}", index + 1)))?,
            );
        }
        Ok(configs)
    }

    /// Run every configured strategy over the window, isolating failures
    /// per strategy. Results carry the strategy id for logging context.
    pub fn analyze(
        candles: &[Candle],
        configured: &BTreeMap<String, StrategyConfig>,
        is_final: bool,
        who: &str,
    ) -> Vec<Result<Option<Advice>, EngineError>> {
        configured
            .iter()
            .map(|(strategy_id, config)| {
                analyze_one(candles, strategy_id, config, is_final, who)
            })
            .collect()
    }
}

fn analyze_one(
    candles: &[Candle],
    strategy_id: &str,
    config: &StrategyConfig,
    is_final: bool,
    who: &str,
) -> Result<Option<Advice>, EngineError> {
    let display = strategies::display_name(strategy_id);
    let context = format!("{}->{}", who, display);
    let strategy = strategies::lookup(strategy_id).ok_or_else(|| EngineError::Strategy {
        who: context.clone(),
        reason: "Strategy doesn't exist".to_string(),
    })?;
    let mut signals = strategy
        .analyze(candles, is_final, &config.params)
        .map_err(|e| EngineError::Strategy {
            who: context,
            reason: e.to_string(),
        })?;
    if signals.is_empty() {
        return Ok(None);
    }
    signals.sort();
    signals.dedup();
    Ok(Some(Advice {
        signals,
        strategy_id: strategy_id.to_string(),
        config: config.clone(),
    }))
}

fn chart_config_for(sight: &Sight) -> Result<ChartConfig, EngineError> {
    if sight.symbol.is_empty() {
        return Err(EngineError::Config(
            "Symbol not configured properly".to_string(),
        ));
    }
    let timeframe = Timeframe::parse(&sight.timeframe).ok_or_else(|| {
        EngineError::Config("Timeframe not configured properly".to_string())
    })?;

    let mut indicators_merged: BTreeMap<String, indicators::IndicatorSpec> = BTreeMap::new();
    for (strategy_id, config) in &sight.strategies {
        let display = strategies::display_name(strategy_id);
        let strategy = strategies::lookup(strategy_id).ok_or_else(|| {
            EngineError::Config(format!("Strategy {} doesn't exist", display))
        })?;
        if !(config.trade.profit_target > 0.0)
            || !(config.trade.stop_loss > 0.0)
            || config.trade.stop_loss > 100.0
        {
            return Err(EngineError::Config(format!(
                "Strategy {} not configured properly",
                display
            )));
        }
        let declared = strategy.params_indicators(&config.params).ok_or_else(|| {
            EngineError::Config(format!(
                "Strategy {}: Indicators not configured properly",
                display
            ))
        })?;
        merge_indicators(&mut indicators_merged, declared, &display)?;
    }

    Ok(ChartConfig {
        symbol: sight.symbol.clone(),
        timeframe,
        strategies: sight.strategies.clone(),
        indicators: indicators_merged,
    })
}

/// Fold one strategy's declared indicators into the sight's merged map.
/// Identical specs under the same id collapse to one computation; a
/// differing spec under an already-claimed id is ambiguous and rejects.
fn merge_indicators(
    merged: &mut BTreeMap<String, indicators::IndicatorSpec>,
    declared: BTreeMap<String, indicators::IndicatorSpec>,
    display: &str,
) -> Result<(), EngineError> {
    for (indicator_id, spec) in declared {
        if !indicators::kind_exists(&spec.kind) {
            return Err(EngineError::Config(format!(
                "Strategy {}: Indicator {} doesn't exist",
                display, spec.kind
            )));
        }
        match merged.get(&indicator_id) {
            Some(existing) if *existing == spec => {}
            Some(_) => {
                return Err(EngineError::Config(format!(
                    "Parallel strategies sharing indicator ID {}",
                    indicator_id
                )));
            }
            None => {
                merged.insert(indicator_id, spec);
            }
        }
    }
    Ok(())
}
