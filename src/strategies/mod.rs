//! Strategy plugin interface and registry
//!
//! Strategies are pure analysis functions over a candle window. They are
//! resolved from a compile-time registry by id; there is no dynamic
//! loading. A strategy declares the indicators it needs through
//! `params_indicators` and emits zero or more signals from `analyze`.
//!
//! The candle window handed to `analyze` is newest-first: `candles[0]` is
//! the current bar, `candles[1]` the one before it.

mod bands;
mod taz;
mod vsa;

use crate::charts::types::Candle;
use crate::errors::EngineError;
use crate::indicators::IndicatorSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use bands::Bands;
pub use taz::Taz;
pub use vsa::Vsa;

/// Signal tokens a strategy can emit
///
/// Variant order matches the lexicographic order of the wire names so the
/// sorted signal list is stable ("CLOSE LONG" < "CLOSE SHORT" < "LONG" <
/// "SHORT"); close signals are therefore always processed before opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "CLOSE LONG")]
    CloseLong,
    #[serde(rename = "CLOSE SHORT")]
    CloseShort,
    #[serde(rename = "LONG")]
    Long,
    #[serde(rename = "SHORT")]
    Short,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Signal::CloseLong => write!(f, "CLOSE LONG"),
            Signal::CloseShort => write!(f, "CLOSE SHORT"),
            Signal::Long => write!(f, "LONG"),
            Signal::Short => write!(f, "SHORT"),
        }
    }
}

/// Free-form numeric parameters handed to a strategy from the advisor
/// configuration; `indicators` parameterizes the declared indicator specs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    #[serde(default)]
    pub indicators: Vec<f64>,
}

/// Trade sizing/exit settings attached to one strategy inside a sight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeConfig {
    /// Profit target as a percentage of spent funds (> 0)
    pub profit_target: f64,
    /// Stop loss as a percentage of spent funds (0 < v <= 100)
    pub stop_loss: f64,
    /// Optional position lifetime in milliseconds, measured from entry
    #[serde(default)]
    pub time_to_live: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub trade: TradeConfig,
    #[serde(default)]
    pub params: StrategyParams,
}

pub trait Strategy: Send + Sync {
    /// Registry id, also used in configuration files
    fn id(&self) -> &'static str;

    /// Indicators this strategy needs, parameterized by the configured
    /// params. `None` signals an invalid configuration and the caller must
    /// reject the sight.
    fn params_indicators(
        &self,
        params: &StrategyParams,
    ) -> Option<BTreeMap<String, IndicatorSpec>>;

    /// Evaluate the window and return raw signals (duplicates allowed;
    /// the advisor dedups and sorts)
    fn analyze(
        &self,
        candles: &[Candle],
        is_final: bool,
        params: &StrategyParams,
    ) -> Result<Vec<Signal>, EngineError>;
}

static REGISTRY: &[&dyn Strategy] = &[&Bands, &Taz, &Vsa];

/// Resolve a strategy implementation by id
pub fn lookup(id: &str) -> Option<&'static dyn Strategy> {
    REGISTRY.iter().find(|s| s.id() == id).copied()
}

/// Display name for log messages ("vsa" -> "Vsa")
pub fn display_name(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Pull an indicator output off a candle, rejecting with the strategy's
/// context when the value is absent (misconfigured or still warming up)
pub(crate) fn require_indicator(
    candle: &Candle,
    id: &str,
    output: &str,
) -> Result<f64, EngineError> {
    candle.indicator(id, output).ok_or_else(|| EngineError::Data(format!(
        "Indicator value {}.{} not available",
        id, output
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_known_ids() {
        assert!(lookup("vsa").is_some());
        assert!(lookup("taz").is_some());
        assert!(lookup("bands").is_some());
        assert!(lookup("hodl").is_none());
    }

    #[test]
    fn signal_sort_order_matches_wire_names() {
        let mut signals = vec![Signal::Short, Signal::Long, Signal::CloseShort, Signal::CloseLong];
        signals.sort();
        assert_eq!(
            signals,
            vec![Signal::CloseLong, Signal::CloseShort, Signal::Long, Signal::Short]
        );
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name("vsa"), "Vsa");
        assert_eq!(display_name("BANDS"), "Bands");
    }
}
