// Chart configuration and identity

use crate::charts::types::Timeframe;
use crate::indicators::IndicatorSpec;
use crate::provider::types::content_hash;
use crate::strategies::StrategyConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Chart identity: content hash of the merged configuration. Two advisors
/// requesting identical content share one live chart.
pub type ChartId = String;

/// One (symbol, timeframe) chart request with the strategies watching it
/// and the union of the indicators those strategies declared.
///
/// Maps are BTreeMaps so the canonical JSON form, and therefore the chart
/// id, is stable regardless of configuration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    #[serde(default)]
    pub strategies: BTreeMap<String, StrategyConfig>,
    #[serde(default)]
    pub indicators: BTreeMap<String, IndicatorSpec>,
}

impl ChartConfig {
    pub fn id(&self) -> ChartId {
        content_hash(self)
    }

    /// Short human handle: "BTCUSDT 5m [1fa93bc2]"
    pub fn display_name(&self) -> String {
        let id = self.id();
        format!("{} {} [{}]", self.symbol, self.timeframe, &id[..8.min(id.len())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(symbol: &str) -> ChartConfig {
        ChartConfig {
            symbol: symbol.to_string(),
            timeframe: Timeframe::Minute5,
            strategies: BTreeMap::new(),
            indicators: BTreeMap::new(),
        }
    }

    #[test]
    fn identical_content_shares_identity() {
        assert_eq!(config("BTCUSDT").id(), config("BTCUSDT").id());
        assert_ne!(config("BTCUSDT").id(), config("ETHUSDT").id());
    }

    #[test]
    fn indicator_specs_change_identity() {
        let plain = config("BTCUSDT");
        let mut with_ema = config("BTCUSDT");
        with_ema.indicators.insert(
            "fast".to_string(),
            IndicatorSpec::new("ema", "close", &[("period", 30.0)]),
        );
        assert_ne!(plain.id(), with_ema.id());
    }

    #[test]
    fn display_name_carries_the_short_id() {
        let name = config("BTCUSDT").display_name();
        assert!(name.starts_with("BTCUSDT 5m ["));
    }
}
