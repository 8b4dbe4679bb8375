//! Runtime configuration loaded from a JSON file
//!
//! The file names the provider, the advisors (margin + sights) and a few
//! engine tunables. Anything structural (unknown provider or strategy ids,
//! bad margins) is rejected at load time so the bot never starts half
//! configured.

use crate::advisors::Sight;
use crate::constants::MAX_CANDLES;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider id resolved against the provider registry
    pub provider: String,
    #[serde(default)]
    pub keys: ProviderKeys,
    /// Advisor id -> configuration; ids double as display names
    #[serde(default)]
    pub advisors: BTreeMap<String, AdvisorConfig>,
    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderKeys {
    #[serde(default)]
    pub api: String,
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisorConfig {
    /// Percentage of the available asset balance committed per position,
    /// in (0, 100]
    pub margin: f64,
    pub sights: Vec<Sight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Rolling candle buffer size per chart
    pub max_candles: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_candles: MAX_CANDLES,
        }
    }
}

/// Read and parse the configuration file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("Reading config {}", path.display()))?;
    let config: Config = serde_json::from_str(&data)
        .with_context(|| format!("Parsing config {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let raw = r#"{
            "provider": "binance",
            "keys": { "api": "k", "secret": "s" },
            "advisors": {
                "example": {
                    "margin": 10,
                    "sights": [
                        {
                            "symbol": "BTCUSDT",
                            "timeframe": "5m",
                            "strategies": {
                                "vsa": {
                                    "trade": { "profit_target": 2, "stop_loss": 1 }
                                }
                            }
                        }
                    ]
                }
            }
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.provider, "binance");
        assert_eq!(config.engine.max_candles, MAX_CANDLES);
        let advisor = &config.advisors["example"];
        assert_eq!(advisor.margin, 10.0);
        assert_eq!(advisor.sights[0].symbol, "BTCUSDT");
        assert!(advisor.sights[0].strategies.contains_key("vsa"));
    }

    #[test]
    fn missing_sections_default() {
        let config: Config = serde_json::from_str(r#"{ "provider": "binance" }"#).unwrap();
        assert!(config.advisors.is_empty());
        assert!(config.keys.api.is_empty());
    }
}
