//! Funds snapshot and dollar valuation
//!
//! Balances come from the provider; dollar values are derived through the
//! price map: USDT counts 1:1, BTC through BTCUSDT, and every other asset
//! through its `<ASSET>BTC` pair times BTCUSDT. Assets with no position
//! and no open orders are dropped from the snapshot.

use crate::provider::types::{Balances, Prices};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AssetFunds {
    pub available: f64,
    pub on_order: f64,
    pub dollars: f64,
}

pub type FundsSnapshot = BTreeMap<String, AssetFunds>;

/// Build the funds snapshot from raw balances and the current price map.
/// Assets without a dollar route (no `<ASSET>BTC` pair) are omitted, the
/// way the exchange UI hides dust in delisted pairs.
pub fn calculate_funds(balances: &Balances, prices: &Prices) -> FundsSnapshot {
    let btc_usdt = prices.get("BTCUSDT").copied().unwrap_or(0.0);
    let mut funds = FundsSnapshot::new();
    for (asset, balance) in balances {
        if balance.available <= 0.0 && balance.on_order <= 0.0 {
            continue;
        }
        let dollars = match asset.as_str() {
            "USDT" => Some(balance.available),
            "BTC" => Some(balance.available * btc_usdt),
            _ => prices
                .get(&format!("{}BTC", asset))
                .map(|pair| balance.available * pair * btc_usdt),
        };
        if let Some(dollars) = dollars {
            funds.insert(
                asset.clone(),
                AssetFunds {
                    available: balance.available,
                    on_order: balance.on_order,
                    dollars,
                },
            );
        }
    }
    funds
}

/// Dollar value of an arbitrary amount of an asset, if a route exists
pub fn dollar_value(asset: &str, amount: f64, prices: &Prices) -> Option<f64> {
    let btc_usdt = prices.get("BTCUSDT").copied().unwrap_or(0.0);
    match asset {
        "USDT" => Some(amount),
        "BTC" => Some(amount * btc_usdt),
        _ => prices
            .get(&format!("{}BTC", asset))
            .map(|pair| amount * pair * btc_usdt),
    }
}

/// Total estimated account value in dollars
pub fn estimated_value(funds: &FundsSnapshot) -> f64 {
    funds.values().map(|f| f.dollars).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::AssetBalance;

    fn balances() -> Balances {
        [
            ("USDT", 1000.0, 0.0),
            ("BTC", 0.5, 0.1),
            ("ETH", 2.0, 0.0),
            ("DUST", 0.0, 0.0),
        ]
        .into_iter()
        .map(|(asset, available, on_order)| {
            (
                asset.to_string(),
                AssetBalance {
                    available,
                    on_order,
                },
            )
        })
        .collect()
    }

    fn prices() -> Prices {
        [("BTCUSDT", 50_000.0), ("ETHBTC", 0.05)]
            .into_iter()
            .map(|(s, p)| (s.to_string(), p))
            .collect()
    }

    #[test]
    fn dollar_routes() {
        let funds = calculate_funds(&balances(), &prices());
        assert_eq!(funds["USDT"].dollars, 1000.0);
        assert_eq!(funds["BTC"].dollars, 25_000.0);
        assert_eq!(funds["ETH"].dollars, 2.0 * 0.05 * 50_000.0);
    }

    #[test]
    fn zero_balances_are_dropped() {
        let funds = calculate_funds(&balances(), &prices());
        assert!(!funds.contains_key("DUST"));
    }

    #[test]
    fn unroutable_assets_are_omitted() {
        let mut raw = balances();
        raw.insert(
            "XYZ".to_string(),
            AssetBalance {
                available: 10.0,
                on_order: 0.0,
            },
        );
        let funds = calculate_funds(&raw, &prices());
        assert!(!funds.contains_key("XYZ"));
    }

    #[test]
    fn estimated_value_sums_dollars() {
        let funds = calculate_funds(&balances(), &prices());
        let expected = 1000.0 + 25_000.0 + 2.0 * 0.05 * 50_000.0;
        assert!((estimated_value(&funds) - expected).abs() < 1e-9);
    }

    #[test]
    fn dollar_value_for_arbitrary_amounts() {
        let prices = prices();
        assert_eq!(dollar_value("USDT", 5.0, &prices), Some(5.0));
        assert_eq!(dollar_value("BTC", 0.1, &prices), Some(5000.0));
        assert_eq!(dollar_value("XYZ", 1.0, &prices), None);
    }
}
