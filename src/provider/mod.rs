//! Exchange provider interface
//!
//! The engine consumes exchanges exclusively through this trait: metadata,
//! balances, quotes, market orders and one live candle stream per chart
//! configuration. Implementations are resolved from a registry by id at
//! startup; the engine core never names a concrete exchange.

pub mod binance;
#[cfg(test)]
pub mod mock;
pub mod rate_limiter;
pub mod types;

use crate::charts::config::ChartConfig;
use crate::config::ProviderKeys;
use crate::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use std::sync::Arc;
use types::{Balances, CandleStream, ExchangeInfo, Order, Prices, SymbolInfo};

#[async_trait]
pub trait Provider: Send + Sync {
    async fn retrieve_exchange_info(&self) -> EngineResult<ExchangeInfo>;

    async fn retrieve_balance(&self) -> EngineResult<Balances>;

    async fn retrieve_prices(&self) -> EngineResult<Prices>;

    /// Current price for one pair symbol
    async fn get_quote(&self, symbol: &str) -> EngineResult<f64>;

    /// Open a candle stream: one backfill batch of up to 500 final candles
    /// (oldest first), then live updates. Independent calls for different
    /// configs must not interfere.
    async fn retrieve_stream(
        &self,
        config: &ChartConfig,
        tick_size: f64,
    ) -> EngineResult<CandleStream>;

    async fn buy(&self, quantity: f64, info: &SymbolInfo) -> EngineResult<Order>;

    async fn sell(&self, quantity: f64, info: &SymbolInfo) -> EngineResult<Order>;

    /// Cheap connectivity probe used by the chart watchdog; defaults to
    /// always-online for providers without a ping endpoint
    async fn ping(&self) -> bool {
        true
    }

    /// Apply the exchange's lot and notional rules to a raw amount.
    /// For buys the amount arrives in the quote asset and is converted
    /// through a fresh quote, then bumped to the minimum quantity and
    /// notional; the result is always floored to the lot step.
    async fn clamp_quantity(
        &self,
        amount: f64,
        info: &SymbolInfo,
        is_buy: bool,
    ) -> EngineResult<f64> {
        let mut quantity = amount;
        if is_buy {
            let quote = self.get_quote(&info.symbol).await?;
            if quote <= 0.0 {
                return Err(EngineError::Exchange(format!(
                    "No quote for {}",
                    info.symbol
                )));
            }
            quantity /= quote;
            if let Some(min_qty) = info.min_qty() {
                if quantity < min_qty {
                    quantity = min_qty;
                }
            }
            if let Some(min_notional) = info.min_notional() {
                if quantity * quote < min_notional {
                    quantity = min_notional / quote;
                }
            }
        }
        Ok(types::round_step(
            quantity,
            info.step_size().unwrap_or(0.0),
        ))
    }
}

/// Resolve a provider implementation by its configured id
pub fn create(id: &str, keys: &ProviderKeys) -> EngineResult<Arc<dyn Provider>> {
    match id {
        "binance" => Ok(Arc::new(binance::BinanceProvider::new(
            keys.api.clone(),
            keys.secret.clone(),
        ))),
        other => Err(EngineError::Config(format!(
            "Provider {} doesn't exist",
            other
        ))),
    }
}
