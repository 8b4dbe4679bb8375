// Exchange data model shared by the provider interface and the engine

use crate::charts::types::Candle;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Exchange-imposed trading constraints for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter_type")]
pub enum SymbolFilter {
    #[serde(rename = "PRICE_FILTER")]
    PriceFilter { tick_size: f64 },
    #[serde(rename = "LOT_SIZE")]
    LotSize { step_size: f64, min_qty: f64 },
    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional { min_notional: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    pub status: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub filters: Vec<SymbolFilter>,
}

impl SymbolInfo {
    pub fn is_trading(&self) -> bool {
        self.status == "TRADING"
    }

    pub fn tick_size(&self) -> Option<f64> {
        self.filters.iter().find_map(|f| match f {
            SymbolFilter::PriceFilter { tick_size } => Some(*tick_size),
            _ => None,
        })
    }

    pub fn step_size(&self) -> Option<f64> {
        self.filters.iter().find_map(|f| match f {
            SymbolFilter::LotSize { step_size, .. } => Some(*step_size),
            _ => None,
        })
    }

    pub fn min_qty(&self) -> Option<f64> {
        self.filters.iter().find_map(|f| match f {
            SymbolFilter::LotSize { min_qty, .. } => Some(*min_qty),
            _ => None,
        })
    }

    pub fn min_notional(&self) -> Option<f64> {
        self.filters.iter().find_map(|f| match f {
            SymbolFilter::MinNotional { min_notional } => Some(*min_notional),
            _ => None,
        })
    }

    /// Decimal places used when displaying prices for this instrument,
    /// one digit finer than the tick size
    pub fn price_decimals(&self) -> usize {
        decimals(self.tick_size().unwrap_or(0.01)) + 1
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeInfo {
    pub symbols: Vec<SymbolInfo>,
}

impl ExchangeInfo {
    pub fn find(&self, symbol: &str) -> Option<&SymbolInfo> {
        self.symbols.iter().find(|s| s.symbol == symbol)
    }
}

/// One asset's balance as reported by the exchange
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AssetBalance {
    pub available: f64,
    pub on_order: f64,
}

pub type Balances = HashMap<String, AssetBalance>;
pub type Prices = HashMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub price: f64,
    pub qty: f64,
    pub commission: f64,
    pub commission_asset: String,
}

/// Result of a market order execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub fills: Vec<Fill>,
}

impl Order {
    pub fn filled(&self) -> bool {
        self.order_id != 0 && !self.fills.is_empty()
    }

    /// Arithmetic mean of fill prices (NOT quantity weighted; the engine's
    /// stop/target derivation is calibrated to this exact formula)
    pub fn mean_price(&self) -> f64 {
        if self.fills.is_empty() {
            return 0.0;
        }
        self.fills.iter().map(|f| f.price).sum::<f64>() / self.fills.len() as f64
    }

    pub fn total_qty(&self) -> f64 {
        self.fills.iter().map(|f| f.qty).sum()
    }

    /// Total quote value across fills
    pub fn total_spent(&self) -> f64 {
        self.fills.iter().map(|f| f.qty * f.price).sum()
    }
}

/// Event delivered by a provider candle stream: one historical backfill
/// batch first (oldest candle first), then live updates
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Backfill(Vec<Candle>),
    Update(Candle),
}

pub type CandleStream = mpsc::Receiver<StreamEvent>;
pub type CandleStreamSender = mpsc::Sender<StreamEvent>;

/// Floor a quantity to the instrument's lot step
pub fn round_step(quantity: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return quantity;
    }
    let steps = (quantity / step + 1e-9).floor();
    round_to_decimals(steps * step, decimals(step))
}

/// Round a price to the instrument's tick size
pub fn round_tick(price: f64, tick: f64) -> f64 {
    if tick <= 0.0 {
        return price;
    }
    let ticks = (price / tick).round();
    round_to_decimals(ticks * tick, decimals(tick))
}

/// Number of decimal places implied by a step/tick value (0.001 -> 3)
pub fn decimals(step: f64) -> usize {
    let mut decimals = 0usize;
    let mut value = step;
    while value.fract().abs() > 1e-9 && decimals < 12 {
        value *= 10.0;
        decimals += 1;
    }
    decimals
}

fn round_to_decimals(value: f64, decimals: usize) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Stable content hash over the canonical JSON form of a value; used for
/// chart identity and cheap symbol-info change detection
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    let digest = Sha256::digest(json.as_bytes());
    hex::encode(digest)
}
