//! Trade module: one open-to-closed position lifecycle per entry fill

pub mod stats;
pub mod trade;

pub use stats::{StatsSnapshot, TradeStats};
pub use trade::{
    resubscribe, CloseOutcome, CloseReason, Trade, TradeContext, TradeOrder, TradePnl,
    TradeRequest,
};
