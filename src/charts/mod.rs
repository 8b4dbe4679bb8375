//! Chart module: one live, continuously updated candle series per
//! (symbol, timeframe, indicator-set) configuration

pub mod chart;
pub mod config;
pub mod stream;
pub mod types;

pub use chart::{Chart, ChartContext};
pub use config::{ChartConfig, ChartId};
pub use stream::ChartStream;
pub use types::{Candle, Direction, Timeframe};
