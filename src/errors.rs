//! Structured error taxonomy for the trading engine
//!
//! Every failure surfaces as one of these variants so callers can decide
//! between skip (configuration), retry (exchange/stream) and report-only
//! (order logic). The engine itself never terminates the process.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// Bad advisor/sight/strategy/indicator configuration. Fatal to the
    /// advisor or chart that carries it, never to the process.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transient exchange failure (network, rate limit, rejection)
    #[error("Exchange error: {0}")]
    Exchange(String),

    /// Candle stream failure (disconnect, decode)
    #[error("Stream error: {0}")]
    Stream(String),

    /// Data integrity failure (missing candles, frozen feed)
    #[error("Data error: {0}")]
    Data(String),

    /// Order placement refused before reaching the exchange
    /// (symbol not trading, zero quantity, already closed)
    #[error("Order error: {0}")]
    Order(String),

    /// Indicator computation failure, tagged per indicator id
    #[error("Indicator {id}: {reason}")]
    Indicator { id: String, reason: String },

    /// Strategy evaluation failure, tagged with advisor→chart→strategy
    #[error("Strategy {who}: {reason}")]
    Strategy { who: String, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Prefix an error with caller context, keeping the variant
    pub fn context(self, who: &str) -> EngineError {
        match self {
            EngineError::Config(m) => EngineError::Config(format!("{}: {}", who, m)),
            EngineError::Exchange(m) => EngineError::Exchange(format!("{}: {}", who, m)),
            EngineError::Stream(m) => EngineError::Stream(format!("{}: {}", who, m)),
            EngineError::Data(m) => EngineError::Data(format!("{}: {}", who, m)),
            EngineError::Order(m) => EngineError::Order(format!("{}: {}", who, m)),
            other => other,
        }
    }
}
