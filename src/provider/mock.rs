//! Scripted provider test double
//!
//! Orders and streams can be pre-loaded per test; unscripted orders fill
//! at the current mock price so happy paths need no setup. All state is
//! behind std sync primitives because nothing here awaits while locked.

use crate::charts::config::ChartConfig;
use crate::charts::types::{Candle, Direction};
use crate::errors::{EngineError, EngineResult};
use crate::provider::types::{
    AssetBalance, Balances, CandleStream, CandleStreamSender, ExchangeInfo, Fill, Order, Prices,
    StreamEvent, SymbolFilter, SymbolInfo,
};
use crate::provider::Provider;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use tokio::sync::mpsc;

pub struct MockProvider {
    pub exchange_info: RwLock<ExchangeInfo>,
    pub balances: RwLock<Balances>,
    pub prices: RwLock<Prices>,
    buy_results: Mutex<VecDeque<EngineResult<Order>>>,
    sell_results: Mutex<VecDeque<EngineResult<Order>>>,
    pub buys: Mutex<Vec<f64>>,
    pub sells: Mutex<Vec<f64>>,
    streams: Mutex<VecDeque<CandleStream>>,
    held_senders: Mutex<Vec<CandleStreamSender>>,
    next_order_id: AtomicU64,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            exchange_info: RwLock::new(ExchangeInfo {
                symbols: vec![Self::btcusdt()],
            }),
            balances: RwLock::new(Balances::new()),
            prices: RwLock::new(
                [("BTCUSDT".to_string(), 100.0)].into_iter().collect(),
            ),
            buy_results: Mutex::new(VecDeque::new()),
            sell_results: Mutex::new(VecDeque::new()),
            buys: Mutex::new(Vec::new()),
            sells: Mutex::new(Vec::new()),
            streams: Mutex::new(VecDeque::new()),
            held_senders: Mutex::new(Vec::new()),
            next_order_id: AtomicU64::new(1),
        }
    }

    pub fn btcusdt() -> SymbolInfo {
        SymbolInfo {
            symbol: "BTCUSDT".to_string(),
            status: "TRADING".to_string(),
            base_asset: "BTC".to_string(),
            quote_asset: "USDT".to_string(),
            filters: vec![
                SymbolFilter::PriceFilter { tick_size: 0.01 },
                SymbolFilter::LotSize {
                    step_size: 0.001,
                    min_qty: 0.001,
                },
                SymbolFilter::MinNotional { min_notional: 10.0 },
            ],
        }
    }

    pub fn filled_order(&self, price: f64, qty: f64) -> Order {
        Order {
            order_id: self.next_order_id.fetch_add(1, Ordering::SeqCst),
            fills: vec![Fill {
                price,
                qty,
                commission: 0.0,
                commission_asset: "USDT".to_string(),
            }],
        }
    }

    pub fn push_buy(&self, result: EngineResult<Order>) {
        self.buy_results.lock().unwrap().push_back(result);
    }

    pub fn push_sell(&self, result: EngineResult<Order>) {
        self.sell_results.lock().unwrap().push_back(result);
    }

    /// Queue a scripted stream for the next retrieve_stream call
    pub fn push_stream(&self, stream: CandleStream) {
        self.streams.lock().unwrap().push_back(stream);
    }

    /// Build a stream pre-loaded with a backfill; the returned sender
    /// feeds live updates and keeps the stream open while held
    pub fn scripted_stream(&self, backfill: Vec<Candle>) -> (CandleStreamSender, CandleStream) {
        let (tx, rx) = mpsc::channel(64);
        tx.try_send(StreamEvent::Backfill(backfill))
            .expect("backfill fits the fresh channel");
        (tx, rx)
    }

    pub fn candle(time: i64, low: f64, high: f64, close: f64, is_final: bool) -> Candle {
        Candle {
            time,
            open: close,
            high,
            low,
            close,
            volume: 1.0,
            close_time: time + 59_999,
            trades: 1,
            is_final,
            direction: Direction::Unset,
            indicators: Default::default(),
        }
    }

    pub fn set_balance(&self, asset: &str, available: f64) {
        self.balances.write().unwrap().insert(
            asset.to_string(),
            AssetBalance {
                available,
                on_order: 0.0,
            },
        );
    }

    fn quote(&self, symbol: &str) -> f64 {
        self.prices
            .read()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or(100.0)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn retrieve_exchange_info(&self) -> EngineResult<ExchangeInfo> {
        Ok(self.exchange_info.read().unwrap().clone())
    }

    async fn retrieve_balance(&self) -> EngineResult<Balances> {
        Ok(self.balances.read().unwrap().clone())
    }

    async fn retrieve_prices(&self) -> EngineResult<Prices> {
        Ok(self.prices.read().unwrap().clone())
    }

    async fn get_quote(&self, symbol: &str) -> EngineResult<f64> {
        Ok(self.quote(symbol))
    }

    async fn retrieve_stream(
        &self,
        _config: &ChartConfig,
        _tick_size: f64,
    ) -> EngineResult<CandleStream> {
        if let Some(stream) = self.streams.lock().unwrap().pop_front() {
            return Ok(stream);
        }
        // default: empty backfill, stream stays open
        let (tx, rx) = mpsc::channel(64);
        let _ = tx.try_send(StreamEvent::Backfill(Vec::new()));
        self.held_senders.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn buy(&self, quantity: f64, info: &SymbolInfo) -> EngineResult<Order> {
        if quantity <= 0.0 {
            return Err(EngineError::Order("Can't buy zero".to_string()));
        }
        self.buys.lock().unwrap().push(quantity);
        if let Some(result) = self.buy_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(self.filled_order(self.quote(&info.symbol), quantity))
    }

    async fn sell(&self, quantity: f64, info: &SymbolInfo) -> EngineResult<Order> {
        if quantity <= 0.0 {
            return Err(EngineError::Order("Can't sell zero".to_string()));
        }
        self.sells.lock().unwrap().push(quantity);
        if let Some(result) = self.sell_results.lock().unwrap().pop_front() {
            return result;
        }
        Ok(self.filled_order(self.quote(&info.symbol), quantity))
    }
}
