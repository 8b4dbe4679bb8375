//! Binance spot provider
//!
//! REST for metadata, balances, prices and market orders; one WebSocket
//! kline subscription per chart. Every REST call goes through the global
//! exchange limiter. The engine consumes this only through the Provider
//! trait.

use crate::charts::config::ChartConfig;
use crate::charts::types::{Candle, Direction};
use crate::errors::{EngineError, EngineResult};
use crate::logger::{self, LogTag};
use crate::provider::rate_limiter::exchange_limiter;
use crate::provider::types::{
    decimals, AssetBalance, Balances, CandleStream, ExchangeInfo, Fill, Order, Prices,
    StreamEvent, SymbolFilter, SymbolInfo,
};
use crate::provider::Provider;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

const REST_BASE: &str = "https://api.binance.com";
const WS_BASE: &str = "wss://stream.binance.com:9443";
const BACKFILL_PERIODS: usize = 500;
const RECV_WINDOW_MS: u64 = 5_000;

pub struct BinanceProvider {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    rest_base: String,
    ws_base: String,
}

impl BinanceProvider {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            api_secret,
            rest_base: REST_BASE.to_string(),
            ws_base: WS_BASE.to_string(),
        }
    }

    async fn get_json(&self, path_and_query: &str) -> EngineResult<Value> {
        let url = format!("{}{}", self.rest_base, path_and_query);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Exchange(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Exchange(e.to_string()))?;
        if !status.is_success() {
            return Err(EngineError::Exchange(format!("{}: {}", status, body)));
        }
        serde_json::from_str(&body).map_err(|e| EngineError::Exchange(e.to_string()))
    }

    fn sign(&self, query: &str) -> EngineResult<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| EngineError::Exchange(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_query(&self, params: &[(&str, String)]) -> EngineResult<String> {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={}&timestamp={}",
            RECV_WINDOW_MS,
            chrono::Utc::now().timestamp_millis()
        ));
        let signature = self.sign(&query)?;
        Ok(format!("{}&signature={}", query, signature))
    }

    async fn signed_get(&self, path: &str, params: &[(&str, String)]) -> EngineResult<Value> {
        let query = self.signed_query(params)?;
        let url = format!("{}{}?{}", self.rest_base, path, query);
        let response = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::Exchange(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Exchange(e.to_string()))?;
        if !status.is_success() {
            return Err(EngineError::Exchange(format!("{}: {}", status, body)));
        }
        serde_json::from_str(&body).map_err(|e| EngineError::Exchange(e.to_string()))
    }

    async fn signed_post(&self, path: &str, params: &[(&str, String)]) -> EngineResult<Value> {
        let query = self.signed_query(params)?;
        let url = format!("{}{}?{}", self.rest_base, path, query);
        let response = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| EngineError::Exchange(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::Exchange(e.to_string()))?;
        if !status.is_success() {
            return Err(EngineError::Exchange(format!("{}: {}", status, body)));
        }
        serde_json::from_str(&body).map_err(|e| EngineError::Exchange(e.to_string()))
    }

    async fn place_market_order(
        &self,
        side: &str,
        quantity: f64,
        info: &SymbolInfo,
    ) -> EngineResult<Order> {
        if !(quantity > 0.0) {
            return Err(EngineError::Order(format!(
                "Can't {} zero",
                side.to_lowercase()
            )));
        }
        let _slot = exchange_limiter().begin().await;
        let qty_decimals = decimals(info.step_size().unwrap_or(0.0));
        let params = [
            ("symbol", info.symbol.clone()),
            ("side", side.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", format!("{:.*}", qty_decimals, quantity)),
            ("newOrderRespType", "FULL".to_string()),
        ];
        let raw = self.signed_post("/api/v3/order", &params).await?;
        parse_order(&raw)
    }
}

#[async_trait]
impl Provider for BinanceProvider {
    async fn retrieve_exchange_info(&self) -> EngineResult<ExchangeInfo> {
        let _slot = exchange_limiter().begin().await;
        let raw = self.get_json("/api/v3/exchangeInfo").await?;
        parse_exchange_info(&raw)
    }

    async fn retrieve_balance(&self) -> EngineResult<Balances> {
        let _slot = exchange_limiter().begin().await;
        let raw = self.signed_get("/api/v3/account", &[]).await?;
        let account: RawAccount =
            serde_json::from_value(raw).map_err(|e| EngineError::Exchange(e.to_string()))?;
        let mut balances = Balances::new();
        for balance in account.balances {
            balances.insert(
                balance.asset,
                AssetBalance {
                    available: parse_number(&balance.free),
                    on_order: parse_number(&balance.locked),
                },
            );
        }
        Ok(balances)
    }

    async fn retrieve_prices(&self) -> EngineResult<Prices> {
        let _slot = exchange_limiter().begin().await;
        let raw = self.get_json("/api/v3/ticker/price").await?;
        let tickers: Vec<RawTicker> =
            serde_json::from_value(raw).map_err(|e| EngineError::Exchange(e.to_string()))?;
        Ok(tickers
            .into_iter()
            .map(|t| (t.symbol, parse_number(&t.price)))
            .collect())
    }

    async fn get_quote(&self, symbol: &str) -> EngineResult<f64> {
        let _slot = exchange_limiter().begin().await;
        let raw = self
            .get_json(&format!("/api/v3/ticker/price?symbol={}", symbol))
            .await?;
        let ticker: RawTicker =
            serde_json::from_value(raw).map_err(|e| EngineError::Exchange(e.to_string()))?;
        Ok(parse_number(&ticker.price))
    }

    async fn retrieve_stream(
        &self,
        config: &ChartConfig,
        _tick_size: f64,
    ) -> EngineResult<CandleStream> {
        let symbol = config.symbol.clone();
        let interval = config.timeframe.as_str();

        let backfill = {
            let _slot = exchange_limiter().begin().await;
            let raw = self
                .get_json(&format!(
                    "/api/v3/klines?symbol={}&interval={}&limit={}",
                    symbol,
                    interval,
                    BACKFILL_PERIODS + 1
                ))
                .await?;
            // the last row is the still-forming candle; the live stream
            // delivers it
            let rows = raw
                .as_array()
                .ok_or_else(|| EngineError::Exchange("Bad klines response".to_string()))?;
            rows.iter()
                .take(BACKFILL_PERIODS)
                .map(parse_kline_row)
                .collect::<EngineResult<Vec<Candle>>>()?
        };

        let (tx, rx) = mpsc::channel(64);
        tx.try_send(StreamEvent::Backfill(backfill))
            .map_err(|_| EngineError::Stream("Stream buffer unavailable".to_string()))?;

        let ws_url = format!(
            "{}/ws/{}@kline_{}",
            self.ws_base,
            symbol.to_lowercase(),
            interval
        );
        tokio::spawn(async move {
            let (ws, _) = match tokio_tungstenite::connect_async(&ws_url).await {
                Ok(connected) => connected,
                Err(e) => {
                    logger::error(
                        LogTag::Provider,
                        &format!("{} kline socket: {}", symbol, e),
                    );
                    return; // dropping tx closes the stream, the chart restarts
                }
            };
            let (mut write, mut read) = ws.split();
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if let Some(candle) = parse_kline_event(&text) {
                            if tx.send(StreamEvent::Update(candle)).await.is_err() {
                                break; // chart unsubscribed
                            }
                        }
                    }
                    Ok(Message::Ping(payload)) => {
                        if write.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            // tx drops here; the chart sees the closed stream and restarts
        });

        Ok(rx)
    }

    async fn buy(&self, quantity: f64, info: &SymbolInfo) -> EngineResult<Order> {
        self.place_market_order("BUY", quantity, info).await
    }

    async fn sell(&self, quantity: f64, info: &SymbolInfo) -> EngineResult<Order> {
        self.place_market_order("SELL", quantity, info).await
    }

    async fn ping(&self) -> bool {
        let url = format!("{}/api/v3/ping", self.rest_base);
        match self.http.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[derive(Deserialize)]
struct RawAccount {
    balances: Vec<RawBalance>,
}

#[derive(Deserialize)]
struct RawBalance {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Deserialize)]
struct RawTicker {
    symbol: String,
    price: String,
}

fn parse_number(raw: &str) -> f64 {
    raw.parse().unwrap_or(0.0)
}

fn value_f64(value: &Value) -> f64 {
    match value {
        Value::String(s) => parse_number(s),
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_exchange_info(raw: &Value) -> EngineResult<ExchangeInfo> {
    let symbols = raw
        .get("symbols")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::Exchange("Bad exchangeInfo response".to_string()))?;
    let mut parsed = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let mut filters = Vec::new();
        if let Some(raw_filters) = symbol.get("filters").and_then(Value::as_array) {
            for filter in raw_filters {
                match filter.get("filterType").and_then(Value::as_str) {
                    Some("PRICE_FILTER") => filters.push(SymbolFilter::PriceFilter {
                        tick_size: value_f64(&filter["tickSize"]),
                    }),
                    Some("LOT_SIZE") => filters.push(SymbolFilter::LotSize {
                        step_size: value_f64(&filter["stepSize"]),
                        min_qty: value_f64(&filter["minQty"]),
                    }),
                    // spot renamed MIN_NOTIONAL to NOTIONAL; accept both
                    Some("MIN_NOTIONAL") | Some("NOTIONAL") => {
                        filters.push(SymbolFilter::MinNotional {
                            min_notional: value_f64(&filter["minNotional"]),
                        })
                    }
                    _ => {}
                }
            }
        }
        parsed.push(SymbolInfo {
            symbol: symbol
                .get("symbol")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            status: symbol
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            base_asset: symbol
                .get("baseAsset")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            quote_asset: symbol
                .get("quoteAsset")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            filters,
        });
    }
    Ok(ExchangeInfo { symbols: parsed })
}

/// One REST kline row:
/// [openTime, open, high, low, close, volume, closeTime, quoteVolume,
///  trades, takerBase, takerQuote, unused]
fn parse_kline_row(row: &Value) -> EngineResult<Candle> {
    let fields = row
        .as_array()
        .filter(|f| f.len() >= 9)
        .ok_or_else(|| EngineError::Exchange("Bad kline row".to_string()))?;
    Ok(Candle {
        time: fields[0].as_i64().unwrap_or(0),
        open: value_f64(&fields[1]),
        high: value_f64(&fields[2]),
        low: value_f64(&fields[3]),
        close: value_f64(&fields[4]),
        volume: value_f64(&fields[5]),
        close_time: fields[6].as_i64().unwrap_or(0),
        trades: fields[8].as_u64().unwrap_or(0),
        is_final: true,
        direction: Direction::Unset,
        indicators: Default::default(),
    })
}

/// One websocket kline event; returns None for anything else on the wire
fn parse_kline_event(text: &str) -> Option<Candle> {
    let value: Value = serde_json::from_str(text).ok()?;
    let k = value.get("k")?;
    Some(Candle {
        time: k.get("t")?.as_i64()?,
        open: value_f64(k.get("o")?),
        high: value_f64(k.get("h")?),
        low: value_f64(k.get("l")?),
        close: value_f64(k.get("c")?),
        volume: value_f64(k.get("v")?),
        close_time: k.get("T").and_then(Value::as_i64).unwrap_or(0),
        trades: k.get("n").and_then(Value::as_u64).unwrap_or(0),
        is_final: k.get("x").and_then(Value::as_bool).unwrap_or(false),
        direction: Direction::Unset,
        indicators: Default::default(),
    })
}

fn parse_order(raw: &Value) -> EngineResult<Order> {
    let order_id = raw
        .get("orderId")
        .and_then(Value::as_u64)
        .ok_or_else(|| EngineError::Exchange("Order response missing orderId".to_string()))?;
    let mut fills = Vec::new();
    if let Some(raw_fills) = raw.get("fills").and_then(Value::as_array) {
        for fill in raw_fills {
            fills.push(Fill {
                price: value_f64(&fill["price"]),
                qty: value_f64(&fill["qty"]),
                commission: value_f64(&fill["commission"]),
                commission_asset: fill
                    .get("commissionAsset")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }
    Ok(Order { order_id, fills })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exchange_info_filters() {
        let raw: Value = serde_json::from_str(
            r#"{
                "symbols": [{
                    "symbol": "BTCUSDT",
                    "status": "TRADING",
                    "baseAsset": "BTC",
                    "quoteAsset": "USDT",
                    "filters": [
                        {"filterType": "PRICE_FILTER", "tickSize": "0.01000000"},
                        {"filterType": "LOT_SIZE", "stepSize": "0.00010000", "minQty": "0.00010000"},
                        {"filterType": "NOTIONAL", "minNotional": "10.00000000"},
                        {"filterType": "ICEBERG_PARTS", "limit": 10}
                    ]
                }]
            }"#,
        )
        .unwrap();
        let info = parse_exchange_info(&raw).unwrap();
        let symbol = info.find("BTCUSDT").unwrap();
        assert!(symbol.is_trading());
        assert_eq!(symbol.tick_size(), Some(0.01));
        assert_eq!(symbol.step_size(), Some(0.0001));
        assert_eq!(symbol.min_notional(), Some(10.0));
    }

    #[test]
    fn parses_a_kline_row() {
        let row: Value = serde_json::from_str(
            r#"[1699000000000, "35000.1", "35100.0", "34900.5", "35050.2",
                "123.45", 1699000299999, "4320000.0", 815, "60.0", "2100000.0", "0"]"#,
        )
        .unwrap();
        let candle = parse_kline_row(&row).unwrap();
        assert_eq!(candle.time, 1_699_000_000_000);
        assert_eq!(candle.open, 35_000.1);
        assert_eq!(candle.close, 35_050.2);
        assert_eq!(candle.trades, 815);
        assert!(candle.is_final);
        assert!(candle.is_valid());
    }

    #[test]
    fn parses_a_kline_socket_event() {
        let event = r#"{
            "e": "kline", "E": 1699000010000, "s": "BTCUSDT",
            "k": {
                "t": 1699000000000, "T": 1699000299999, "s": "BTCUSDT",
                "i": "5m", "o": "35000.1", "c": "35020.0", "h": "35060.0",
                "l": "34990.0", "v": "12.5", "n": 155, "x": false,
                "q": "437000.0", "V": "6.0", "Q": "210000.0"
            }
        }"#;
        let candle = parse_kline_event(event).unwrap();
        assert_eq!(candle.close, 35_020.0);
        assert!(!candle.is_final);
        assert_eq!(candle.trades, 155);
    }

    #[test]
    fn ignores_non_kline_traffic() {
        assert!(parse_kline_event(r#"{"result": null, "id": 1}"#).is_none());
        assert!(parse_kline_event("not json").is_none());
    }

    #[test]
    fn parses_a_full_order_response() {
        let raw: Value = serde_json::from_str(
            r#"{
                "orderId": 28,
                "fills": [
                    {"price": "35000.0", "qty": "0.5", "commission": "0.0005", "commissionAsset": "BTC"},
                    {"price": "35010.0", "qty": "0.5", "commission": "0.0005", "commissionAsset": "BTC"}
                ]
            }"#,
        )
        .unwrap();
        let order = parse_order(&raw).unwrap();
        assert!(order.filled());
        assert_eq!(order.mean_price(), 35_005.0);
        assert_eq!(order.total_qty(), 1.0);
    }
}
