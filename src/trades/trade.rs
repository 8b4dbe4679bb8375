//! Position lifecycle state machine
//!
//! A trade is created only by a successful entry fill. From then on a
//! single watcher task races three exit triggers over the chart's live
//! stream - stop price, target price and the optional expiry deadline -
//! and whichever fires first attempts the close. At-most-one-exit comes
//! from the watcher being one sequential task plus the `is_open` check
//! inside the close critical section, so near-simultaneous candles can
//! never double-submit a closing order.
//!
//! A failed close is never dropped: the same reason is retried every 60s
//! until an order actually fills. Stream replacement re-attaches the
//! watcher without touching prices or the original expiry deadline.

use crate::charts::config::ChartId;
use crate::charts::stream::ChartStream;
use crate::charts::types::Candle;
use crate::constants::TRADE_CLOSE_RETRY_SECS;
use crate::errors::{EngineError, EngineResult};
use crate::events::{Notification, NotificationSender};
use crate::funds::dollar_value;
use crate::logger::{self, LogTag};
use crate::provider::types::{
    round_tick, ExchangeInfo, Order, OrderSide, Prices, SymbolInfo,
};
use crate::provider::Provider;
use crate::strategies::{Signal, StrategyConfig};
use crate::trades::stats::TradeStats;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CloseReason {
    Signal,
    Stop,
    Target,
    Expire,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Signal => write!(f, "signal"),
            CloseReason::Stop => write!(f, "stop"),
            CloseReason::Target => write!(f, "target"),
            CloseReason::Expire => write!(f, "expire"),
        }
    }
}

/// Realized result of a closed trade, valued in dollars
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TradePnl {
    pub gross: f64,
    pub commission: f64,
    pub net: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeOrder {
    pub time: DateTime<Utc>,
    pub side: OrderSide,
    pub order: Order,
}

pub enum CloseOutcome {
    Closed(Order),
    AlreadyClosed,
}

/// Everything a trade needs from its surroundings
#[derive(Clone)]
pub struct TradeContext {
    pub provider: Arc<dyn Provider>,
    pub notifications: NotificationSender,
    pub prices: Arc<RwLock<Prices>>,
    pub stats: Arc<TradeStats>,
}

impl std::fmt::Debug for TradeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeContext")
            .field("prices", &self.prices)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Entry request assembled by the orchestrator; quantity arrives already
/// risk sized and clamped
pub struct TradeRequest {
    pub id: String,
    pub advisor_id: String,
    pub chart_id: ChartId,
    pub signal: Signal,
    pub quantity: f64,
    pub strategy_id: String,
    pub strategy: StrategyConfig,
    pub symbol: String,
    pub who: String,
    pub stream: ChartStream,
}

#[derive(Debug)]
pub struct Trade {
    pub id: String,
    pub advisor_id: String,
    pub chart_id: ChartId,
    pub who: String,
    pub is_long: bool,
    pub price: f64,
    pub quantity: f64,
    pub spent: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Expiry anchored to the original entry; survives resubscription
    pub deadline: Option<DateTime<Utc>>,
    ctx: TradeContext,
    info: RwLock<SymbolInfo>,
    is_open: AtomicBool,
    close_reason: RwLock<Option<CloseReason>>,
    orders: RwLock<Vec<TradeOrder>>,
    realized: RwLock<Option<TradePnl>>,
    close_lock: Mutex<()>,
    done: watch::Sender<bool>,
}

impl Trade {
    /// Validate, place the entry order and arm the exit watcher. Any
    /// failure rejects with full context and creates no trade.
    pub async fn initialize(
        request: TradeRequest,
        exchange_info: &ExchangeInfo,
        ctx: TradeContext,
    ) -> EngineResult<Arc<Trade>> {
        let context = format!(
            "Trade {} {} {}",
            request.signal, request.quantity, request.who
        );
        Self::try_open(request, exchange_info, ctx)
            .await
            .map_err(|e| e.context(&context))
    }

    async fn try_open(
        request: TradeRequest,
        exchange_info: &ExchangeInfo,
        ctx: TradeContext,
    ) -> EngineResult<Arc<Trade>> {
        let info = exchange_info
            .find(&request.symbol)
            .cloned()
            .ok_or_else(|| EngineError::Data("Info not available".to_string()))?;
        if !info.is_trading() {
            return Err(EngineError::Order(format!(
                "Not trading, current status: {}",
                info.status
            )));
        }
        let is_long = match request.signal {
            Signal::Long => true,
            Signal::Short => false,
            other => {
                return Err(EngineError::Order(format!(
                    "Unable to process signal {}",
                    other
                )));
            }
        };

        let order = if is_long {
            ctx.provider.buy(request.quantity, &info).await?
        } else {
            ctx.provider.sell(request.quantity, &info).await?
        };
        if !order.filled() {
            return Err(EngineError::Order("Order failed".to_string()));
        }

        let price = order.mean_price();
        let quantity = order.total_qty();
        let spent = order.total_spent();
        let stop_loss = request.strategy.trade.stop_loss / 100.0;
        let profit_target = request.strategy.trade.profit_target / 100.0;
        let sign = if is_long { 1.0 } else { -1.0 };
        let tick = info.tick_size().unwrap_or(0.0);
        let stop_price = round_tick(price - (spent * stop_loss / quantity) * sign, tick);
        let target_price = round_tick(price + (spent * profit_target / quantity) * sign, tick);
        let entry_time = Utc::now();
        let deadline = request
            .strategy
            .trade
            .time_to_live
            .map(|ms| entry_time + ChronoDuration::milliseconds(ms as i64));

        let entry_side = if is_long { OrderSide::Buy } else { OrderSide::Sell };
        let decimals = info.price_decimals();
        let (done, _) = watch::channel(false);
        let trade = Arc::new(Trade {
            id: request.id,
            advisor_id: request.advisor_id,
            chart_id: request.chart_id.clone(),
            who: request.who,
            is_long,
            price,
            quantity,
            spent,
            stop_price,
            target_price,
            entry_time,
            deadline,
            ctx,
            info: RwLock::new(info),
            is_open: AtomicBool::new(true),
            close_reason: RwLock::new(None),
            orders: RwLock::new(vec![TradeOrder {
                time: entry_time,
                side: entry_side,
                order,
            }]),
            realized: RwLock::new(None),
            close_lock: Mutex::new(()),
            done,
        });

        trade.ctx.stats.record_open();
        logger::info(
            LogTag::Trade,
            &format!(
                "{} {} {} {}@{:.d$} TRGT {:.d$} STOP {:.d$} ({})",
                trade.id,
                if is_long { "LONG" } else { "SHORT" },
                trade.symbol().await,
                quantity,
                price,
                target_price,
                stop_price,
                trade.who,
                d = decimals
            ),
        );
        spawn_watcher(trade.clone(), request.stream.subscribe());
        let _ = trade.ctx.notifications.send(Notification::UpdateFunds);
        let _ = trade.ctx.notifications.send(Notification::ChartChanged {
            chart_id: request.chart_id,
        });
        Ok(trade)
    }

    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    pub async fn symbol(&self) -> String {
        self.info.read().await.symbol.clone()
    }

    pub async fn close_reason(&self) -> Option<CloseReason> {
        *self.close_reason.read().await
    }

    pub async fn realized_pnl(&self) -> Option<TradePnl> {
        *self.realized.read().await
    }

    pub async fn orders(&self) -> Vec<TradeOrder> {
        self.orders.read().await.clone()
    }

    /// Fresh exchange metadata from the periodic refresh
    pub async fn update_info(&self, exchange_info: &ExchangeInfo) {
        let symbol = self.symbol().await;
        if let Some(info) = exchange_info.find(&symbol) {
            *self.info.write().await = info.clone();
        }
    }

    fn stop_hit(&self, candle: &Candle) -> bool {
        if self.is_long {
            candle.low <= self.stop_price
        } else {
            candle.high >= self.stop_price
        }
    }

    fn target_hit(&self, candle: &Candle) -> bool {
        if self.is_long {
            candle.high >= self.target_price
        } else {
            candle.low <= self.target_price
        }
    }

    /// Close and keep retrying the same reason every 60s until an order
    /// fills. The trade is never silently abandoned.
    pub async fn close_with_retry(&self, reason: CloseReason) {
        loop {
            match self.close(reason).await {
                Ok(_) => return,
                Err(e) => {
                    logger::error(
                        LogTag::Trade,
                        &format!(
                            "{}: {}, retrying close ({}) in {}s",
                            self.id, e, reason, TRADE_CLOSE_RETRY_SECS
                        ),
                    );
                    tokio::time::sleep(Duration::from_secs(TRADE_CLOSE_RETRY_SECS)).await;
                }
            }
        }
    }

    /// One close attempt. The check-and-submit runs under the close lock
    /// so two concurrent triggers cannot both reach the exchange.
    pub async fn close(&self, reason: CloseReason) -> EngineResult<CloseOutcome> {
        let _guard = self.close_lock.lock().await;
        if !self.is_open() {
            return Ok(CloseOutcome::AlreadyClosed);
        }
        let info = self.info.read().await.clone();
        if !info.is_trading() {
            return Err(EngineError::Order(format!(
                "{}: Not trading, current status: {}",
                self.id, info.status
            )));
        }

        let order = if self.is_long {
            self.ctx.provider.sell(self.quantity, &info).await
        } else {
            self.ctx.provider.buy(self.quantity, &info).await
        }
        .map_err(|e| e.context(&self.id))?;
        if !order.filled() {
            return Err(EngineError::Order(format!("{}: Order failed", self.id)));
        }

        self.is_open.store(false, Ordering::SeqCst);
        *self.close_reason.write().await = Some(reason);
        let side = if self.is_long { OrderSide::Sell } else { OrderSide::Buy };
        self.orders.write().await.push(TradeOrder {
            time: Utc::now(),
            side,
            order: order.clone(),
        });
        let _ = self.done.send(true);

        let pnl = self.calculate_pnl().await;
        *self.realized.write().await = Some(pnl);
        self.ctx.stats.record_close(reason, &pnl);

        let decimals = info.price_decimals();
        logger::info(
            LogTag::Trade,
            &format!(
                "{} {} {} {}@{:.d$} net {:.2} ({})",
                self.id,
                reason.to_string().to_uppercase(),
                info.symbol,
                order.total_qty(),
                order.mean_price(),
                pnl.net,
                self.who,
                d = decimals
            ),
        );
        let _ = self.ctx.notifications.send(Notification::UpdateFunds);
        let _ = self.ctx.notifications.send(Notification::ChartChanged {
            chart_id: self.chart_id.clone(),
        });
        Ok(CloseOutcome::Closed(order))
    }

    /// Realized P&L across all orders: gross is the sold-minus-bought
    /// quote value converted to dollars, commissions are valued in their
    /// settlement asset through the price cache.
    async fn calculate_pnl(&self) -> TradePnl {
        let prices = self.ctx.prices.read().await;
        let orders = self.orders.read().await;
        let quote_asset = self.info.read().await.quote_asset.clone();

        let mut bought = 0.0;
        let mut sold = 0.0;
        let mut commission = 0.0;
        for entry in orders.iter() {
            let value = entry.order.total_spent();
            match entry.side {
                OrderSide::Buy => bought += value,
                OrderSide::Sell => sold += value,
            }
            for fill in &entry.order.fills {
                commission +=
                    dollar_value(&fill.commission_asset, fill.commission, &prices)
                        .unwrap_or(0.0);
            }
        }
        let gross = dollar_value(&quote_asset, sold - bought, &prices).unwrap_or(0.0);
        TradePnl {
            gross,
            commission,
            net: gross - commission,
        }
    }
}

/// Re-attach a trade's exit watcher after the owning chart replaced its
/// stream. Prices and the expiry deadline are untouched.
pub fn resubscribe(trade: &Arc<Trade>, stream: &ChartStream) {
    if !trade.is_open() {
        return;
    }
    spawn_watcher(trade.clone(), stream.subscribe());
}

fn spawn_watcher(trade: Arc<Trade>, receiver: broadcast::Receiver<Candle>) {
    tokio::spawn(run_watcher(trade, receiver));
}

/// The exit race: stop, target and expiry evaluated in one sequential
/// task, so only one of them can ever reach close()
async fn run_watcher(trade: Arc<Trade>, mut rx: broadcast::Receiver<Candle>) {
    let mut done = trade.done.subscribe();
    if *done.borrow() {
        return;
    }
    let expiry = async {
        match trade.deadline {
            Some(deadline) => {
                let remaining = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                tokio::time::sleep(remaining).await;
            }
            None => futures::future::pending::<()>().await,
        }
    };
    tokio::pin!(expiry);

    loop {
        tokio::select! {
            _ = &mut expiry => {
                trade.close_with_retry(CloseReason::Expire).await;
                return;
            }
            _ = done.changed() => {
                // closed externally (strategy signal or shutdown)
                return;
            }
            result = rx.recv() => match result {
                Ok(candle) => {
                    if !trade.is_open() {
                        return;
                    }
                    if trade.stop_hit(&candle) {
                        trade.close_with_retry(CloseReason::Stop).await;
                        return;
                    }
                    if trade.target_hit(&candle) {
                        trade.close_with_retry(CloseReason::Target).await;
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    logger::warning(
                        LogTag::Trade,
                        &format!("{}: watcher lagged {} candles", trade.id, skipped),
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    // stream severed on chart restart; the orchestrator
                    // resubscribes us to the replacement
                    return;
                }
            }
        }
    }
}
