//! Orchestrator: wires advisors to charts and advice to trades
//!
//! The bot owns the global registries (charts by config hash, advisors,
//! the trade list, the funds/price caches) and the single notification
//! loop that routes candles-ready to analysis, advice to trade
//! management and stream replacements to watcher resubscription.
//!
//! Advice is digested on the notification task itself, so the
//! one-open-trade-per-(advisor, chart) check never races; the actual
//! exchange calls stay serialized behind the provider's global rate
//! limiter.

use crate::advisors::{Advice, Advisor};
use crate::charts::{Chart, ChartContext, ChartId, ChartStream};
use crate::config::{AdvisorConfig, Config};
use crate::constants::{SERVER_INFO_REFRESH_SECS, SERVER_INFO_RETRY_SECS, TRADE_HISTORY_LIMIT};
use crate::errors::{EngineError, EngineResult};
use crate::events::{self, Notification, NotificationReceiver, NotificationSender};
use crate::funds::{self, FundsSnapshot};
use crate::logger::{self, LogTag};
use crate::provider::types::{ExchangeInfo, Prices};
use crate::provider::Provider;
use crate::strategies::{self, Signal};
use crate::trades::{self, CloseReason, Trade, TradeContext, TradeRequest, TradeStats};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

pub struct Bot {
    state: Arc<BotState>,
    shutdown: watch::Sender<bool>,
}

struct BotState {
    provider: Arc<dyn Provider>,
    max_candles: usize,
    charts: RwLock<HashMap<ChartId, Arc<Chart>>>,
    advisors: RwLock<BTreeMap<String, Advisor>>,
    trades: RwLock<Vec<Arc<Trade>>>,
    funds: RwLock<FundsSnapshot>,
    prices: Arc<RwLock<Prices>>,
    exchange_info: RwLock<ExchangeInfo>,
    stats: Arc<TradeStats>,
    trade_counter: AtomicU64,
    notifications: NotificationSender,
}

impl Bot {
    /// Connect the provider, load every advisor (a broken advisor is
    /// logged and skipped) and start the notification and refresh loops.
    /// Zero successfully loaded advisors is fatal to the run.
    pub async fn initialize(
        config: &Config,
        provider: Arc<dyn Provider>,
    ) -> EngineResult<Bot> {
        let (notifications, receiver) = events::channel();
        let exchange_info = provider.retrieve_exchange_info().await?;
        logger::info(LogTag::Bot, "Provider connected");

        let state = Arc::new(BotState {
            provider,
            max_candles: config.engine.max_candles,
            charts: RwLock::new(HashMap::new()),
            advisors: RwLock::new(BTreeMap::new()),
            trades: RwLock::new(Vec::new()),
            funds: RwLock::new(FundsSnapshot::new()),
            prices: Arc::new(RwLock::new(Prices::new())),
            exchange_info: RwLock::new(exchange_info),
            stats: Arc::new(TradeStats::default()),
            trade_counter: AtomicU64::new(0),
            notifications,
        });
        if let Err(e) = state.update_funds(true).await {
            logger::warning(LogTag::Funds, &e.to_string());
        }

        for (advisor_id, advisor_config) in &config.advisors {
            if let Err(e) = state.add_advisor(advisor_id, advisor_config).await {
                logger::error(LogTag::Advisor, &e.to_string());
            }
        }
        let running: Vec<String> = state
            .advisors
            .read()
            .await
            .values()
            .map(|a| a.name.clone())
            .collect();
        if running.is_empty() {
            return Err(EngineError::Config("No advisors running".to_string()));
        }
        logger::info(
            LogTag::Bot,
            &format!("Advisors running: {}", running.join(", ")),
        );

        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(run_notifications(
            state.clone(),
            receiver,
            shutdown_rx.clone(),
        ));
        tokio::spawn(run_server_info_refresh(state.clone(), shutdown_rx));
        Ok(Bot { state, shutdown })
    }

    /// Close every open trade ("expire") and stop the loops
    pub async fn shutdown(&self) {
        logger::info(LogTag::Bot, "Exiting, closing open trades");
        let open: Vec<Arc<Trade>> = self
            .state
            .trades
            .read()
            .await
            .iter()
            .filter(|t| t.is_open())
            .cloned()
            .collect();
        for trade in open {
            if let Err(e) = trade.close(CloseReason::Expire).await {
                logger::error(LogTag::Trade, &e.to_string());
            }
        }
        let _ = self.shutdown.send(true);
    }

    pub async fn open_trades(&self) -> Vec<Arc<Trade>> {
        self.state
            .trades
            .read()
            .await
            .iter()
            .filter(|t| t.is_open())
            .cloned()
            .collect()
    }

    pub async fn chart(&self, chart_id: &str) -> Option<Arc<Chart>> {
        self.state.charts.read().await.get(chart_id).cloned()
    }

    pub async fn chart_ids(&self) -> Vec<ChartId> {
        self.state.charts.read().await.keys().cloned().collect()
    }

    pub async fn funds(&self) -> FundsSnapshot {
        self.state.funds.read().await.clone()
    }

    pub fn stats(&self) -> Arc<TradeStats> {
        self.state.stats.clone()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &Arc<BotState> {
        &self.state
    }
}

impl BotState {
    async fn add_advisor(
        &self,
        advisor_id: &str,
        config: &AdvisorConfig,
    ) -> EngineResult<()> {
        let name = strategies::display_name(advisor_id);
        if !(config.margin > 0.0) || config.margin > 100.0 || config.sights.is_empty() {
            return Err(EngineError::Config(format!(
                "Advisor {} not properly configured",
                name
            )));
        }
        let chart_configs = Advisor::get_chart_configs(&config.sights)
            .map_err(|e| e.context(&format!("Advisor {}", name)))?;

        let mut chart_ids = Vec::with_capacity(chart_configs.len());
        for chart_config in chart_configs {
            let chart_id = chart_config.id();
            let existing = self.charts.read().await.contains_key(&chart_id);
            if existing {
                logger::info(
                    LogTag::Chart,
                    &format!("{} already loaded, skipping", chart_config.display_name()),
                );
            } else {
                let exchange_info = self.exchange_info.read().await.clone();
                let chart = Chart::initialize(
                    chart_config,
                    &exchange_info,
                    ChartContext {
                        provider: self.provider.clone(),
                        notifications: self.notifications.clone(),
                        max_candles: self.max_candles,
                    },
                );
                self.charts.write().await.insert(chart_id.clone(), chart);
            }
            chart_ids.push(chart_id);
        }

        self.advisors.write().await.insert(
            advisor_id.to_string(),
            Advisor::new(name.clone(), config.margin / 100.0, chart_ids),
        );
        logger::info(LogTag::Advisor, &format!("Advisor {} running", name));
        Ok(())
    }

    /// Route a final-candle window to every advisor watching the chart
    async fn analyze_chart(&self, chart_id: &str, candles: &[crate::charts::Candle], is_final: bool) {
        let chart = match self.charts.read().await.get(chart_id).cloned() {
            Some(chart) => chart,
            None => return,
        };
        let advisors = self.advisors.read().await.clone();
        for (advisor_id, advisor) in advisors {
            if !advisor.chart_ids.iter().any(|id| id == chart_id) {
                continue;
            }
            let who = format!("{}->{}", advisor.name, chart.name);
            let results =
                Advisor::analyze(candles, &chart.config.strategies, is_final, &who);
            for result in results {
                match result {
                    Ok(Some(advice)) => {
                        let _ = self.notifications.send(Notification::Advice {
                            advisor_id: advisor_id.clone(),
                            chart_id: chart_id.to_string(),
                            advice,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => logger::error(LogTag::Strategy, &e.to_string()),
                }
            }
        }
    }

    /// Convert advice into trade opens and closes. Runs on the single
    /// notification task, so the open-trade check cannot race itself.
    async fn digest_advice(&self, advisor_id: &str, chart_id: &str, advice: Advice) {
        let advisor = match self.advisors.read().await.get(advisor_id).cloned() {
            Some(advisor) => advisor,
            None => return,
        };
        let chart = match self.charts.read().await.get(chart_id).cloned() {
            Some(chart) => chart,
            None => return,
        };
        let who = format!(
            "{}->{}->{}",
            advisor.name,
            chart.name,
            strategies::display_name(&advice.strategy_id)
        );

        for signal in &advice.signals {
            match signal {
                Signal::CloseLong | Signal::CloseShort => {
                    let wants_long = *signal == Signal::CloseLong;
                    let target = self
                        .trades
                        .read()
                        .await
                        .iter()
                        .find(|t| {
                            t.advisor_id == advisor_id
                                && t.chart_id == chart_id
                                && t.is_open()
                                && t.is_long == wants_long
                        })
                        .cloned();
                    if let Some(trade) = target {
                        logger::info(
                            LogTag::Bot,
                            &format!("{} close requested by {}", trade.id, who),
                        );
                        let closing = trade.clone();
                        tokio::spawn(async move {
                            closing.close_with_retry(CloseReason::Signal).await;
                        });
                    }
                }
                Signal::Long | Signal::Short => {
                    let is_long = *signal == Signal::Long;
                    if let Err(e) = self
                        .open_trade(advisor_id, chart_id, &advisor, &chart, &advice, is_long, &who)
                        .await
                    {
                        logger::error(LogTag::Trade, &e.to_string());
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn open_trade(
        &self,
        advisor_id: &str,
        chart_id: &str,
        advisor: &Advisor,
        chart: &Arc<Chart>,
        advice: &Advice,
        is_long: bool,
        who: &str,
    ) -> EngineResult<()> {
        let info = match chart.info().await {
            Some(info) => info,
            None => {
                return Err(EngineError::Data(format!(
                    "Trade {} {}: Info not available",
                    if is_long { "LONG" } else { "SHORT" },
                    who
                )));
            }
        };
        let stream = match chart.stream().await {
            Some(stream) => stream,
            None => {
                return Err(EngineError::Stream(format!(
                    "Trade {} {}: Chart not enabled",
                    if is_long { "LONG" } else { "SHORT" },
                    who
                )));
            }
        };

        // funds in the entry asset, minus what open trades will sell back
        // into the same asset
        let asset = if is_long {
            info.quote_asset.clone()
        } else {
            info.base_asset.clone()
        };
        let locked = self.quantity_locked_by_trades(&asset).await;
        let available = self
            .funds
            .read()
            .await
            .get(&asset)
            .map(|f| f.available)
            .unwrap_or(0.0);
        let amount = (available - locked).max(0.0) * advisor.margin;
        if amount <= 0.0 {
            // silent no-op; nothing to commit
            return Ok(());
        }
        let quantity = self
            .provider
            .clamp_quantity(amount, &info, is_long)
            .await?;
        if quantity <= 0.0 {
            return Ok(());
        }

        let already_open = self.trades.read().await.iter().any(|t| {
            t.advisor_id == advisor_id && t.chart_id == chart_id && t.is_open()
        });
        if already_open {
            // a second signal for an open pair is ignored, not queued
            return Ok(());
        }

        let id = format!("T{}", self.trade_counter.load(Ordering::SeqCst) + 1);
        let request = TradeRequest {
            id,
            advisor_id: advisor_id.to_string(),
            chart_id: chart_id.to_string(),
            signal: if is_long { Signal::Long } else { Signal::Short },
            quantity,
            strategy_id: advice.strategy_id.clone(),
            strategy: advice.config.clone(),
            symbol: chart.config.symbol.clone(),
            who: who.to_string(),
            stream,
        };
        let exchange_info = self.exchange_info.read().await.clone();
        let trade = Trade::initialize(
            request,
            &exchange_info,
            TradeContext {
                provider: self.provider.clone(),
                notifications: self.notifications.clone(),
                prices: self.prices.clone(),
                stats: self.stats.clone(),
            },
        )
        .await?;
        self.trade_counter.fetch_add(1, Ordering::SeqCst);

        let mut trades = self.trades.write().await;
        trades.push(trade);
        // cap retained history; open trades are never dropped
        while trades.len() > TRADE_HISTORY_LIMIT {
            match trades.iter().position(|t| !t.is_open()) {
                Some(index) => {
                    trades.remove(index);
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Quantity of every open trade that will sell back into `asset` on
    /// close: longs whose base asset matches, shorts whose quote asset
    /// matches. An advisory local reservation; the exchange stays the
    /// arbiter of the real balance.
    async fn quantity_locked_by_trades(&self, asset: &str) -> f64 {
        let trades: Vec<Arc<Trade>> = self
            .trades
            .read()
            .await
            .iter()
            .filter(|t| t.is_open())
            .cloned()
            .collect();
        let charts = self.charts.read().await;
        let mut locked = 0.0;
        for trade in trades {
            let Some(chart) = charts.get(&trade.chart_id) else {
                continue;
            };
            let Some(info) = chart.info().await else {
                continue;
            };
            let sells_back = if trade.is_long {
                info.base_asset == asset
            } else {
                info.quote_asset == asset
            };
            if sells_back {
                locked += trade.quantity;
            }
        }
        locked
    }

    async fn resubscribe_trades(&self, chart_id: &str, stream: &ChartStream) {
        let open: Vec<Arc<Trade>> = self
            .trades
            .read()
            .await
            .iter()
            .filter(|t| t.chart_id == chart_id && t.is_open())
            .cloned()
            .collect();
        for trade in open {
            trades::resubscribe(&trade, stream);
        }
    }

    async fn update_funds(&self, update_prices: bool) -> EngineResult<()> {
        if update_prices || self.prices.read().await.is_empty() {
            let fresh = self.provider.retrieve_prices().await?;
            *self.prices.write().await = fresh;
        }
        let balances = self.provider.retrieve_balance().await?;
        let prices = self.prices.read().await.clone();
        let snapshot = funds::calculate_funds(&balances, &prices);
        logger::verbose(
            LogTag::Funds,
            &format!("Estimated value ${:.2}", funds::estimated_value(&snapshot)),
        );
        *self.funds.write().await = snapshot;
        Ok(())
    }

    /// Refresh exchange metadata and funds, pushing symbol-info changes
    /// down to charts and open trades
    async fn refresh_server_info(&self) -> EngineResult<()> {
        let exchange_info = self.provider.retrieve_exchange_info().await?;
        *self.exchange_info.write().await = exchange_info.clone();
        for chart in self.charts.read().await.values() {
            chart.update_info(&exchange_info);
        }
        let open: Vec<Arc<Trade>> = self
            .trades
            .read()
            .await
            .iter()
            .filter(|t| t.is_open())
            .cloned()
            .collect();
        for trade in open {
            trade.update_info(&exchange_info).await;
        }
        self.update_funds(true).await?;
        logger::debug(LogTag::Bot, "Server info updated");
        Ok(())
    }
}

async fn run_notifications(
    state: Arc<BotState>,
    mut receiver: NotificationReceiver,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            notification = receiver.recv() => match notification {
                Some(Notification::CandlesReady { chart_id, candles, is_final }) => {
                    state.analyze_chart(&chart_id, &candles, is_final).await;
                }
                Some(Notification::Advice { advisor_id, chart_id, advice }) => {
                    state.digest_advice(&advisor_id, &chart_id, advice).await;
                }
                Some(Notification::StreamReplaced { chart_id, stream }) => {
                    state.resubscribe_trades(&chart_id, &stream).await;
                }
                Some(Notification::UpdateFunds) => {
                    if let Err(e) = state.update_funds(true).await {
                        logger::warning(LogTag::Funds, &e.to_string());
                    }
                }
                Some(Notification::ChartChanged { chart_id }) => {
                    // display layers subscribe here; headless runs just trace it
                    logger::verbose(LogTag::Chart, &format!("Chart {} changed", chart_id));
                }
                None => return,
            }
        }
    }
}

async fn run_server_info_refresh(state: Arc<BotState>, mut shutdown: watch::Receiver<bool>) {
    let mut wait = Duration::from_secs(SERVER_INFO_REFRESH_SECS);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
                continue;
            }
        }
        match state.refresh_server_info().await {
            Ok(()) => {
                wait = Duration::from_secs(SERVER_INFO_REFRESH_SECS);
            }
            Err(e) => {
                logger::warning(
                    LogTag::Bot,
                    &format!("Unable to update server info: {}", e),
                );
                wait = Duration::from_secs(SERVER_INFO_RETRY_SECS);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdvisorConfig, EngineSettings, ProviderKeys};
    use crate::advisors::Sight;
    use crate::provider::mock::MockProvider;
    use crate::strategies::{StrategyConfig, StrategyParams, TradeConfig};

    fn vsa_config() -> StrategyConfig {
        StrategyConfig {
            trade: TradeConfig {
                profit_target: 2.0,
                stop_loss: 1.0,
                time_to_live: None,
            },
            params: StrategyParams::default(),
        }
    }

    fn test_config(margin: f64) -> Config {
        Config {
            provider: "binance".to_string(),
            keys: ProviderKeys::default(),
            advisors: [(
                "example".to_string(),
                AdvisorConfig {
                    margin,
                    sights: vec![Sight {
                        symbol: "BTCUSDT".to_string(),
                        timeframe: "5m".to_string(),
                        strategies: [("vsa".to_string(), vsa_config())].into_iter().collect(),
                    }],
                },
            )]
            .into_iter()
            .collect(),
            engine: EngineSettings::default(),
        }
    }

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    async fn boot(provider: Arc<MockProvider>, margin: f64) -> Bot {
        let bot = Bot::initialize(&test_config(margin), provider)
            .await
            .unwrap();
        settle().await;
        bot
    }

    fn advice() -> Advice {
        Advice {
            signals: vec![Signal::Long],
            strategy_id: "vsa".to_string(),
            config: vsa_config(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sizing_commits_the_margin_fraction_of_available_funds() {
        let provider = Arc::new(MockProvider::new());
        provider.set_balance("USDT", 1000.0);
        let bot = boot(provider.clone(), 10.0).await;

        let chart_id = bot.chart_ids().await[0].clone();
        bot.state()
            .digest_advice("example", &chart_id, advice())
            .await;
        settle().await;

        // 1000 USDT * 10% = 100 USDT at a quote of 100 -> 1.0 base
        assert_eq!(provider.buys.lock().unwrap().clone(), vec![1.0]);
        let open = bot.open_trades().await;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].quantity, 1.0);
        assert!(open[0].is_long);
    }

    #[tokio::test(start_paused = true)]
    async fn one_open_trade_per_advisor_chart_pair() {
        let provider = Arc::new(MockProvider::new());
        provider.set_balance("USDT", 1000.0);
        let bot = boot(provider.clone(), 10.0).await;
        let chart_id = bot.chart_ids().await[0].clone();

        bot.state()
            .digest_advice("example", &chart_id, advice())
            .await;
        settle().await;
        // second LONG while the first is open: ignored, not queued
        bot.state()
            .digest_advice("example", &chart_id, advice())
            .await;
        settle().await;

        assert_eq!(bot.open_trades().await.len(), 1);
        assert_eq!(provider.buys.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_signal_closes_the_matching_direction() {
        let provider = Arc::new(MockProvider::new());
        provider.set_balance("USDT", 1000.0);
        let bot = boot(provider.clone(), 10.0).await;
        let chart_id = bot.chart_ids().await[0].clone();

        bot.state()
            .digest_advice("example", &chart_id, advice())
            .await;
        settle().await;
        assert_eq!(bot.open_trades().await.len(), 1);

        let close = Advice {
            signals: vec![Signal::CloseLong],
            strategy_id: "vsa".to_string(),
            config: vsa_config(),
        };
        bot.state()
            .digest_advice("example", &chart_id, close)
            .await;
        settle().await;

        assert!(bot.open_trades().await.is_empty());
        assert_eq!(provider.sells.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn close_signal_for_the_other_direction_is_ignored() {
        let provider = Arc::new(MockProvider::new());
        provider.set_balance("USDT", 1000.0);
        let bot = boot(provider.clone(), 10.0).await;
        let chart_id = bot.chart_ids().await[0].clone();

        bot.state()
            .digest_advice("example", &chart_id, advice())
            .await;
        settle().await;

        let close_short = Advice {
            signals: vec![Signal::CloseShort],
            strategy_id: "vsa".to_string(),
            config: vsa_config(),
        };
        bot.state()
            .digest_advice("example", &chart_id, close_short)
            .await;
        settle().await;

        // the long stays open; nothing was sold
        assert_eq!(bot.open_trades().await.len(), 1);
        assert!(provider.sells.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn open_trades_reserve_their_sellback_asset() {
        let provider = Arc::new(MockProvider::new());
        provider.set_balance("USDT", 1000.0);
        provider.set_balance("BTC", 2.0);
        let bot = boot(provider.clone(), 100.0).await;
        let chart_id = bot.chart_ids().await[0].clone();

        // open a LONG: buys 10 BTC-equivalent of quote... quantity 10
        bot.state()
            .digest_advice("example", &chart_id, advice())
            .await;
        settle().await;
        let open = bot.open_trades().await;
        assert_eq!(open.len(), 1);
        let long_quantity = open[0].quantity;

        // a SHORT for the same advisor+chart is blocked by the open
        // trade, so verify the reservation arithmetic directly
        let locked = bot.state().quantity_locked_by_trades("BTC").await;
        assert_eq!(locked, long_quantity);
        assert_eq!(bot.state().quantity_locked_by_trades("USDT").await, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn no_funds_means_no_order() {
        let provider = Arc::new(MockProvider::new());
        // no USDT balance at all
        let bot = boot(provider.clone(), 10.0).await;
        let chart_id = bot.chart_ids().await[0].clone();

        bot.state()
            .digest_advice("example", &chart_id, advice())
            .await;
        settle().await;

        assert!(bot.open_trades().await.is_empty());
        assert!(provider.buys.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_advisors_is_fatal() {
        let provider = Arc::new(MockProvider::new());
        let mut config = test_config(10.0);
        config.advisors.clear();
        assert!(Bot::initialize(&config, provider).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn broken_advisors_are_skipped_not_fatal() {
        let provider = Arc::new(MockProvider::new());
        provider.set_balance("USDT", 1000.0);
        let mut config = test_config(10.0);
        // margin out of range: this advisor fails validation
        config.advisors.insert(
            "reckless".to_string(),
            AdvisorConfig {
                margin: 150.0,
                sights: vec![Sight {
                    symbol: "BTCUSDT".to_string(),
                    timeframe: "5m".to_string(),
                    strategies: BTreeMap::new(),
                }],
            },
        );
        let bot = Bot::initialize(&config, provider).await.unwrap();
        settle().await;
        assert!(bot.state().advisors.read().await.contains_key("example"));
        assert!(!bot.state().advisors.read().await.contains_key("reckless"));
    }

    #[tokio::test(start_paused = true)]
    async fn identical_sights_share_one_chart() {
        let provider = Arc::new(MockProvider::new());
        let mut config = test_config(10.0);
        let second = config.advisors["example"].clone();
        config.advisors.insert("mirror".to_string(), second);
        let bot = Bot::initialize(&config, provider).await.unwrap();
        settle().await;
        assert_eq!(bot.chart_ids().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_open_trades() {
        let provider = Arc::new(MockProvider::new());
        provider.set_balance("USDT", 1000.0);
        let bot = boot(provider.clone(), 10.0).await;
        let chart_id = bot.chart_ids().await[0].clone();

        bot.state()
            .digest_advice("example", &chart_id, advice())
            .await;
        settle().await;
        assert_eq!(bot.open_trades().await.len(), 1);

        bot.shutdown().await;
        settle().await;
        assert!(bot.open_trades().await.is_empty());
        let open = bot.state().trades.read().await.clone();
        assert_eq!(open[0].close_reason().await, Some(CloseReason::Expire));
    }
}
