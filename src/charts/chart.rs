//! Live candle state machine
//!
//! One actor task per chart owns every piece of chart-mutable state: the
//! rolling buffer, the frozen flag and the known-gap set. Stream events,
//! watchdog ticks and control commands all pass through the actor's select
//! loop, so handlers for one chart never run concurrently.
//!
//! Lifecycle: starting -> enabled -> (error) -> restarting -> enabled,
//! with linear backoff on start failures (60s x attempt, reset once a
//! stream comes up). Disabling severs the stream subscription and the
//! watchdog; it never touches trade watchers, which re-attach to the
//! replacement stream announced by the stream-replaced notification.

use crate::charts::config::{ChartConfig, ChartId};
use crate::charts::stream::ChartStream;
use crate::charts::types::{Candle, Direction};
use crate::constants::{CHART_RETRY_BASE_SECS, CHART_WATCHDOG_SECS};
use crate::errors::EngineError;
use crate::events::{Notification, NotificationSender};
use crate::indicators;
use crate::logger::{self, LogTag};
use crate::provider::types::{content_hash, CandleStream, ExchangeInfo, StreamEvent, SymbolInfo};
use crate::provider::Provider;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Everything a chart needs from its surroundings
#[derive(Clone)]
pub struct ChartContext {
    pub provider: Arc<dyn Provider>,
    pub notifications: NotificationSender,
    pub max_candles: usize,
}

pub struct Chart {
    pub id: ChartId,
    pub name: String,
    pub config: Arc<ChartConfig>,
    shared: Arc<ChartShared>,
    commands: mpsc::UnboundedSender<ChartCommand>,
}

struct ChartShared {
    candles: RwLock<Vec<Candle>>,
    info: RwLock<Option<SymbolInfo>>,
    stream: RwLock<Option<ChartStream>>,
    enabled: AtomicBool,
}

enum ChartCommand {
    UpdateInfo(SymbolInfo),
    Disable,
}

impl Chart {
    /// Build the chart and start its actor. Always resolves: a failing
    /// stream start is logged and retried inside the actor so sibling
    /// charts keep loading.
    pub fn initialize(
        config: ChartConfig,
        exchange_info: &ExchangeInfo,
        ctx: ChartContext,
    ) -> Arc<Chart> {
        let id = config.id();
        let name = config.display_name();
        let info = exchange_info.find(&config.symbol).cloned();
        if info.is_none() {
            logger::warning(
                LogTag::Chart,
                &format!("Chart {}: symbol info not available", name),
            );
        }
        let shared = Arc::new(ChartShared {
            candles: RwLock::new(Vec::new()),
            info: RwLock::new(info),
            stream: RwLock::new(None),
            enabled: AtomicBool::new(false),
        });
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let chart = Arc::new(Chart {
            id: id.clone(),
            name: name.clone(),
            config: Arc::new(config),
            shared: shared.clone(),
            commands: command_tx,
        });
        let actor = ChartActor {
            id,
            name: name.clone(),
            config: chart.config.clone(),
            shared,
            ctx,
            commands: command_rx,
            retries: 0,
            missing: Vec::new(),
        };
        tokio::spawn(actor.run());
        logger::info(LogTag::Chart, &format!("Added chart {}", name));
        chart
    }

    pub fn enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::SeqCst)
    }

    /// Snapshot of the buffer, oldest first
    pub async fn candles(&self) -> Vec<Candle> {
        self.shared.candles.read().await.clone()
    }

    pub async fn info(&self) -> Option<SymbolInfo> {
        self.shared.info.read().await.clone()
    }

    /// Handle to the current live stream, if enabled
    pub async fn stream(&self) -> Option<ChartStream> {
        self.shared.stream.read().await.clone()
    }

    /// Push fresh exchange metadata; the chart restarts itself if the
    /// resolved symbol info content changed
    pub fn update_info(&self, exchange_info: &ExchangeInfo) {
        if let Some(info) = exchange_info.find(&self.config.symbol) {
            let _ = self.commands.send(ChartCommand::UpdateInfo(info.clone()));
        }
    }

    /// Permanent teardown
    pub fn disable(&self) {
        let _ = self.commands.send(ChartCommand::Disable);
    }
}

enum LoopExit {
    Restart,
    Disabled,
}

struct ChartActor {
    id: ChartId,
    name: String,
    config: Arc<ChartConfig>,
    shared: Arc<ChartShared>,
    ctx: ChartContext,
    commands: mpsc::UnboundedReceiver<ChartCommand>,
    retries: u32,
    missing: Vec<i64>,
}

impl ChartActor {
    async fn run(mut self) {
        loop {
            let stream = match self.start().await {
                Ok(stream) => stream,
                Err(e) => {
                    self.retries += 1;
                    let wait = CHART_RETRY_BASE_SECS * self.retries as u64;
                    logger::error(
                        LogTag::Chart,
                        &format!(
                            "Chart {}: {}, retrying in {}m",
                            self.name,
                            e,
                            wait / 60
                        ),
                    );
                    if !self.backoff(Duration::from_secs(wait)).await {
                        self.teardown().await;
                        return;
                    }
                    continue;
                }
            };
            match self.enabled_loop(stream).await {
                LoopExit::Restart => {
                    self.disable_marks().await;
                }
                LoopExit::Disabled => {
                    self.teardown().await;
                    return;
                }
            }
        }
    }

    async fn start(&mut self) -> Result<CandleStream, EngineError> {
        let info = self
            .shared
            .info
            .read()
            .await
            .clone()
            .ok_or_else(|| EngineError::Data("Info not available".to_string()))?;
        let tick_size = info
            .tick_size()
            .ok_or_else(|| EngineError::Data("Tick size not available".to_string()))?;
        self.ctx.provider.retrieve_stream(&self.config, tick_size).await
    }

    async fn enabled_loop(&mut self, mut rx: CandleStream) -> LoopExit {
        self.retries = 0;
        let stream = ChartStream::new();
        *self.shared.stream.write().await = Some(stream.clone());
        self.shared.enabled.store(true, Ordering::SeqCst);
        let _ = self.ctx.notifications.send(Notification::StreamReplaced {
            chart_id: self.id.clone(),
            stream: stream.clone(),
        });

        let mut frozen = false;
        let mut watchdog = tokio::time::interval(Duration::from_secs(CHART_WATCHDOG_SECS));
        watchdog.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        watchdog.tick().await;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(StreamEvent::Backfill(batch)) => {
                        self.install_backfill(batch).await;
                    }
                    Some(StreamEvent::Update(candle)) => {
                        frozen = false;
                        self.apply_live_update(candle, &stream).await;
                    }
                    None => {
                        logger::error(
                            LogTag::Chart,
                            &format!("Stream closed, restarting {}", self.name),
                        );
                        return LoopExit::Restart;
                    }
                },
                _ = watchdog.tick() => {
                    if !self.ctx.provider.ping().await {
                        continue;
                    }
                    if let Err(e) = self.watchdog_check(&mut frozen).await {
                        logger::warning(
                            LogTag::Chart,
                            &format!("{}, restarting {}", e, self.name),
                        );
                        return LoopExit::Restart;
                    }
                },
                command = self.commands.recv() => match command {
                    Some(ChartCommand::UpdateInfo(info)) => {
                        if self.swap_info(info).await {
                            logger::info(
                                LogTag::Chart,
                                &format!("Chart info updated, restarting {}", self.name),
                            );
                            return LoopExit::Restart;
                        }
                    }
                    Some(ChartCommand::Disable) | None => return LoopExit::Disabled,
                },
            }
        }
    }

    async fn install_backfill(&mut self, mut batch: Vec<Candle>) {
        while batch.len() > self.ctx.max_candles {
            batch.remove(0);
        }
        if let Err(e) = indicators::with_indicators(&mut batch, &self.config.indicators) {
            logger::error(LogTag::Chart, &format!("Chart {}: {}", self.name, e));
        }
        *self.shared.candles.write().await = batch;
        let _ = self.ctx.notifications.send(Notification::ChartChanged {
            chart_id: self.id.clone(),
        });
    }

    async fn apply_live_update(&mut self, candle: Candle, stream: &ChartStream) {
        let mut buffer = self.shared.candles.read().await.clone();
        let is_final = candle.is_final;
        apply_update(&mut buffer, candle.clone(), self.ctx.max_candles);
        let indicators_ok =
            match indicators::with_indicators(&mut buffer, &self.config.indicators) {
                Ok(()) => true,
                Err(e) => {
                    logger::error(LogTag::Chart, &format!("Chart {}: {}", self.name, e));
                    false
                }
            };
        let snapshot = buffer.clone();
        *self.shared.candles.write().await = buffer;

        stream.publish(candle);

        if is_final && indicators_ok && !self.config.strategies.is_empty() {
            let mut window = snapshot;
            window.reverse();
            let _ = self.ctx.notifications.send(Notification::CandlesReady {
                chart_id: self.id.clone(),
                candles: window,
                is_final,
            });
        }
        let _ = self.ctx.notifications.send(Notification::ChartChanged {
            chart_id: self.id.clone(),
        });
    }

    /// One watchdog pass. An error means the feed is unhealthy and the
    /// chart must restart.
    async fn watchdog_check(&mut self, frozen: &mut bool) -> Result<(), EngineError> {
        if *frozen {
            // no update since the previous tick
            return Err(EngineError::Data("Chart frozen".to_string()));
        }
        *frozen = true;

        let candles = self.shared.candles.read().await;
        if candles.len() > 1 {
            let interval = self.config.timeframe.to_millis();
            let gaps = find_gaps(&candles, interval);
            if !gaps.is_empty() {
                // only a new gap set triggers a restart; re-detecting the
                // same one would restart-loop over an exchange-side hole
                if gaps != self.missing {
                    self.missing = gaps;
                    return Err(EngineError::Data(format!(
                        "Missing candle(s) after {:?}",
                        self.missing
                    )));
                }
            } else if !self.missing.is_empty() {
                self.missing.clear();
            }
        }
        Ok(())
    }

    /// Returns true if the info content actually changed
    async fn swap_info(&mut self, info: SymbolInfo) -> bool {
        let mut current = self.shared.info.write().await;
        let changed = match current.as_ref() {
            Some(existing) => content_hash(existing) != content_hash(&info),
            None => false,
        };
        let had_info = current.is_some();
        *current = Some(info);
        changed && had_info
    }

    async fn disable_marks(&mut self) {
        self.shared.enabled.store(false, Ordering::SeqCst);
        *self.shared.stream.write().await = None;
    }

    async fn teardown(&mut self) {
        self.disable_marks().await;
        logger::info(LogTag::Chart, &format!("Disabled chart {}", self.name));
    }

    /// Sleep through the retry backoff while still honoring commands.
    /// Returns false when the chart was disabled meanwhile.
    async fn backoff(&mut self, wait: Duration) -> bool {
        let sleep = tokio::time::sleep(wait);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                command = self.commands.recv() => match command {
                    Some(ChartCommand::UpdateInfo(info)) => {
                        self.swap_info(info).await;
                    }
                    Some(ChartCommand::Disable) | None => return false,
                },
            }
        }
    }
}

/// Fold one live candle into the buffer: append when the newest buffered
/// candle is final (trimming from the oldest end), otherwise replace the
/// forming candle in place and derive its direction from the previous
/// candle's close.
pub(crate) fn apply_update(buffer: &mut Vec<Candle>, mut candle: Candle, max: usize) {
    match buffer.last() {
        None => {
            buffer.push(candle);
        }
        Some(last) if last.is_final => {
            if let Some(last) = buffer.last_mut() {
                last.direction = Direction::Unset;
            }
            buffer.push(candle);
            while buffer.len() > max {
                buffer.remove(0);
            }
        }
        Some(_) => {
            let index = buffer.len() - 1;
            candle.direction = if index > 0 {
                let prev_close = buffer[index - 1].close;
                if candle.close > prev_close {
                    Direction::Up
                } else if candle.close < prev_close {
                    Direction::Down
                } else {
                    Direction::Flat
                }
            } else {
                buffer[index].direction
            };
            buffer[index] = candle;
        }
    }
}

/// Open times of candles whose successor is not exactly one timeframe away
pub(crate) fn find_gaps(candles: &[Candle], interval_ms: i64) -> Vec<i64> {
    candles
        .windows(2)
        .filter(|pair| pair[1].time - pair[0].time != interval_ms)
        .map(|pair| pair[0].time)
        .collect()
}
