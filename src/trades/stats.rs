// Running trade statistics, reconciled on every open and close

use super::trade::{CloseReason, TradePnl};
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct TradeStats {
    inner: Mutex<StatsInner>,
}

#[derive(Debug, Default, Clone, Serialize)]
struct StatsInner {
    opened: u32,
    closed: u32,
    wins: u32,
    losses: u32,
    stops: u32,
    targets: u32,
    expiries: u32,
    realized_net_dollars: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub opened: u32,
    pub closed: u32,
    pub wins: u32,
    pub losses: u32,
    pub stops: u32,
    pub targets: u32,
    pub expiries: u32,
    pub realized_net_dollars: f64,
    pub win_rate: f64,
}

impl TradeStats {
    pub fn record_open(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.opened += 1;
        }
    }

    pub fn record_close(&self, reason: CloseReason, pnl: &TradePnl) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed += 1;
            if pnl.net > 0.0 {
                inner.wins += 1;
            } else {
                inner.losses += 1;
            }
            match reason {
                CloseReason::Stop => inner.stops += 1,
                CloseReason::Target => inner.targets += 1,
                CloseReason::Expire => inner.expiries += 1,
                CloseReason::Signal => {}
            }
            inner.realized_net_dollars += pnl.net;
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self
            .inner
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default();
        let win_rate = if inner.closed > 0 {
            inner.wins as f64 / inner.closed as f64
        } else {
            0.0
        };
        StatsSnapshot {
            opened: inner.opened,
            closed: inner.closed,
            wins: inner.wins,
            losses: inner.losses,
            stops: inner.stops,
            targets: inner.targets,
            expiries: inner.expiries,
            realized_net_dollars: inner.realized_net_dollars,
            win_rate,
        }
    }
}
