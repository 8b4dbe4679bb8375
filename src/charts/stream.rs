// Per-chart live candle fan-out
//
// Each enable() of a chart creates a fresh ChartStream; dropping it severs
// every subscriber, which is how trade watchers learn their stream died and
// wait for the replacement.

use crate::charts::types::Candle;
use crate::constants::CHART_STREAM_CAPACITY;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct ChartStream {
    tx: broadcast::Sender<Candle>,
}

impl ChartStream {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHART_STREAM_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Candle> {
        self.tx.subscribe()
    }

    pub fn publish(&self, candle: Candle) {
        // No receivers is fine; charts publish whether or not trades listen
        let _ = self.tx.send(candle);
    }
}

impl Default for ChartStream {
    fn default() -> Self {
        Self::new()
    }
}
