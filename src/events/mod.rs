//! In-process notifications between the engine components
//!
//! Charts and trades publish onto a single unbounded channel owned by the
//! orchestrator, which routes each notification to analysis, trade
//! management or the display layer. Senders are cheap clones handed to
//! every component at construction.

use crate::advisors::Advice;
use crate::charts::config::ChartId;
use crate::charts::stream::ChartStream;
use crate::charts::types::Candle;
use tokio::sync::mpsc;

#[derive(Debug)]
pub enum Notification {
    /// A chart's buffer changed; display layers may re-render
    ChartChanged { chart_id: ChartId },
    /// A final candle landed on a chart with attached strategies.
    /// `candles` is a newest-first snapshot of the buffer.
    CandlesReady {
        chart_id: ChartId,
        candles: Vec<Candle>,
        is_final: bool,
    },
    /// A chart (re)enabled and its previous stream was severed; open
    /// trades on the chart must re-attach their watchers
    StreamReplaced { chart_id: ChartId, stream: ChartStream },
    /// A strategy produced signals for an advisor's chart
    Advice {
        advisor_id: String,
        chart_id: ChartId,
        advice: Advice,
    },
    /// A fill happened somewhere; the orchestrator should refresh the
    /// funds snapshot
    UpdateFunds,
}

pub type NotificationSender = mpsc::UnboundedSender<Notification>;
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;

pub fn channel() -> (NotificationSender, NotificationReceiver) {
    mpsc::unbounded_channel()
}
