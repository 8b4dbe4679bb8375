/// Global constants used across candlebot
///
/// System-wide values that are not configurable per run and are shared
/// by multiple modules.

/// Maximum number of candles kept in a chart buffer
pub const MAX_CANDLES: usize = 500;

/// Minimum spacing between exchange requests (shared limiter)
pub const EXCHANGE_MIN_SPACING_MS: u64 = 300;

/// Base backoff for chart stream retries; multiplied by the attempt count
pub const CHART_RETRY_BASE_SECS: u64 = 60;

/// Fixed backoff between trade close retries
pub const TRADE_CLOSE_RETRY_SECS: u64 = 60;

/// Watchdog tick while a chart is enabled
pub const CHART_WATCHDOG_SECS: u64 = 60;

/// Interval between exchange info / funds refreshes
pub const SERVER_INFO_REFRESH_SECS: u64 = 60 * 30;

/// Backoff after a failed server info refresh
pub const SERVER_INFO_RETRY_SECS: u64 = 60;

/// Most recent trades retained for inspection (closed trades beyond this
/// are dropped, open trades are never dropped)
pub const TRADE_HISTORY_LIMIT: usize = 50;

/// Capacity of the per-chart live candle broadcast
pub const CHART_STREAM_CAPACITY: usize = 64;
