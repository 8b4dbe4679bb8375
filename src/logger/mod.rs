//! Structured logging for candlebot
//!
//! Provides a small, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via --debug-<module> flags
//! - Colored console output with aligned tag/level columns
//!
//! ## Usage
//!
//! ```rust
//! use candlebot::logger::{self, LogTag};
//!
//! logger::error(LogTag::Provider, "Connection failed");
//! logger::warning(LogTag::Chart, "Feed frozen, restarting");
//! logger::info(LogTag::Trade, "Position opened");
//! logger::debug(LogTag::Advisor, "Signals: ..."); // Only with --debug-advisor
//! ```
//!
//! Call `logger::init()` once at startup before any logging occurs.

mod config;
mod format;
mod levels;
mod tags;

pub use config::{init_from_args, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system
///
/// Scans command-line arguments for --debug-<module> / --verbose / --quiet
/// flags and configures filtering. Call once in main before starting
/// services.
pub fn init() {
    config::init_from_args();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (shown unless --quiet)
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level, gated by --debug-<module> for the tag
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level, gated by --verbose
pub fn verbose(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Verbose, message);
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !config::should_log(&tag, level) {
        return;
    }
    format::format_and_log(tag, level, message);
}

/// Flush pending console writes; call during shutdown
pub fn flush() {
    use std::io::Write;
    let _ = std::io::stdout().flush();
}
