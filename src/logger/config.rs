//! Logger filtering configuration
//!
//! Parsed once from process arguments at startup:
//! - `--debug-<module>` enables Debug level for that tag
//! - `--debug` enables Debug level for every tag
//! - `--verbose` enables Verbose level globally
//! - `--quiet` raises the threshold to errors only

use super::levels::LogLevel;
use super::tags::LogTag;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub debug_all: bool,
    pub debug_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_all: false,
            debug_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Parse process arguments into the global logger configuration
pub fn init_from_args() {
    let args: Vec<String> = std::env::args().collect();
    let mut config = LoggerConfig::default();

    for arg in &args {
        match arg.as_str() {
            "--quiet" => config.min_level = LogLevel::Error,
            "--verbose" => config.min_level = LogLevel::Verbose,
            "--debug" => {
                config.debug_all = true;
                if config.min_level < LogLevel::Debug {
                    config.min_level = LogLevel::Debug;
                }
            }
            other => {
                if let Some(key) = other.strip_prefix("--debug-") {
                    config.debug_tags.insert(key.to_string());
                }
            }
        }
    }

    if let Ok(mut current) = LOGGER_CONFIG.write() {
        *current = config;
    }
}

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_default()
}

fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = get_logger_config();
    config.debug_all || config.debug_tags.contains(tag.debug_key())
}

/// Filtering rules:
/// 1. Errors always log
/// 2. Debug requires --debug or --debug-<module> for that tag
/// 3. Verbose requires --verbose
/// 4. Everything else passes the minimum level threshold
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }
    if level == LogLevel::Debug {
        return is_debug_enabled_for_tag(tag);
    }
    let config = get_logger_config();
    if level == LogLevel::Verbose {
        return config.min_level == LogLevel::Verbose;
    }
    level <= config.min_level
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_always_pass() {
        assert!(should_log(&LogTag::Chart, LogLevel::Error));
    }

    #[test]
    fn debug_gated_by_default() {
        assert!(!should_log(&LogTag::Chart, LogLevel::Debug));
        assert!(should_log(&LogTag::Chart, LogLevel::Info));
    }
}
