//! Log formatting and console output
//!
//! Colorized output with a fixed-width `time [TAG] [LEVEL] message` layout
//! so interleaved monitor-task output lines up. Broken pipes (piped and
//! truncated output) are swallowed rather than panicking.

use super::levels::LogLevel;
use super::tags::LogTag;
use chrono::Local;
use colored::Colorize;
use std::io::{stdout, ErrorKind, Write};

const TAG_WIDTH: usize = 8;
const LEVEL_WIDTH: usize = 7;

pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let tag_str = format!("{:<width$}", tag.as_str(), width = TAG_WIDTH)
        .color(tag.color())
        .to_string();
    let level_str = {
        let padded = format!("{:<width$}", level.as_str(), width = LEVEL_WIDTH);
        match level {
            LogLevel::Error => padded.red().bold().to_string(),
            LogLevel::Warning => padded.yellow().to_string(),
            LogLevel::Info => padded.normal().to_string(),
            LogLevel::Debug => padded.bright_black().to_string(),
            LogLevel::Verbose => padded.bright_black().dimmed().to_string(),
        }
    };

    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag_str,
        level_str,
        message
    );
    print_stdout_safe(&line);
}

fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() == ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
    }
}
