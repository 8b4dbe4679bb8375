/// Log tags identifying the module a message came from
///
/// Each tag maps to a --debug-<key> command line flag and a fixed console
/// color so interleaved output from the monitor tasks stays readable.

use colored::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    Bot,
    Chart,
    Advisor,
    Strategy,
    Trade,
    Provider,
    Funds,
    Config,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::Bot => "BOT",
            LogTag::Chart => "CHART",
            LogTag::Advisor => "ADVISOR",
            LogTag::Strategy => "STRATEGY",
            LogTag::Trade => "TRADE",
            LogTag::Provider => "PROVIDER",
            LogTag::Funds => "FUNDS",
            LogTag::Config => "CONFIG",
        }
    }

    /// Key used by the --debug-<key> command line flag
    pub fn debug_key(&self) -> &'static str {
        match self {
            LogTag::Bot => "bot",
            LogTag::Chart => "chart",
            LogTag::Advisor => "advisor",
            LogTag::Strategy => "strategy",
            LogTag::Trade => "trade",
            LogTag::Provider => "provider",
            LogTag::Funds => "funds",
            LogTag::Config => "config",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            LogTag::Bot => Color::White,
            LogTag::Chart => Color::Cyan,
            LogTag::Advisor => Color::Blue,
            LogTag::Strategy => Color::Magenta,
            LogTag::Trade => Color::Yellow,
            LogTag::Provider => Color::Green,
            LogTag::Funds => Color::BrightGreen,
            LogTag::Config => Color::BrightBlack,
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
