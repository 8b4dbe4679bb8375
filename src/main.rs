use anyhow::Result;
use candlebot::bot::Bot;
use candlebot::logger::{self, LogTag};
use candlebot::{config, provider};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "candlebot", about = "Advisor-driven candle trading engine")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "candlebot.json")]
    config: PathBuf,
    /// Logging switches (--debug, --debug-<module>, --verbose, --quiet)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    log_flags: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logger::init();

    let config = config::load(&args.config)?;
    let provider = provider::create(&config.provider, &config.keys)?;
    logger::info(
        LogTag::Bot,
        &format!("Provider {} selected", config.provider),
    );

    let bot = Bot::initialize(&config, provider).await?;
    logger::info(LogTag::Bot, "Running, press Ctrl-C to close trades and exit");

    tokio::signal::ctrl_c().await?;
    bot.shutdown().await;
    logger::flush();
    Ok(())
}
