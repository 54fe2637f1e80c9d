use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use vigil::{Bot, Config, ConsoleTransport, Indicator, SystemClock, logging};

/// Vigil - watches server logs and announces status over a chat transport
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Seconds between forced presence re-broadcasts
    #[arg(long)]
    heartbeat: Option<i64>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(heartbeat) = args.heartbeat {
        config.presence_heartbeat = heartbeat;
    }

    logging::init(&config.log_path, &config.log_name)?;

    let mut bot = Bot::new(
        &config,
        ConsoleTransport,
        default_status,
        Arc::new(SystemClock),
    )?;

    // Ctrl-C is the terminate signal for the console transport
    let cancel = bot.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    bot.run().await;
    Ok(())
}

/// Base status shown when no provider is configured
fn default_status() -> (Indicator, String) {
    (Indicator::Available, String::new())
}
