//! BlueChip - headless market client.
//!
//! Runs the synchronization engine and logs a portfolio summary whenever
//! the market snapshot changes.

use bluechip::{Config, Engine, MarketSnapshot, Result, valuate};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let log_dir = bluechip::config::log_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "bluechip.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bluechip=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    // Load configuration
    let config = Config::load_or_default()?;
    info!("Using market at {}", config.api.base_url);

    let engine = Engine::new(config)?;
    engine.start();

    if !engine.is_authenticated() {
        match (
            std::env::var("BLUECHIP_USERNAME"),
            std::env::var("BLUECHIP_PASSWORD"),
        ) {
            (Ok(username), Ok(password)) => {
                if let Err(e) = engine.login(&username, &password).await {
                    error!("Login failed: {}", e.user_message());
                }
            }
            _ => warn!("No session; set BLUECHIP_USERNAME and BLUECHIP_PASSWORD to log in"),
        }
    }

    let mut updates = WatchStream::new(engine.subscribe());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(snapshot) = updates.next() => log_summary(&snapshot),
            _ = &mut shutdown => break,
        }
    }

    engine.shutdown();
    info!("Bye");
    Ok(())
}

fn log_summary(snapshot: &MarketSnapshot) {
    let valuation = valuate(snapshot);
    match valuation.net_worth {
        Some(net_worth) => info!(
            listings = snapshot.listings.len(),
            positions = valuation.assets.len(),
            cash = %valuation.cash.unwrap_or_default().round_dp(2),
            pnl = %valuation.total_pnl.round_dp(2),
            "Net worth {}",
            net_worth.round_dp(2)
        ),
        None => info!(listings = snapshot.listings.len(), "Net worth unavailable"),
    }
}
