use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, ExchangeClient, MarketEvent, SchedulerCommand, TradingMode};
use engine::{
    BinanceClient, BinanceStream, LogObserver, Scheduler, SchedulerHandle, TraderConfig,
    TraderEngine, TraderFileConfig,
};
use paper::PaperClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("invalid environment")?;
    let traders = TraderFileConfig::load(&cfg.trader_config_path)
        .with_context(|| format!("failed to load {}", cfg.trader_config_path))?;
    info!(
        mode = %cfg.trading_mode,
        traders = traders.traders.len(),
        "Scalper starting"
    );

    // ── One scheduler per pair ────────────────────────────────────────────────
    let mut handles: Vec<SchedulerHandle> = Vec::new();
    let mut tasks: Vec<JoinHandle<TraderEngine>> = Vec::new();

    for trader in traders.traders {
        let client = exchange_client(&cfg, &trader)?;
        let engine = TraderEngine::new(trader, client);
        let (scheduler, handle) = Scheduler::new(engine, LogObserver);
        handles.push(handle);
        tasks.push(tokio::spawn(scheduler.run()));
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    info!("Shutdown requested");

    for handle in &handles {
        handle.send(SchedulerCommand::Stop).await;
    }
    for task in tasks {
        match task.await {
            Ok(engine) => info!(
                pair = %engine.pair(),
                phase = ?engine.state().phase(),
                "Trader stopped"
            ),
            Err(e) => warn!(error = %e, "Scheduler task failed"),
        }
    }

    Ok(())
}

/// Live mode talks to Binance directly. Paper mode simulates fills against a
/// live market-data stream.
fn exchange_client(cfg: &Config, trader: &TraderConfig) -> anyhow::Result<Arc<dyn ExchangeClient>> {
    match cfg.trading_mode {
        TradingMode::Live => {
            info!(pair = %trader.pair(), "Live trading mode, using BinanceClient");
            let client = BinanceClient::new(
                trader,
                &cfg.binance_api_key,
                &cfg.binance_secret,
                &cfg.binance_rest_url,
            )?;
            Ok(Arc::new(client))
        }
        TradingMode::Paper => {
            info!(
                pair = %trader.pair(),
                slippage_bps = cfg.paper_slippage_bps,
                "Paper trading mode, using PaperClient"
            );
            let client = Arc::new(PaperClient::new(
                trader.pair(),
                cfg.paper_base_balance,
                cfg.paper_slippage_bps,
            ));

            let (market_tx, market_rx) = broadcast::channel::<MarketEvent>(1024);
            let stream = BinanceStream::new(
                trader.pair(),
                trader.order_book_depth,
                &cfg.binance_ws_url,
                market_tx,
            );
            tokio::spawn(stream.run());
            tokio::spawn(feed_paper(client.clone(), market_rx));

            Ok(client)
        }
    }
}

async fn feed_paper(client: Arc<PaperClient>, mut market_rx: broadcast::Receiver<MarketEvent>) {
    loop {
        match market_rx.recv().await {
            Ok(event) => client.apply(&event).await,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(pair = %client.pair(), skipped = n, "Paper feed lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
