use stockbot::api::{BridgeClient, BrokerGateway, FillFeed};
use stockbot::config::BotConfig;
use stockbot::history::HistoryFetcher;
use stockbot::persistence::{load_candidates, load_universe, save_candidates, SeriesStore};
use stockbot::reconciler::FillReconciler;
use stockbot::scheduler::{BotState, OrderScheduler, SchedulerConfig};
use stockbot::screener::{ScreenConfig, Screener};
use stockbot::Result;

use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration};

#[derive(Parser)]
#[command(name = "stockbot", about = "Golden-cross screener and order bot")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full bot: screening, order ticks, fill reconciliation
    Run,
    /// Run one screening pass over the universe and exit
    Screen,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = BotConfig::from_env();

    match cli.command.unwrap_or(Command::Run) {
        Command::Screen => screen_once(&config).await,
        Command::Run => run(config).await,
    }
}

fn setup_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "stockbot=info".to_string()),
        )
        .init();
}

async fn screen_once(config: &BotConfig) -> Result<()> {
    let bridge = BridgeClient::new(config.bridge_url.clone());
    let count = run_screening_pass(config, &bridge).await?;
    tracing::info!(candidates = count, "screening pass complete");
    Ok(())
}

async fn run(config: BotConfig) -> Result<()> {
    tracing::info!("🚀 StockBot starting");
    tracing::info!("  Bridge: {}", config.bridge_url);
    tracing::info!("  Buy amount: {}", config.buy_amount);
    tracing::info!("  Deviation threshold: {}", config.deviation_threshold);

    let bridge = Arc::new(BridgeClient::new(config.bridge_url.clone()));
    let gateway: Arc<dyn BrokerGateway> = bridge.clone();

    // Seed held instruments from the account before anything trades
    let held: HashSet<String> = match gateway.holdings().await {
        Ok(positions) => positions.into_iter().map(|p| p.stock_code).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "holdings unavailable at startup, assuming none");
            HashSet::new()
        }
    };
    tracing::info!(held = held.len(), "account holdings loaded");

    // Candidates from the last pass survive restarts via the candidate file
    let candidates = load_candidates(&config.candidate_file)?;
    let mut initial_state = BotState::new();
    initial_state.held = held.clone();
    initial_state.registry.replace_all(candidates, &held);
    tracing::info!(
        candidates = initial_state.registry.len(),
        "candidate registry seeded"
    );

    let state = Arc::new(Mutex::new(initial_state));

    // Loop 1: periodic screening pass over the whole universe
    let screening_task = {
        let state = state.clone();
        let bridge = bridge.clone();
        let config = config.clone();
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(config.screen_interval_secs));
            loop {
                ticker.tick().await;
                match run_screening_pass(&config, bridge.as_ref()).await {
                    Ok(count) => {
                        let candidates = match load_candidates(&config.candidate_file) {
                            Ok(c) => c,
                            Err(e) => {
                                tracing::error!(error = %e, "candidate file unreadable after pass");
                                continue;
                            }
                        };
                        let mut st = state.lock().await;
                        let held = st.held.clone();
                        st.registry.replace_all(candidates, &held);
                        tracing::info!(candidates = count, "registry refreshed");
                    }
                    Err(e) => tracing::error!(error = %e, "screening pass failed"),
                }
            }
        })
    };

    // Loop 2: order scheduling tick
    let trading_task = {
        let scheduler = OrderScheduler::new(
            state.clone(),
            gateway.clone(),
            SchedulerConfig {
                buy_amount: config.buy_amount,
                deviation_threshold: config.deviation_threshold,
            },
        );
        let tick_secs = config.tick_interval_secs;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(tick_secs));
            loop {
                ticker.tick().await;
                let outcome = scheduler.tick().await;
                tracing::debug!(?outcome, "tick");
            }
        })
    };

    // Loop 3: fill polling and reconciliation
    let fill_task = {
        let reconciler = FillReconciler::new(state.clone(), gateway.clone());
        let feed = bridge.clone();
        let tick_secs = config.tick_interval_secs;
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(tick_secs));
            loop {
                ticker.tick().await;
                match feed.poll_fills().await {
                    Ok(fills) => {
                        for fill in &fills {
                            reconciler.on_fill(fill).await;
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "fill poll failed"),
                }
            }
        })
    };

    tracing::info!("✅ All loops running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        result = screening_task => {
            tracing::error!("Screening loop exited: {:?}", result);
        }
        result = trading_task => {
            tracing::error!("Trading loop exited: {:?}", result);
        }
        result = fill_task => {
            tracing::error!("Fill loop exited: {:?}", result);
        }
    }

    tracing::info!("👋 StockBot stopped");
    Ok(())
}

/// One screening pass: refresh each instrument's daily history through
/// the bridge, persist it, screen it, and write the candidate file.
/// Instruments whose history cannot be refreshed fall back to whatever
/// the store already has.
async fn run_screening_pass(config: &BotConfig, bridge: &BridgeClient) -> Result<usize> {
    let codes = load_universe(&config.universe_file)?;
    let store = SeriesStore::new(&config.data_dir);
    let fetcher = HistoryFetcher::new(bridge.clone());
    let screener = Screener::new(ScreenConfig::default());

    let mut histories = Vec::new();
    for code in &codes {
        match fetcher.fetch_daily_series(code).await {
            Ok(series) => {
                if let Err(e) = store.save(&series) {
                    tracing::warn!(stock_code = %code, error = %e, "failed to persist history");
                }
                histories.push(series);
            }
            Err(e) => {
                tracing::warn!(stock_code = %code, error = %e, "history refresh failed");
                match store.load(code) {
                    Ok(Some(series)) => histories.push(series),
                    Ok(None) => tracing::debug!(stock_code = %code, "no stored history, skipping"),
                    Err(e) => tracing::warn!(stock_code = %code, error = %e, "stored history unreadable"),
                }
            }
        }
    }

    let candidates = screener.screen_universe(&histories);
    save_candidates(&config.candidate_file, &candidates)?;
    Ok(candidates.len())
}
