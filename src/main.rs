// =============================================================================
// Borealis — Main Entry Point
// =============================================================================
//
// One end-to-end pipeline run: fetch OHLC history for a single coin, persist
// it, compute SMA / RSI / MACD over the stored closes, write the values back
// to their rows, and show the chart. The run is linear; every stage logs what
// it did.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod chart;
mod coingecko;
mod config;
mod indicators;
mod pipeline;
mod store;
mod types;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::chart::ChartData;
use crate::coingecko::CoinGeckoClient;
use crate::config::PipelineConfig;
use crate::store::MarketStore;
use crate::types::Coin;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Borealis Indicator Pipeline — Starting Up         ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = PipelineConfig::load("pipeline_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        PipelineConfig::default()
    });

    // Override the database path from env if available.
    if let Ok(path) = std::env::var("BOREALIS_DB_PATH") {
        if !path.trim().is_empty() {
            config.db_path = path;
        }
    }

    // ── 2. Resolve the coin to process ───────────────────────────────────
    let coin_arg = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("BOREALIS_COIN").ok())
        .unwrap_or_else(|| "bitcoin".to_string());
    let coin: Coin = coin_arg.parse()?;

    info!(
        coin = %coin,
        vs_currency = %config.vs_currency,
        history_days = config.history_days,
        db_path = %config.db_path,
        "pipeline configured"
    );

    // ── 3. Build client & store ──────────────────────────────────────────
    let api_key = std::env::var("COINGECKO_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty());
    let client = CoinGeckoClient::new(api_key);
    let store = MarketStore::connect(&config.db_path).await?;

    // ── 4. Ingest OHLC history ───────────────────────────────────────────
    pipeline::ingest(&client, &store, coin, &config).await?;

    // ── 5. Compute & store indicators ────────────────────────────────────
    pipeline::update_sma_rsi(&store, &config).await?;
    pipeline::update_macd(&store, &config).await?;

    // ── 6. Chart ─────────────────────────────────────────────────────────
    let rows = store.fetch_chart_rows().await?;
    if rows.is_empty() {
        warn!("no data available to plot — exiting");
        return Ok(());
    }

    info!(rows = rows.len(), "opening chart (press q / Esc to close)");
    let chart = ChartData::prepare(&rows, coin, &config);
    chart.show()?;

    info!("Borealis pipeline run complete.");
    Ok(())
}
