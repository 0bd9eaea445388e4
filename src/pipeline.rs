// =============================================================================
// Pipeline Stages — fetch, compute, write back
// =============================================================================
//
// Each stage is a self-contained async step over the shared store: `ingest`
// refreshes the OHLC table from CoinGecko, `update_sma_rsi` and `update_macd`
// read the closes back in id order, run the pure transforms, and write the
// results to the rows they came from. The compute stages are no-ops on an
// empty table so a failed or skipped ingest never turns into a hard error
// downstream.
// =============================================================================

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::coingecko::CoinGeckoClient;
use crate::config::PipelineConfig;
use crate::indicators::{macd, rsi, sma};
use crate::store::MarketStore;
use crate::types::Coin;

/// Fetch the full OHLC history for `coin` and replace the stored table with
/// it. Returns the number of rows now in the store.
#[instrument(skip_all, fields(coin = %coin), name = "pipeline::ingest")]
pub async fn ingest(
    client: &CoinGeckoClient,
    store: &MarketStore,
    coin: Coin,
    config: &PipelineConfig,
) -> Result<u64> {
    let records = client
        .fetch_history(coin, &config.vs_currency, config.history_days)
        .await
        .context("failed to fetch OHLC history")?;

    let rows = store
        .replace_ohlc(&records)
        .await
        .context("failed to store OHLC history")?;

    info!(rows, "historical data stored");
    Ok(rows)
}

/// Compute SMA and RSI over the stored closes and write them back.
#[instrument(skip_all, name = "pipeline::update_sma_rsi")]
pub async fn update_sma_rsi(store: &MarketStore, config: &PipelineConfig) -> Result<()> {
    let points = store.fetch_close_prices().await?;
    if points.is_empty() {
        warn!("ohlc_data is empty — skipping sma/rsi computation");
        return Ok(());
    }

    let sma_series = sma(&points, config.sma_window)?;
    let rsi_series = rsi(&points, config.rsi_window)?;

    let updated = store.apply_sma_rsi(&sma_series, &rsi_series).await?;
    info!(
        updated,
        sma_defined = sma_series.defined_count(),
        rsi_defined = rsi_series.defined_count(),
        latest_sma = sma_series.value_at(points.len() - 1),
        latest_rsi = rsi_series.value_at(points.len() - 1),
        "sma/rsi updated"
    );
    Ok(())
}

/// Compute MACD and its signal line over the stored closes and write them
/// back.
#[instrument(skip_all, name = "pipeline::update_macd")]
pub async fn update_macd(store: &MarketStore, config: &PipelineConfig) -> Result<()> {
    let points = store.fetch_close_prices().await?;
    if points.is_empty() {
        warn!("ohlc_data is empty — skipping macd computation");
        return Ok(());
    }

    let output = macd(
        &points,
        config.macd_fast,
        config.macd_slow,
        config.macd_signal,
    )?;

    let updated = store.apply_macd(&output).await?;
    info!(
        updated,
        macd_defined = output.macd.defined_count(),
        signal_defined = output.signal.defined_count(),
        latest_macd = output.macd.value_at(points.len() - 1),
        "macd updated"
    );
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OhlcRecord;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_records(closes: &[f64]) -> Vec<OhlcRecord> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcRecord {
                timestamp: Utc.with_ymd_and_hms(2024, 2, 1 + i as u32, 0, 0, 0).unwrap(),
                open: close,
                high: close + 1.0,
                low: close - 1.0,
                close,
            })
            .collect()
    }

    fn small_window_config() -> PipelineConfig {
        PipelineConfig {
            sma_window: 3,
            rsi_window: 3,
            macd_fast: 2,
            macd_slow: 3,
            macd_signal: 2,
            ..PipelineConfig::default()
        }
    }

    async fn seeded_store(closes: &[f64]) -> (TempDir, MarketStore) {
        let dir = TempDir::new().unwrap();
        let store = MarketStore::connect(dir.path().join("test.db")).await.unwrap();
        store.replace_ohlc(&sample_records(closes)).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn sma_rsi_stage_fills_columns_after_warmup() {
        let (_dir, store) = seeded_store(&[10.0, 12.0, 11.0, 13.0, 15.0, 14.0]).await;
        let config = small_window_config();

        update_sma_rsi(&store, &config).await.unwrap();

        let rows = store.fetch_chart_rows().await.unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0].sma, None);
        assert_eq!(rows[1].sma, None);
        assert_eq!(rows[2].sma, Some(11.0));
        assert!(rows[2].rsi.is_some());
        assert_eq!(rows[1].rsi, None);
        // MACD untouched by this stage.
        assert!(rows.iter().all(|r| r.macd.is_none()));
    }

    #[tokio::test]
    async fn macd_stage_fills_columns_after_warmup() {
        let (_dir, store) = seeded_store(&[1.0, 2.0, 3.0, 4.0, 5.0]).await;
        let config = small_window_config();

        update_macd(&store, &config).await.unwrap();

        let rows = store.fetch_chart_rows().await.unwrap();
        assert_eq!(rows[1].macd, None);
        assert!(rows[2].macd.is_some());
        assert_eq!(rows[2].macd_signal, None);
        assert!(rows[3].macd_signal.is_some());
        assert!(rows.iter().all(|r| r.sma.is_none()));
    }

    #[tokio::test]
    async fn compute_stages_are_noops_on_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = MarketStore::connect(dir.path().join("test.db")).await.unwrap();
        let config = small_window_config();

        update_sma_rsi(&store, &config).await.unwrap();
        update_macd(&store, &config).await.unwrap();

        assert!(store.fetch_chart_rows().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_window_surfaces_as_error() {
        let (_dir, store) = seeded_store(&[1.0, 2.0]).await;
        let config = PipelineConfig {
            sma_window: 0,
            ..small_window_config()
        };

        assert!(update_sma_rsi(&store, &config).await.is_err());
    }
}
