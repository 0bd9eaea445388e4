// =============================================================================
// SQLite Store — OHLC rows and indicator write-back
// =============================================================================
//
// One table, `ohlc_data`, holds the fetched candles plus four nullable
// indicator columns. The row id is the ordering key for the whole pipeline:
// closes are read back ORDER BY id, and every indicator value is written to
// the exact row it was computed from. Missing indicator values round-trip as
// SQL NULL, never as a zero-filled placeholder.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::indicators::{MacdOutput, Series};
use crate::types::{ChartRow, OhlcRecord, PricePoint};

/// SQLite-backed store for one coin's OHLC history and indicators.
#[derive(Debug, Clone)]
pub struct MarketStore {
    pool: SqlitePool,
}

impl MarketStore {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Open (or create) the database file at `path` and ensure the schema
    /// exists.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open sqlite database at {}", path.display()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ohlc_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                open_price REAL NOT NULL,
                high_price REAL NOT NULL,
                low_price REAL NOT NULL,
                close_price REAL NOT NULL,
                sma REAL,
                rsi REAL,
                macd REAL,
                macd_signal REAL
            );
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create ohlc_data table")?;

        debug!(path = %path.display(), "sqlite store ready");
        Ok(Self { pool })
    }

    // -------------------------------------------------------------------------
    // OHLC ingest
    // -------------------------------------------------------------------------

    /// Replace the entire OHLC history with `records`, in fetch order.
    ///
    /// Runs inside a single transaction: the old rows are deleted and the new
    /// ones inserted, so readers never observe a half-refreshed table.
    /// Returns the number of rows inserted. Row ids restart the pipeline's
    /// ordering from scratch on every refresh; indicator columns start NULL.
    #[instrument(skip(self, records), name = "store::replace_ohlc")]
    pub async fn replace_ohlc(&self, records: &[OhlcRecord]) -> Result<u64> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        sqlx::query("DELETE FROM ohlc_data")
            .execute(&mut *tx)
            .await
            .context("failed to clear ohlc_data")?;

        let mut inserted = 0u64;
        for record in records {
            let res = sqlx::query(
                r#"
                INSERT INTO ohlc_data (timestamp, open_price, high_price, low_price, close_price)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.timestamp)
            .bind(record.open)
            .bind(record.high)
            .bind(record.low)
            .bind(record.close)
            .execute(&mut *tx)
            .await
            .context("failed to insert OHLC row")?;
            inserted += res.rows_affected();
        }

        tx.commit().await.context("failed to commit OHLC refresh")?;

        debug!(inserted, "OHLC history replaced");
        Ok(inserted)
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Load (id, timestamp, close) for every row, ordered by id ascending.
    ///
    /// This ordering is the contract the indicator transforms rely on; they
    /// never sort or validate it themselves.
    pub async fn fetch_close_prices(&self) -> Result<Vec<PricePoint>> {
        let rows = sqlx::query_as::<_, (i64, DateTime<Utc>, f64)>(
            r#"
            SELECT id, timestamp, close_price
            FROM ohlc_data
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load close prices")?;

        let points: Vec<PricePoint> = rows
            .into_iter()
            .map(|(id, timestamp, close)| PricePoint {
                id,
                timestamp,
                close,
            })
            .collect();

        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            debug!(
                rows = points.len(),
                from = %first.timestamp,
                to = %last.timestamp,
                "close prices loaded"
            );
        }

        Ok(points)
    }

    /// Load every row with its indicator columns, ordered by id ascending.
    pub async fn fetch_chart_rows(&self) -> Result<Vec<ChartRow>> {
        type Row = (
            i64,
            DateTime<Utc>,
            f64,
            Option<f64>,
            Option<f64>,
            Option<f64>,
            Option<f64>,
        );

        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT id, timestamp, close_price, sma, rsi, macd, macd_signal
            FROM ohlc_data
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load chart rows")?;

        let rows: Vec<ChartRow> = rows
            .into_iter()
            .map(|(id, timestamp, close, sma, rsi, macd, macd_signal)| ChartRow {
                id,
                timestamp,
                close,
                sma,
                rsi,
                macd,
                macd_signal,
            })
            .collect();

        debug!(
            rows = rows.len(),
            last_id = rows.last().map(|r| r.id),
            "chart rows loaded"
        );
        Ok(rows)
    }

    // -------------------------------------------------------------------------
    // Indicator write-back
    // -------------------------------------------------------------------------

    /// Write the SMA and RSI series back to their source rows, keyed by id.
    ///
    /// Both series must come from the same input (same ids in the same
    /// order); a missing value is stored as NULL. Returns the number of rows
    /// updated.
    #[instrument(skip(self, sma, rsi), name = "store::apply_sma_rsi")]
    pub async fn apply_sma_rsi(&self, sma: &Series, rsi: &Series) -> Result<u64> {
        anyhow::ensure!(
            sma.len() == rsi.len(),
            "sma/rsi series length mismatch: {} vs {}",
            sma.len(),
            rsi.len()
        );
        if sma.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let mut updated = 0u64;
        for (s, r) in sma.iter().zip(rsi.iter()) {
            anyhow::ensure!(
                s.id == r.id,
                "sma/rsi series misaligned: id {} vs {}",
                s.id,
                r.id
            );

            let res = sqlx::query("UPDATE ohlc_data SET sma = ?, rsi = ? WHERE id = ?")
                .bind(s.value)
                .bind(r.value)
                .bind(s.id)
                .execute(&mut *tx)
                .await
                .context("failed to update sma/rsi row")?;
            updated += res.rows_affected();
        }

        tx.commit().await.context("failed to commit sma/rsi update")?;

        debug!(updated, "sma/rsi columns written");
        Ok(updated)
    }

    /// Write the MACD and signal series back to their source rows, keyed by
    /// id.
    ///
    /// Both series must come from the same input (same ids in the same
    /// order). Returns the number of rows updated.
    #[instrument(skip(self, output), name = "store::apply_macd")]
    pub async fn apply_macd(&self, output: &MacdOutput) -> Result<u64> {
        anyhow::ensure!(
            output.macd.len() == output.signal.len(),
            "macd/signal series length mismatch: {} vs {}",
            output.macd.len(),
            output.signal.len()
        );
        if output.macd.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let mut updated = 0u64;
        for (m, s) in output.macd.iter().zip(output.signal.iter()) {
            anyhow::ensure!(
                m.id == s.id,
                "macd/signal series misaligned: id {} vs {}",
                m.id,
                s.id
            );

            let res = sqlx::query("UPDATE ohlc_data SET macd = ?, macd_signal = ? WHERE id = ?")
                .bind(m.value)
                .bind(s.value)
                .bind(m.id)
                .execute(&mut *tx)
                .await
                .context("failed to update macd row")?;
            updated += res.rows_affected();
        }

        tx.commit().await.context("failed to commit macd update")?;

        debug!(updated, "macd columns written");
        Ok(updated)
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::sma as compute_sma;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample_records(closes: &[f64]) -> Vec<OhlcRecord> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcRecord {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1 + i as u32, 0, 0, 0).unwrap(),
                open: close - 1.0,
                high: close + 2.0,
                low: close - 2.0,
                close,
            })
            .collect()
    }

    async fn temp_store() -> (TempDir, MarketStore) {
        let dir = TempDir::new().unwrap();
        let store = MarketStore::connect(dir.path().join("test.db")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn replace_then_fetch_roundtrip() {
        let (_dir, store) = temp_store().await;

        let records = sample_records(&[100.0, 101.5, 99.25]);
        let inserted = store.replace_ohlc(&records).await.unwrap();
        assert_eq!(inserted, 3);

        let points = store.fetch_close_prices().await.unwrap();
        assert_eq!(points.len(), 3);
        assert!(points.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(points[0].close, 100.0);
        assert_eq!(points[2].close, 99.25);
        assert_eq!(points[1].timestamp, records[1].timestamp);
    }

    #[tokio::test]
    async fn replace_clears_previous_rows() {
        let (_dir, store) = temp_store().await;

        store.replace_ohlc(&sample_records(&[1.0, 2.0, 3.0])).await.unwrap();
        store.replace_ohlc(&sample_records(&[10.0, 20.0])).await.unwrap();

        let points = store.fetch_close_prices().await.unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].close, 10.0);
        assert!(points[0].id < points[1].id);
    }

    #[tokio::test]
    async fn empty_table_reads_as_empty() {
        let (_dir, store) = temp_store().await;
        assert!(store.fetch_close_prices().await.unwrap().is_empty());
        assert!(store.fetch_chart_rows().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_values_roundtrip_as_null() {
        let (_dir, store) = temp_store().await;
        store
            .replace_ohlc(&sample_records(&[10.0, 20.0, 30.0, 40.0]))
            .await
            .unwrap();

        // Real pipeline flow: read closes back, compute, write, re-read.
        let points = store.fetch_close_prices().await.unwrap();
        let sma = compute_sma(&points, 3).unwrap();
        let rsi = compute_sma(&points, 2).unwrap(); // any aligned series works here
        let updated = store.apply_sma_rsi(&sma, &rsi).await.unwrap();
        assert_eq!(updated, 4);

        let rows = store.fetch_chart_rows().await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].sma, None);
        assert_eq!(rows[1].sma, None);
        assert_eq!(rows[2].sma, Some(20.0));
        assert_eq!(rows[3].sma, Some(30.0));
        assert_eq!(rows[0].rsi, None);
        assert_eq!(rows[1].rsi, Some(15.0));
    }

    #[tokio::test]
    async fn macd_writeback_targets_rows_by_id() {
        let (_dir, store) = temp_store().await;
        store
            .replace_ohlc(&sample_records(&[1.0, 2.0, 3.0, 4.0, 5.0]))
            .await
            .unwrap();

        let points = store.fetch_close_prices().await.unwrap();
        let output = crate::indicators::macd(&points, 2, 3, 2).unwrap();
        let updated = store.apply_macd(&output).await.unwrap();
        assert_eq!(updated, 5);

        let rows = store.fetch_chart_rows().await.unwrap();
        assert_eq!(rows[0].macd, None);
        assert_eq!(rows[1].macd, None);
        assert!(rows[2].macd.is_some());
        assert_eq!(rows[2].macd_signal, None);
        assert!(rows[3].macd_signal.is_some());
        // Untouched columns stay NULL.
        assert_eq!(rows[4].sma, None);
    }

    #[tokio::test]
    async fn mismatched_series_are_rejected() {
        let (_dir, store) = temp_store().await;
        store.replace_ohlc(&sample_records(&[1.0, 2.0, 3.0])).await.unwrap();

        let points = store.fetch_close_prices().await.unwrap();
        let full = compute_sma(&points, 2).unwrap();
        let short = compute_sma(&points[..2], 2).unwrap();

        assert!(store.apply_sma_rsi(&full, &short).await.is_err());
    }

    #[tokio::test]
    async fn mismatched_macd_series_are_rejected() {
        let (_dir, store) = temp_store().await;
        store.replace_ohlc(&sample_records(&[1.0, 2.0, 3.0])).await.unwrap();

        let points = store.fetch_close_prices().await.unwrap();
        let output = MacdOutput {
            macd: compute_sma(&points, 2).unwrap(),
            signal: compute_sma(&points[..2], 2).unwrap(),
        };

        assert!(store.apply_macd(&output).await.is_err());
    }
}
