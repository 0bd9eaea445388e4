// =============================================================================
// CoinGecko REST API Client — public OHLC endpoints
// =============================================================================
//
// Read-only client for CoinGecko's market data API. No secrets are required:
// the optional demo-plan API key only raises the rate limits, and it is sent
// as a header, never in query params, and never logged.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::DateTime;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use tracing::{debug, instrument, warn};

use crate::types::{Coin, OhlcRecord};

/// Attempts per request before a rate-limit response becomes an error.
const MAX_ATTEMPTS: u32 = 3;

/// Base back-off delay after a 429, doubled on each further attempt (seconds).
const RETRY_BASE_DELAY_SECS: u64 = 2;

/// CoinGecko REST API client for public OHLC market data.
#[derive(Clone)]
pub struct CoinGeckoClient {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
}

impl CoinGeckoClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Create a new `CoinGeckoClient`.
    ///
    /// # Arguments
    /// * `api_key` — optional demo-plan key; requests work without one but
    ///   run into the anonymous rate limits much sooner.
    pub fn new(api_key: Option<String>) -> Self {
        let mut default_headers = HeaderMap::new();
        if let Some(key) = api_key.as_deref() {
            if let Ok(val) = HeaderValue::from_str(key) {
                default_headers.insert("x-cg-demo-api-key", val);
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        debug!("CoinGeckoClient initialised (base_url=https://api.coingecko.com)");

        Self {
            api_key,
            base_url: "https://api.coingecko.com".to_string(),
            client,
        }
    }

    // -------------------------------------------------------------------------
    // OHLC market data
    // -------------------------------------------------------------------------

    /// GET /api/v3/coins/{id}/ohlc — candles for one coin over `days` days.
    ///
    /// CoinGecko chooses the candle granularity from the requested range
    /// (e.g. 4-day candles at 365 days, 30-minute candles at 1 day). A 429
    /// response is retried with doubling back-off up to [`MAX_ATTEMPTS`].
    #[instrument(skip(self), name = "coingecko::fetch_ohlc")]
    pub async fn fetch_ohlc(
        &self,
        coin: Coin,
        vs_currency: &str,
        days: u32,
    ) -> Result<Vec<OhlcRecord>> {
        let url = format!(
            "{}/api/v3/coins/{}/ohlc?vs_currency={}&days={}",
            self.base_url,
            coin.api_id(),
            vs_currency,
            days
        );

        let mut attempt = 1;
        let body: serde_json::Value = loop {
            let resp = self.client.get(&url).send().await.with_context(|| {
                format!("GET /api/v3/coins/{}/ohlc request failed", coin.api_id())
            })?;

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_ATTEMPTS {
                let delay = RETRY_BASE_DELAY_SECS << (attempt - 1);
                warn!(attempt, delay_secs = delay, "CoinGecko rate limit hit — backing off");
                tokio::time::sleep(Duration::from_secs(delay)).await;
                attempt += 1;
                continue;
            }

            let body: serde_json::Value = resp
                .json()
                .await
                .context("failed to parse OHLC response")?;

            if !status.is_success() {
                anyhow::bail!(
                    "CoinGecko GET /api/v3/coins/{}/ohlc returned {}: {}",
                    coin.api_id(),
                    status,
                    body
                );
            }

            break body;
        };

        let records = Self::parse_ohlc_body(&body)?;
        debug!(coin = %coin, days, count = records.len(), "OHLC fetched");
        Ok(records)
    }

    /// Assemble the full history for a coin: one bulk chunk over
    /// `history_days`, then a 1-day chunk to refresh the most recent candles
    /// at fine granularity.
    ///
    /// The chunks may overlap in timestamp around the boundary; downstream
    /// consumers key on the insertion order, so the overlap is harmless.
    #[instrument(skip(self), name = "coingecko::fetch_history")]
    pub async fn fetch_history(
        &self,
        coin: Coin,
        vs_currency: &str,
        history_days: u32,
    ) -> Result<Vec<OhlcRecord>> {
        let mut records = Vec::new();
        for chunk_days in [history_days, 1] {
            let chunk = self.fetch_ohlc(coin, vs_currency, chunk_days).await?;
            debug!(chunk_days, count = chunk.len(), "history chunk fetched");
            records.extend(chunk);
        }

        debug!(coin = %coin, total = records.len(), "historical OHLC assembled");
        Ok(records)
    }

    // -------------------------------------------------------------------------
    // Internal helpers
    // -------------------------------------------------------------------------

    /// Parse CoinGecko's array-of-arrays OHLC response.
    ///
    /// Array indices: [0] timestamp (ms), [1] open, [2] high, [3] low,
    /// [4] close. Entries that are not 5-element arrays are skipped with a
    /// warning rather than failing the whole fetch.
    fn parse_ohlc_body(body: &serde_json::Value) -> Result<Vec<OhlcRecord>> {
        let raw = body.as_array().context("OHLC response is not an array")?;

        let mut records = Vec::with_capacity(raw.len());
        for entry in raw {
            let arr = match entry.as_array() {
                Some(arr) if arr.len() == 5 => arr,
                _ => {
                    warn!("skipping malformed OHLC entry: {entry}");
                    continue;
                }
            };

            let ts_ms = match arr[0].as_i64() {
                Some(ms) => ms,
                None => {
                    warn!("skipping OHLC entry with non-numeric timestamp: {}", arr[0]);
                    continue;
                }
            };
            let timestamp = DateTime::from_timestamp_millis(ts_ms)
                .with_context(|| format!("OHLC timestamp {ts_ms} out of range"))?;

            records.push(OhlcRecord {
                timestamp,
                open: Self::json_f64(&arr[1])?,
                high: Self::json_f64(&arr[2])?,
                low: Self::json_f64(&arr[3])?,
                close: Self::json_f64(&arr[4])?,
            });
        }

        Ok(records)
    }

    /// Parse a JSON value that may be either a number or a numeric string.
    fn json_f64(val: &serde_json::Value) -> Result<f64> {
        match val {
            serde_json::Value::Number(n) => {
                n.as_f64().with_context(|| format!("price {n} not representable as f64"))
            }
            serde_json::Value::String(s) => s
                .parse::<f64>()
                .with_context(|| format!("failed to parse '{s}' as f64")),
            other => anyhow::bail!("expected string or number, got: {other}"),
        }
    }
}

impl std::fmt::Debug for CoinGeckoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinGeckoClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}
