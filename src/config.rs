// =============================================================================
// Pipeline Configuration — File-backed settings with serde defaults
// =============================================================================
//
// Central configuration for the Borealis pipeline: which quote currency and
// history depth to fetch, where the SQLite file lives, and the indicator
// windows. Every field carries a `#[serde(default)]` so that an older or
// partial config file still deserialises; a missing file is handled by the
// caller falling back to `Default` with a warning.
//
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_vs_currency() -> String {
    "usd".to_string()
}

fn default_history_days() -> u32 {
    365
}

fn default_db_path() -> String {
    "borealis.db".to_string()
}

fn default_sma_window() -> usize {
    14
}

fn default_rsi_window() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

// =============================================================================
// PipelineConfig
// =============================================================================

/// Top-level configuration for an end-to-end pipeline run.
///
/// Indicator windows are not validated here; the transforms reject a zero
/// window themselves, so there is exactly one place that rule lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    // --- Market data ---------------------------------------------------------

    /// Quote currency for OHLC requests (CoinGecko `vs_currency`).
    #[serde(default = "default_vs_currency")]
    pub vs_currency: String,

    /// How many days of history to request for the bulk chunk.
    #[serde(default = "default_history_days")]
    pub history_days: u32,

    // --- Storage -------------------------------------------------------------

    /// Path of the SQLite database file (created on first run).
    #[serde(default = "default_db_path")]
    pub db_path: String,

    // --- Indicator windows ---------------------------------------------------

    /// Trailing window for the simple moving average.
    #[serde(default = "default_sma_window")]
    pub sma_window: usize,

    /// Window for the relative strength index.
    #[serde(default = "default_rsi_window")]
    pub rsi_window: usize,

    /// Fast EMA span for MACD.
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    /// Slow EMA span for MACD.
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    /// EMA span for the MACD signal line.
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            vs_currency: default_vs_currency(),
            history_days: default_history_days(),
            db_path: default_db_path(),
            sma_window: default_sma_window(),
            rsi_window: default_rsi_window(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pipeline config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse pipeline config from {}", path.display()))?;

        info!(
            path = %path.display(),
            vs_currency = %config.vs_currency,
            history_days = config.history_days,
            db_path = %config.db_path,
            "pipeline config loaded"
        );

        Ok(config)
    }
}
