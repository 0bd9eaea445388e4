// =============================================================================
// Shared types used across the Borealis pipeline
// =============================================================================

use chrono::{DateTime, Utc};

/// A cryptocurrency supported by the pipeline, mapped to its CoinGecko id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coin {
    Bitcoin,
    Ethereum,
    BinanceCoin,
    Tether,
}

impl Coin {
    /// The CoinGecko API identifier for this coin.
    pub fn api_id(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
            Self::BinanceCoin => "binancecoin",
            Self::Tether => "tether",
        }
    }

    /// Short exchange-style ticker, used for chart labels.
    pub fn ticker(&self) -> &'static str {
        match self {
            Self::Bitcoin => "BTC",
            Self::Ethereum => "ETH",
            Self::BinanceCoin => "BNB",
            Self::Tether => "USDT",
        }
    }
}

impl std::str::FromStr for Coin {
    type Err = anyhow::Error;

    /// Accepts either the full CoinGecko id or the ticker, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(Self::Bitcoin),
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "binancecoin" | "bnb" => Ok(Self::BinanceCoin),
            "tether" | "usdt" => Ok(Self::Tether),
            other => anyhow::bail!(
                "unsupported coin '{other}' — supported: bitcoin/btc, ethereum/eth, \
                 binancecoin/bnb, tether/usdt"
            ),
        }
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.api_id())
    }
}

/// One OHLC bar as fetched from the market data provider, before it has been
/// assigned a row id by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcRecord {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// A close-price observation read back from the store, keyed by its row id.
///
/// Sequences of `PricePoint` handed to the indicator engine must be ordered
/// ascending by `id` (the store's `ORDER BY id ASC` guarantees this); the
/// engine itself never sorts or validates the ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

/// Full row projection consumed by the chart layer. Indicator columns are
/// `None` wherever the engine produced no value (warm-up or degenerate
/// arithmetic) — the chart skips those positions rather than zero-filling.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub sma: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn coin_parses_ids_and_tickers() {
        assert_eq!(Coin::from_str("bitcoin").unwrap(), Coin::Bitcoin);
        assert_eq!(Coin::from_str("BTC").unwrap(), Coin::Bitcoin);
        assert_eq!(Coin::from_str("Ethereum").unwrap(), Coin::Ethereum);
        assert_eq!(Coin::from_str("eth").unwrap(), Coin::Ethereum);
        assert_eq!(Coin::from_str("bnb").unwrap(), Coin::BinanceCoin);
        assert_eq!(Coin::from_str("usdt").unwrap(), Coin::Tether);
        assert_eq!(Coin::from_str(" tether ").unwrap(), Coin::Tether);
    }

    #[test]
    fn coin_rejects_unknown() {
        let err = Coin::from_str("dogecoin").unwrap_err();
        assert!(err.to_string().contains("unsupported coin"));
    }

    #[test]
    fn coin_display_matches_api_id() {
        assert_eq!(Coin::BinanceCoin.to_string(), "binancecoin");
        assert_eq!(Coin::Bitcoin.ticker(), "BTC");
    }
}
