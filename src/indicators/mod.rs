// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free transforms over an ordered slice of price points.
// Each transform returns a `Series` aligned 1:1 with its input so that every
// output value can be written back to the exact row it was computed from;
// positions with insufficient history carry `None` instead of being truncated
// away. The module holds no state across calls: the same input always yields
// the same output, and concurrent calls on independent inputs are safe.

use thiserror::Error;

mod ewm;
mod macd;
mod rsi;
mod series;
mod sma;

pub use macd::{macd, MacdOutput};
pub use rsi::rsi;
pub use series::{Series, SeriesPoint};
pub use sma::sma;

/// Parameter validation failure from an indicator transform.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// A window or span argument was zero. Windows count observations and
    /// must be at least 1.
    #[error("invalid {name} parameter: {value} (must be at least 1)")]
    InvalidParameter { name: &'static str, value: usize },
}
