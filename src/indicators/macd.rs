// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
// MACD line:   EMA(close, fast) - EMA(close, slow)
// Signal line: EMA(macd, signal)
//
// Every EMA uses the shared span smoothing (alpha = 2/(span+1)) gated on its
// own span. With fast < slow the MACD line is missing until the slow EMA
// exists (index slow - 1), and the signal line needs `signal` defined MACD
// values on top of that (first defined at index slow + signal - 2).
// =============================================================================

use super::ewm::{alpha_from_span, ewm_mean};
use super::{IndicatorError, Series};
use crate::types::PricePoint;

/// The MACD line and its signal line, both id-aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdOutput {
    pub macd: Series,
    pub signal: Series,
}

/// Compute the MACD and signal series for `points`.
///
/// `fast < slow` is the meaningful configuration. `fast >= slow` is not
/// rejected: the arithmetic stays well-defined, the result is just a
/// degenerate oscillator, and rejecting it here would turn a tuning choice
/// into a hard failure.
///
/// # Errors
/// `InvalidParameter` when any of `fast`, `slow`, `signal` is zero.
pub fn macd(
    points: &[PricePoint],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<MacdOutput, IndicatorError> {
    for (name, value) in [("fast", fast), ("slow", slow), ("signal", signal)] {
        if value == 0 {
            return Err(IndicatorError::InvalidParameter { name, value });
        }
    }

    let closes: Vec<Option<f64>> = points.iter().map(|p| Some(p.close)).collect();

    let ma_fast = ewm_mean(&closes, alpha_from_span(fast), fast);
    let ma_slow = ewm_mean(&closes, alpha_from_span(slow), slow);

    // Defined only where both moving averages are defined.
    let macd_values: Vec<Option<f64>> = ma_fast
        .into_iter()
        .zip(ma_slow)
        .map(|pair| match pair {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let signal_values = ewm_mean(&macd_values, alpha_from_span(signal), signal);

    Ok(MacdOutput {
        macd: Series::aligned(points, macd_values),
        signal: Series::aligned(points, signal_values),
    })
}
