// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Unweighted mean over a trailing window:
//
//   SMA[i] = mean(close[i - window + 1 ..= i])
//
// The first `window - 1` positions have no full window behind them and stay
// missing in the output.

use super::{IndicatorError, Series};
use crate::types::PricePoint;

/// Compute the SMA series for `points` over a trailing `window`.
///
/// The output is id-aligned with the input: one entry per price point, with
/// `None` at positions `0 .. window - 1`. An empty input produces an empty
/// series, not an error.
///
/// # Errors
/// `InvalidParameter` when `window == 0`.
pub fn sma(points: &[PricePoint], window: usize) -> Result<Series, IndicatorError> {
    if window == 0 {
        return Err(IndicatorError::InvalidParameter {
            name: "window",
            value: window,
        });
    }

    let closes: Vec<f64> = points.iter().map(|p| p.close).collect();

    let mut values: Vec<Option<f64>> = vec![None; closes.len().min(window - 1)];
    values.extend(
        closes
            .windows(window)
            .map(|w| Some(w.iter().sum::<f64>() / window as f64)),
    );

    Ok(Series::aligned(points, values))
}
