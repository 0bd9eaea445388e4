// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute per-position change from consecutive closes; the first
//          position has no predecessor and contributes zero gain, zero loss.
// Step 2 — Split each change into gain = max(change, 0) and
//          loss = max(-change, 0).
// Step 3 — Average gain / loss through the shared exponential mean with
//          alpha = 1/window, gated on `window` observations and seeded with
//          their simple mean (Wilder's initialization).
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS), with explicit zero-denominator guards.
//
// Defined values always lie in [0, 100].
// =============================================================================

use super::ewm::ewm_mean;
use super::{IndicatorError, Series};
use crate::types::PricePoint;

/// Compute the RSI series for `points` over the given `window`.
///
/// The output is id-aligned with the input. Positions are `None` during
/// warm-up (the first `window - 1` positions) and wherever both average gain
/// and average loss are zero: a market that has not moved has undefined
/// momentum, not neutral momentum, and the missing value keeps that
/// distinction intact through storage and charting.
///
/// # Errors
/// `InvalidParameter` when `window == 0`.
pub fn rsi(points: &[PricePoint], window: usize) -> Result<Series, IndicatorError> {
    if window == 0 {
        return Err(IndicatorError::InvalidParameter {
            name: "window",
            value: window,
        });
    }
    if points.is_empty() {
        return Ok(Series::aligned(points, Vec::new()));
    }

    // --- Steps 1 + 2: split per-position change into gain and loss ----------
    let mut gains: Vec<Option<f64>> = Vec::with_capacity(points.len());
    let mut losses: Vec<Option<f64>> = Vec::with_capacity(points.len());
    gains.push(Some(0.0));
    losses.push(Some(0.0));
    for pair in points.windows(2) {
        let change = pair[1].close - pair[0].close;
        gains.push(Some(change.max(0.0)));
        losses.push(Some((-change).max(0.0)));
    }

    // --- Step 3: smoothed averages, gated on `window` observations ----------
    let alpha = 1.0 / window as f64;
    let avg_gain = ewm_mean(&gains, alpha, window);
    let avg_loss = ewm_mean(&losses, alpha, window);

    // --- Step 4: RS -> RSI with the zero-denominator policy ------------------
    let values = avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|pair| match pair {
            (Some(gain), Some(loss)) => rsi_from_averages(gain, loss),
            _ => None,
        })
        .collect();

    Ok(Series::aligned(points, values))
}

/// Map average gain / average loss to an RSI value.
///
/// Zero average loss with positive gain is the RS -> infinity limit, exactly
/// 100. Zero gain and zero loss stays missing: there is no momentum to rate.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    if avg_loss == 0.0 {
        return if avg_gain > 0.0 { Some(100.0) } else { None };
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}
