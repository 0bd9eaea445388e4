// =============================================================================
// Exponentially weighted mean with a minimum-observation gate
// =============================================================================
//
// Shared smoothing core for RSI (alpha = 1/window) and MACD (alpha =
// 2/(span+1)). The fold carries (running average, defined-observation count):
//
//   - a missing observation neither updates nor resets the state, and its
//     output position is missing;
//   - the first `min_periods` defined observations only accumulate; when the
//     count is reached the average is seeded with their simple mean;
//   - every later defined observation applies
//       avg = alpha * x + (1 - alpha) * avg_prev
//
// The seed-then-recur form is Wilder's initialization. After the seed point
// it diverges slightly from a fully weighted expanding mean, but the warm-up
// boundary (index of the first defined output) is identical in both.

/// Smoothing factor for a span-parameterised EMA: `2 / (span + 1)`.
pub(crate) fn alpha_from_span(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Exponentially weighted mean of `values` with smoothing factor `alpha`,
/// undefined until `min_periods` defined observations have accumulated.
///
/// `alpha` must lie in (0, 1] and `min_periods` must be at least 1; the
/// validated indicator parameters upstream guarantee both.
pub(crate) fn ewm_mean(values: &[Option<f64>], alpha: f64, min_periods: usize) -> Vec<Option<f64>> {
    debug_assert!(alpha > 0.0 && alpha <= 1.0);
    debug_assert!(min_periods >= 1);

    let mut out = Vec::with_capacity(values.len());
    let mut seen = 0usize;
    let mut warmup_sum = 0.0;
    let mut avg: Option<f64> = None;

    for &value in values {
        let x = match value {
            Some(x) => x,
            None => {
                out.push(None);
                continue;
            }
        };

        match avg {
            Some(prev) => {
                avg = Some(alpha * x + (1.0 - alpha) * prev);
                out.push(avg);
            }
            None => {
                seen += 1;
                warmup_sum += x;
                if seen == min_periods {
                    avg = Some(warmup_sum / min_periods as f64);
                    out.push(avg);
                } else {
                    out.push(None);
                }
            }
        }
    }

    out
}
