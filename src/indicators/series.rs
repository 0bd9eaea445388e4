// =============================================================================
// Aligned indicator series
// =============================================================================
//
// Every transform in this module returns a series that is index-aligned 1:1
// with the price points it was computed from: position i of the output
// describes position i of the input and carries the same row id. Warm-up
// positions and degenerate-arithmetic positions hold `None`, which persists
// as SQL NULL and is skipped (never zero-filled) by the chart layer.

use crate::types::PricePoint;

/// One aligned output position: the source row id plus the indicator value,
/// if defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub id: i64,
    pub value: Option<f64>,
}

/// An indicator output series, index-aligned with its input price points.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    points: Vec<SeriesPoint>,
}

impl Series {
    /// Pair each input price point's id with the computed value at the same
    /// index. The transforms construct `values` with exactly one entry per
    /// input point.
    pub(crate) fn aligned(points: &[PricePoint], values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(points.len(), values.len());
        Self {
            points: points
                .iter()
                .zip(values)
                .map(|(p, value)| SeriesPoint { id: p.id, value })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SeriesPoint> {
        self.points.iter()
    }

    /// Value at position `idx`, flattened: `None` both for out-of-range and
    /// for a missing value.
    pub fn value_at(&self, idx: usize) -> Option<f64> {
        self.points.get(idx).and_then(|p| p.value)
    }

    /// Number of defined (non-missing) values.
    pub fn defined_count(&self) -> usize {
        self.points.iter().filter(|p| p.value.is_some()).count()
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a SeriesPoint;
    type IntoIter = std::slice::Iter<'a, SeriesPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
