//! Column balancing.
//!
//! [CSS Multi-column § 7.1 'column-fill'](https://www.w3.org/TR/css-multicol-1/#cf)
//!
//! "balance: Balance content equally between columns, as far as possible."
//!
//! The content is laid out once in a column with no bottom, recording the
//! block offset of every break candidate ([`BreakOffsets`]). A binary search
//! then looks for the smallest column height at which the content, cut at
//! those recorded offsets, fits in the available columns. Each probe of the
//! search is a walk over the recorded offsets, not a new layout.

use super::column::BreakOffsets;
use super::interval::IntervalMap;

/// Heights closer than this end the search.
const RESOLUTION: f32 = 0.5;

/// Smallest column height, between `total / columns` and `max_height`, at
/// which the recorded breaks spread the content over at most `columns`
/// columns. Falls back to `max_height` when no such height exists.
#[must_use]
pub fn balanced_height(offsets: &BreakOffsets, columns: u32, max_height: f32) -> f32 {
    let total = offsets.total;
    if columns <= 1 || total <= 0.0 {
        return total.min(max_height).max(0.0);
    }
    let clean: IntervalMap<f32, u32> = offsets
        .candidates
        .iter()
        .filter(|(_, penalty)| **penalty == 0)
        .map(|(k, v)| (*k, *v))
        .fold(IntervalMap::new(), |mut map, (k, v)| {
            map.insert(k, v);
            map
        });

    let mut low = total / columns as f32;
    let mut high = total.min(max_height);
    if !fits(&clean, &offsets.candidates, total, columns, high) {
        return max_height;
    }
    if fits(&clean, &offsets.candidates, total, columns, low) {
        return low;
    }
    while high - low > RESOLUTION {
        let mid = f32::midpoint(low, high);
        if fits(&clean, &offsets.candidates, total, columns, mid) {
            high = mid;
        } else {
            low = mid;
        }
    }
    tracing::trace!(height = high, total, columns, "balanced columns");
    high
}

/// Cut the content into columns of `height`, each at the latest clean
/// candidate that fits or else the latest candidate of any penalty.
fn fits(clean: &IntervalMap<f32, u32>, all: &IntervalMap<f32, u32>, total: f32, columns: u32, height: f32) -> bool {
    let mut start = 0.0;
    for _ in 0..columns {
        if total - start <= height + f32::EPSILON {
            return true;
        }
        let limit = start + height;
        let next = [clean, all]
            .into_iter()
            .filter_map(|map| map.floor(&limit).map(|(k, _)| *k))
            .find(|&k| k > start);
        match next {
            Some(offset) => start = offset,
            None => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(lines: usize, line_height: f32) -> BreakOffsets {
        let mut candidates = IntervalMap::new();
        for k in 1..lines {
            candidates.insert(k as f32 * line_height, 0);
        }
        BreakOffsets {
            candidates,
            total: lines as f32 * line_height,
        }
    }

    #[test]
    fn test_even_lines_split_evenly() {
        let height = balanced_height(&offsets(10, 20.0), 2, 600.0);
        assert!((height - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_odd_lines_put_extra_line_first() {
        let height = balanced_height(&offsets(5, 20.0), 2, 600.0);
        assert!((height - 60.0).abs() <= RESOLUTION);
    }

    #[test]
    fn test_penalized_candidates_are_a_last_resort() {
        let mut map = offsets(4, 20.0);
        // Breaking in the middle would leave a widow.
        map.candidates.insert(40.0, 1);
        let height = balanced_height(&map, 2, 600.0);
        assert!((height - 60.0).abs() <= RESOLUTION);
    }

    #[test]
    fn test_no_fit_falls_back_to_full_height() {
        let map = BreakOffsets {
            candidates: IntervalMap::new(),
            total: 300.0,
        };
        assert!((balanced_height(&map, 3, 200.0) - 200.0).abs() < 1e-3);
    }
}
