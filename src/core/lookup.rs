//! Timestamp lookup and time-range extraction over sample matrices.
//!
//! A sample matrix holds one row per sample; column 0 is the sample
//! timestamp in milliseconds since the epoch, ascending.

use chrono::{DateTime, TimeZone};
use ndarray::{s, Array2, ArrayView1, ArrayView2};

/// Find the index of the timestamp closest to `target` by binary search.
///
/// Returns `None` for an empty slice. Targets before the first sample map to
/// index 0 and targets after the last sample map to the last index. When the
/// two bracketing samples are equally distant the higher index wins; this
/// decides whether a boundary sample belongs to an activity, so it must not
/// change.
pub fn find_closest_timestamp(timestamps: ArrayView1<f64>, target: f64) -> Option<usize> {
    if timestamps.is_empty() {
        return None;
    }

    // `right` may step below zero, so search over signed indices.
    let mut left: isize = 0;
    let mut right: isize = timestamps.len() as isize - 1;

    while left <= right {
        let mid = (left + right) / 2;
        let value = timestamps[mid as usize];
        if value == target {
            return Some(mid as usize);
        } else if value < target {
            left = mid + 1;
        } else {
            right = mid - 1;
        }
    }

    if left as usize >= timestamps.len() {
        return Some(right as usize);
    }
    if right < 0 {
        return Some(left as usize);
    }

    // The loop exits with `left == right + 1`, so `left` is the higher candidate.
    let (left, right) = (left as usize, right as usize);
    if (timestamps[right] - target).abs() < (timestamps[left] - target).abs() {
        Some(right)
    } else {
        Some(left)
    }
}

/// Slice the rows of `matrix` between two millisecond timestamps, inclusive.
///
/// `None` bounds default to the first and last sample. Bounds outside the
/// recording collapse onto its nearest edge, so the result may be a single
/// row; it is empty when the end lands before the start or the matrix has no
/// rows. Never fails.
pub fn extract_range(
    matrix: ArrayView2<f64>,
    start_ms: Option<f64>,
    end_ms: Option<f64>,
) -> Array2<f64> {
    let rows = matrix.nrows();
    if rows == 0 || matrix.ncols() == 0 {
        return Array2::zeros((0, matrix.ncols()));
    }

    let timestamps = matrix.column(0);
    let start_ms = start_ms.unwrap_or(timestamps[0]);
    let end_ms = end_ms.unwrap_or(timestamps[rows - 1]);

    // Both lookups succeed on a non-empty column.
    let start = find_closest_timestamp(timestamps, start_ms).unwrap_or(0);
    let end = find_closest_timestamp(timestamps, end_ms).unwrap_or(0);

    if end < start {
        return Array2::zeros((0, matrix.ncols()));
    }
    matrix.slice(s![start..=end, ..]).to_owned()
}

/// Slice the rows of `matrix` between two instants, inclusive.
pub fn extract_between<Tz: TimeZone>(
    matrix: ArrayView2<f64>,
    start: Option<&DateTime<Tz>>,
    end: Option<&DateTime<Tz>>,
) -> Array2<f64> {
    extract_range(
        matrix,
        start.map(|t| t.timestamp_millis() as f64),
        end.map(|t| t.timestamp_millis() as f64),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ndarray::{array, Array1};

    fn stamps() -> Array1<f64> {
        array![1000.0, 2000.0, 3000.0, 4000.0, 5000.0]
    }

    #[test]
    fn test_closest_exact_match() {
        assert_eq!(find_closest_timestamp(stamps().view(), 3000.0), Some(2));
    }

    #[test]
    fn test_closest_between_samples() {
        assert_eq!(find_closest_timestamp(stamps().view(), 2400.0), Some(1));
        assert_eq!(find_closest_timestamp(stamps().view(), 4600.0), Some(4));
    }

    #[test]
    fn test_closest_tie_prefers_higher_index() {
        assert_eq!(find_closest_timestamp(stamps().view(), 2500.0), Some(2));
        assert_eq!(find_closest_timestamp(stamps().view(), 4500.0), Some(4));
    }

    #[test]
    fn test_closest_out_of_bounds() {
        assert_eq!(find_closest_timestamp(stamps().view(), 500.0), Some(0));
        assert_eq!(find_closest_timestamp(stamps().view(), 6000.0), Some(4));
    }

    #[test]
    fn test_closest_empty() {
        let empty = Array1::<f64>::zeros(0);
        assert_eq!(find_closest_timestamp(empty.view(), 1.0), None);
    }

    #[test]
    fn test_closest_with_duplicates() {
        let ts = array![1.0, 2.0, 2.0, 2.0, 3.0];
        let idx = find_closest_timestamp(ts.view(), 2.0).unwrap();
        assert_eq!(ts[idx], 2.0);
    }

    #[test]
    fn test_closest_is_never_beaten() {
        let ts = array![0.0, 3.0, 3.0, 7.0, 12.0, 20.0, 21.0, 40.0];
        let mut target = -5.0;
        while target <= 45.0 {
            let idx = find_closest_timestamp(ts.view(), target).unwrap();
            let best = (ts[idx] - target).abs();
            for (j, value) in ts.iter().enumerate() {
                assert!((value - target).abs() >= best, "index {j} beats {idx} for {target}");
            }
            target += 0.5;
        }
    }

    #[test]
    fn test_extract_full_range() {
        let m = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        assert_eq!(extract_range(m.view(), None, None), m);
    }

    #[test]
    fn test_extract_inclusive_bounds() {
        let m = array![[100.0, 1.0], [200.0, 2.0], [300.0, 3.0], [400.0, 4.0]];
        let slice = extract_range(m.view(), Some(200.0), Some(300.0));
        assert_eq!(slice, array![[200.0, 2.0], [300.0, 3.0]]);
    }

    #[test]
    fn test_extract_outside_recording_collapses() {
        let m = array![[100.0, 1.0], [200.0, 2.0], [300.0, 3.0]];
        let after = extract_range(m.view(), Some(1000.0), Some(2000.0));
        assert_eq!(after, array![[300.0, 3.0]]);
        let before = extract_range(m.view(), Some(0.0), Some(10.0));
        assert_eq!(before, array![[100.0, 1.0]]);
    }

    #[test]
    fn test_extract_reversed_bounds_is_empty() {
        let m = array![[100.0, 1.0], [200.0, 2.0], [300.0, 3.0]];
        let slice = extract_range(m.view(), Some(300.0), Some(100.0));
        assert_eq!(slice.dim(), (0, 2));
    }

    #[test]
    fn test_extract_empty_matrix() {
        let m = Array2::<f64>::zeros((0, 4));
        assert_eq!(extract_range(m.view(), Some(1.0), None).dim(), (0, 4));
    }

    #[test]
    fn test_extract_between_instants() {
        let start = Utc.with_ymd_and_hms(2021, 1, 1, 0, 1, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2021, 1, 1, 0, 2, 0).unwrap();
        let s = start.timestamp_millis() as f64;
        let e = end.timestamp_millis() as f64;
        let m = array![
            [s - 1.0, 1.0, 2.0, 3.0],
            [s, 4.0, 5.0, 6.0],
            [e, 7.0, 8.0, 9.0],
            [e + 1.0, 10.0, 11.0, 12.0]
        ];
        let slice = extract_between(m.view(), Some(&start), Some(&end));
        assert_eq!(slice, array![[s, 4.0, 5.0, 6.0], [e, 7.0, 8.0, 9.0]]);
    }
}
