//! Per-band statistics over the pixels of one segment

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiometricFeatures {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    /// Population variance
    pub var: f64,
    /// Fisher (excess) kurtosis, biased estimator; `NaN` for constant input
    pub kurtosis: f64,
    /// Most frequent value, smallest on ties
    pub mode: f64,
}

/// Statistics of the masked values of one band, `None` when empty.
pub fn radiometric_features(values: &[f64]) -> Option<RadiometricFeatures> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let (min, max) = (sorted[0], sorted[sorted.len() - 1]);
    if min == max {
        return Some(RadiometricFeatures {
            min,
            max,
            mean: min,
            median: min,
            var: 0.0,
            kurtosis: f64::NAN,
            mode: min,
        });
    }

    let n = sorted.len() as f64;
    // summation error can push the mean just past the extremes
    let mean = (sorted.iter().sum::<f64>() / n).max(min).min(max);
    let (m2, m4) = sorted.iter().fold((0.0, 0.0), |(m2, m4), &v| {
        let d = v - mean;
        let d2 = d * d;
        (m2 + d2, m4 + d2 * d2)
    });
    let (m2, m4) = (m2 / n, m4 / n);

    Some(RadiometricFeatures {
        min,
        max,
        mean,
        median: median_sorted(&sorted),
        var: m2,
        kurtosis: if m2 == 0.0 {
            f64::NAN
        } else {
            m4 / (m2 * m2) - 3.0
        },
        mode: mode_sorted(&sorted),
    })
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let count = sorted.len();
    if count % 2 == 0 {
        (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
    } else {
        sorted[count / 2]
    }
}

// Longest run in ascending order; a later run must be strictly longer to win.
fn mode_sorted(sorted: &[f64]) -> f64 {
    let mut best = sorted[0];
    let mut best_count = 0usize;
    let mut start = 0usize;
    while start < sorted.len() {
        let value = sorted[start];
        let mut end = start + 1;
        while end < sorted.len() && sorted[end].total_cmp(&value) == Ordering::Equal {
            end += 1;
        }
        if end - start > best_count {
            best = value;
            best_count = end - start;
        }
        start = end;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_values() {
        assert!(radiometric_features(&[]).is_none());
    }

    #[test]
    fn test_constant_values() {
        let stats = radiometric_features(&[10.0; 4]).unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 10.0);
        assert_eq!(stats.mean, 10.0);
        assert_eq!(stats.median, 10.0);
        assert_eq!(stats.mode, 10.0);
        assert_eq!(stats.var, 0.0);
        assert!(stats.kurtosis.is_nan());
    }

    #[test]
    fn test_constant_inexact_values() {
        for v in [0.1, 0.3, 1.1, 7.7] {
            let stats = radiometric_features(&[v; 3]).unwrap();
            assert_eq!(stats.mean, v);
            assert_eq!(stats.var, 0.0);
            assert!(stats.kurtosis.is_nan(), "kurtosis of constant {} is {}", v, stats.kurtosis);
        }
    }

    #[test]
    fn test_basic_statistics() {
        let stats = radiometric_features(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.var, 1.25);
        // m4 = (2.25² + 0.25² + 0.25² + 2.25²) / 4 = 2.5625
        assert!((stats.kurtosis - (2.5625 / 1.5625 - 3.0)).abs() < 1e-12);
    }

    #[test]
    fn test_odd_median() {
        let stats = radiometric_features(&[9.0, 1.0, 5.0]).unwrap();
        assert_eq!(stats.median, 5.0);
    }

    #[test]
    fn test_mode_ties_pick_smallest() {
        let stats = radiometric_features(&[3.0, 7.0, 7.0, 3.0, 5.0]).unwrap();
        assert_eq!(stats.mode, 3.0);
        let stats = radiometric_features(&[2.0, 8.0, 8.0, 8.0, 2.0]).unwrap();
        assert_eq!(stats.mode, 8.0);
        let stats = radiometric_features(&[6.0, 4.0, 5.0]).unwrap();
        assert_eq!(stats.mode, 4.0);
    }

    #[test]
    fn test_min_median_max_ordering() {
        let values = [12.5, -3.0, 7.25, 7.25, 100.0, 0.0, 42.0];
        let stats = radiometric_features(&values).unwrap();
        assert!(stats.min <= stats.median && stats.median <= stats.max);
    }
}
