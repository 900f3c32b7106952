//! Robust statistics over expense amounts
//!
//! Median and median absolute deviation (MAD) are used instead of mean and
//! standard deviation so a single huge purchase cannot hide itself by
//! inflating the spread.

use serde::Serialize;

/// Scale factor turning a MAD into a standard deviation estimate for
/// normally distributed data.
pub const MAD_SCALE: f64 = 1.4826;

/// MAD substituted when the raw MAD is zero (identical or empty samples)
pub const MAD_FLOOR: f64 = 1.0;

/// Median of a sample. Even-length samples average the two middle values.
/// Returns 0.0 for an empty sample.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Raw median absolute deviation (no floor applied)
pub fn mad(values: &[f64]) -> f64 {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations)
}

/// Median and floored MAD for a sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RobustStats {
    pub median: f64,
    pub mad: f64,
}

impl RobustStats {
    pub fn from_amounts(values: &[f64]) -> Self {
        let raw_mad = mad(values);
        Self {
            median: median(values),
            mad: if raw_mad == 0.0 { MAD_FLOOR } else { raw_mad },
        }
    }

    /// Robust z-score: `|x - median| / (1.4826 * mad)`
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.median).abs() / (MAD_SCALE * self.mad)
    }
}

/// Median of the chronologically older half of a sample.
///
/// `chronological` must be ordered oldest first. Samples shorter than
/// `min_samples` have no baseline.
pub fn seasonal_baseline(chronological: &[f64], min_samples: usize) -> Option<f64> {
    if chronological.len() < min_samples.max(2) {
        return None;
    }
    let older = &chronological[..chronological.len() / 2];
    Some(median(older))
}

/// Per-category statistics for one detection run. Never cached: the input
/// window changes between runs.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryStats {
    pub category_id: Option<i64>,
    pub median: f64,
    pub mad: f64,
    pub sample_count: usize,
    /// None when the category has too few samples for a baseline
    pub seasonal_baseline: Option<f64>,
    /// False when the category fell back to global stats
    pub local: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[]), 0.0);
    }

    #[test]
    fn test_mad_dining_sample() {
        let amounts = [50_000.0, 55_000.0, 48_000.0, 52_000.0, 300_000.0, 51_000.0];
        assert_eq!(median(&amounts), 51_500.0);
        assert_eq!(mad(&amounts), 2_500.0);

        let stats = RobustStats::from_amounts(&amounts);
        let z = stats.z_score(300_000.0);
        assert!((z - 67.04).abs() < 0.1, "z = {}", z);
    }

    #[test]
    fn test_empty_input_is_zero_before_floor() {
        assert_eq!(mad(&[]), 0.0);
        let stats = RobustStats::from_amounts(&[]);
        assert_eq!(stats.median, 0.0);
        assert_eq!(stats.mad, MAD_FLOOR);
    }

    #[test]
    fn test_constant_values_floor_mad_and_zero_z() {
        let stats = RobustStats::from_amounts(&[42.0; 8]);
        assert_eq!(stats.mad, 1.0);
        assert_eq!(stats.z_score(42.0), 0.0);
    }

    #[test]
    fn test_mad_never_negative() {
        let samples: [&[f64]; 4] = [
            &[1.0],
            &[1.0, 1000.0],
            &[5.0, 5.0, 5.0, 9.0],
            &[0.01, 3.5, 72.0, 72.0, 1e9],
        ];
        for s in samples {
            assert!(mad(s) >= 0.0);
            assert!(RobustStats::from_amounts(s).mad > 0.0);
        }
    }

    #[test]
    fn test_seasonal_baseline_uses_older_half() {
        let chronological = [10.0, 10.0, 10.0, 20.0, 20.0, 20.0];
        assert_eq!(seasonal_baseline(&chronological, 6), Some(10.0));
        assert_eq!(seasonal_baseline(&chronological[..5], 6), None);
    }
}
