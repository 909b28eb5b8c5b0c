//! Descriptive statistics and z-score outlier detection
//!
//! Operates on one device's ordered reading list. All quantities use the
//! sample standard deviation (n−1) via the statrs `Statistics` trait.

mod trend;

pub use trend::{moving_average, trend_report};

use statrs::statistics::Statistics;
use thiserror::Error;

use crate::types::{Outlier, OutlierKind, Reading, ReadingStats, ReadingStatus};

/// Statistics-layer errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatsError {
    /// No readings to analyze. Surfaced, never retried.
    #[error("no readings to analyze")]
    EmptyInput,
}

/// Compute count / mean / min / max / range / stdev over a device's readings,
/// plus per-status counts.
///
/// # Errors
///
/// Returns [`StatsError::EmptyInput`] when `readings` is empty.
pub fn summarize(readings: &[Reading]) -> Result<ReadingStats, StatsError> {
    if readings.is_empty() {
        return Err(StatsError::EmptyInput);
    }

    let temps: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
    let mean = temps.as_slice().mean();
    let min = temps.as_slice().min();
    let max = temps.as_slice().max();
    // std_dev is NaN for a single sample; a lone reading has no spread.
    let stdev = if temps.len() < 2 {
        0.0
    } else {
        temps.as_slice().std_dev()
    };

    let mut normal_count = 0;
    let mut warning_count = 0;
    let mut alert_count = 0;
    for r in readings {
        match r.status {
            ReadingStatus::Normal => normal_count += 1,
            ReadingStatus::Warning => warning_count += 1,
            ReadingStatus::Alert => alert_count += 1,
        }
    }

    Ok(ReadingStats {
        count: readings.len(),
        mean,
        min,
        max,
        range: max - min,
        stdev,
        normal_count,
        warning_count,
        alert_count,
    })
}

/// Flag readings whose temperature z-score exceeds `threshold`.
///
/// A reading is an outlier when `|temperature − mean| / stdev > threshold`
/// (strict). A zero standard deviation means every reading is identical, so
/// the z-score is undefined and no outliers are reported — by definition, not
/// as an error.
pub fn detect_outliers(readings: &[Reading], threshold: f64) -> Vec<Outlier> {
    let Ok(stats) = summarize(readings) else {
        return Vec::new();
    };
    if stats.stdev == 0.0 {
        return Vec::new();
    }

    readings
        .iter()
        .filter_map(|r| {
            let z = (r.temperature - stats.mean).abs() / stats.stdev;
            if z > threshold {
                Some(Outlier {
                    timestamp: r.timestamp,
                    temperature: r.temperature,
                    z_score: (z * 100.0).round() / 100.0,
                    kind: if r.temperature > stats.mean {
                        OutlierKind::High
                    } else {
                        OutlierKind::Low
                    },
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, minute, 0)
            .unwrap()
    }

    fn readings(temps: &[f64]) -> Vec<Reading> {
        temps
            .iter()
            .enumerate()
            .map(|(i, &t)| Reading {
                device_id: "sensor-01".to_string(),
                timestamp: ts(i as u32),
                temperature: t,
                humidity: 60.0,
                status: ReadingStatus::Normal,
            })
            .collect()
    }

    fn variance(temps: &[f64]) -> f64 {
        let mean = temps.iter().sum::<f64>() / temps.len() as f64;
        temps.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / temps.len() as f64
    }

    #[test]
    fn summarize_empty_fails_with_empty_input() {
        assert_eq!(summarize(&[]), Err(StatsError::EmptyInput));
    }

    #[test]
    fn summarize_basic_aggregates() {
        let rs = readings(&[20.0, 22.0, 24.0]);
        let stats = summarize(&rs).unwrap();
        assert_eq!(stats.count, 3);
        assert!((stats.mean - 22.0).abs() < 1e-9);
        assert_eq!(stats.min, 20.0);
        assert_eq!(stats.max, 24.0);
        assert_eq!(stats.range, 4.0);
        // Sample stdev of [20, 22, 24] is 2.0
        assert!((stats.stdev - 2.0).abs() < 1e-9);
        assert_eq!(stats.normal_count, 3);
    }

    #[test]
    fn summarize_single_reading_has_zero_spread() {
        let rs = readings(&[25.0]);
        let stats = summarize(&rs).unwrap();
        assert_eq!(stats.stdev, 0.0);
        assert_eq!(stats.range, 0.0);
    }

    #[test]
    fn summarize_counts_statuses() {
        let mut rs = readings(&[20.0, 21.0, 30.0]);
        rs[1].status = ReadingStatus::Warning;
        rs[2].status = ReadingStatus::Alert;
        let stats = summarize(&rs).unwrap();
        assert_eq!(
            (stats.normal_count, stats.warning_count, stats.alert_count),
            (1, 1, 1)
        );
    }

    #[test]
    fn spike_is_flagged_at_threshold_1_5() {
        let rs = readings(&[10.0, 10.0, 10.0, 10.0, 100.0]);
        let outliers = detect_outliers(&rs, 1.5);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].temperature, 100.0);
        assert_eq!(outliers[0].kind, OutlierKind::High);
        assert!(outliers[0].z_score > 1.5);
    }

    #[test]
    fn constant_series_has_no_outliers() {
        let rs = readings(&[25.0; 10]);
        assert!(detect_outliers(&rs, 1.0).is_empty());
    }

    #[test]
    fn empty_input_has_no_outliers() {
        assert!(detect_outliers(&[], 3.0).is_empty());
    }

    #[test]
    fn low_outliers_are_classified() {
        let rs = readings(&[25.0, 25.0, 25.0, 25.0, -40.0]);
        let outliers = detect_outliers(&rs, 1.5);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].kind, OutlierKind::Low);
    }

    #[test]
    fn removing_outliers_reduces_variance() {
        // The outlier-free subset never has higher variance than the full set.
        let temps = [21.0, 21.5, 22.0, 21.8, 21.2, 55.0, 21.6, 21.3];
        let rs = readings(&temps);
        let outliers = detect_outliers(&rs, 2.0);
        assert!(!outliers.is_empty());

        let kept: Vec<f64> = rs
            .iter()
            .filter(|r| !outliers.iter().any(|o| o.timestamp == r.timestamp))
            .map(|r| r.temperature)
            .collect();

        assert!(variance(&kept) <= variance(&temps));
    }
}
