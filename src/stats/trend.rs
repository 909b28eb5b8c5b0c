//! Moving-average smoothing and short-horizon trend classification.

use statrs::statistics::Statistics;

use crate::types::{Reading, TrendDirection, TrendPoint, TrendReport};

/// Stable-band half width in degrees. First/last deltas inside this band
/// classify as [`TrendDirection::Stable`].
const STABLE_BAND: f64 = 0.5;

/// Smooth a temperature series with a trailing window of `window` points.
///
/// Leading positions where fewer than `window` points exist average over the
/// partial prefix, so the output always has the same length as the input.
/// An empty input yields an empty output; `window == 0` is treated as 1.
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut running = 0.0;
    for (i, v) in values.iter().enumerate() {
        running += v;
        if i >= window {
            running -= values[i - window];
        }
        let span = (i + 1).min(window) as f64;
        out.push(running / span);
    }
    out
}

/// Classify the recent temperature trend for one device.
///
/// The direction compares the first and last smoothed values of the trailing
/// `window`-point slice; `rate` is that delta divided by the number of steps
/// spanned. Volatility is the sample stdev of the raw trailing window.
/// Empty input yields a stable report with zeroed metrics.
pub fn trend_report(readings: &[Reading], window: usize) -> TrendReport {
    let window = window.max(2);
    let temps: Vec<f64> = readings.iter().map(|r| r.temperature).collect();
    let smoothed = moving_average(&temps, window);

    if readings.is_empty() {
        return TrendReport {
            direction: TrendDirection::Stable,
            rate: 0.0,
            current: 0.0,
            mean: 0.0,
            volatility: 0.0,
            moving_average: Vec::new(),
        };
    }

    let tail_start = readings.len().saturating_sub(window);
    let tail = &smoothed[tail_start..];
    let delta = tail[tail.len() - 1] - tail[0];
    let steps = (tail.len() - 1).max(1) as f64;

    let direction = if delta > STABLE_BAND {
        TrendDirection::Rising
    } else if delta < -STABLE_BAND {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    };

    let raw_tail = &temps[tail_start..];
    let volatility = if raw_tail.len() < 2 {
        0.0
    } else {
        raw_tail.std_dev()
    };

    TrendReport {
        direction,
        rate: delta / steps,
        current: temps[temps.len() - 1],
        mean: temps.as_slice().mean(),
        volatility,
        moving_average: readings
            .iter()
            .zip(&smoothed)
            .map(|(r, &s)| TrendPoint {
                timestamp: r.timestamp,
                average: (s * 100.0).round() / 100.0,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadingStatus;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, minute, 0)
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
                humidity: 55.0,
                status: ReadingStatus::Normal,
            })
            .collect()
    }

    #[test]
    fn moving_average_preserves_length() {
        // Output length equals input length for any window size.
        for window in 1..=8 {
            let values = [20.0, 21.0, 19.0, 22.0, 23.0, 20.5];
            assert_eq!(moving_average(&values, window).len(), values.len());
        }
        assert!(moving_average(&[], 3).is_empty());
    }

    #[test]
    fn moving_average_partial_prefix() {
        let out = moving_average(&[10.0, 20.0, 30.0, 40.0], 3);
        assert!((out[0] - 10.0).abs() < 1e-9);
        assert!((out[1] - 15.0).abs() < 1e-9);
        assert!((out[2] - 20.0).abs() < 1e-9);
        assert!((out[3] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn moving_average_window_one_is_identity() {
        let values = [18.2, 19.0, 17.5];
        assert_eq!(moving_average(&values, 1), values.to_vec());
    }

    #[test]
    fn rising_series_classifies_rising() {
        let rs = readings(&[20.0, 22.0, 24.0, 26.0, 28.0, 30.0]);
        let report = trend_report(&rs, 5);
        assert_eq!(report.direction, TrendDirection::Rising);
        assert!(report.rate > 0.0);
        assert_eq!(report.current, 30.0);
    }

    #[test]
    fn falling_series_classifies_falling() {
        let rs = readings(&[30.0, 28.0, 26.0, 24.0, 22.0, 20.0]);
        let report = trend_report(&rs, 5);
        assert_eq!(report.direction, TrendDirection::Falling);
        assert!(report.rate < 0.0);
    }

    #[test]
    fn flat_series_classifies_stable() {
        let rs = readings(&[22.0, 22.1, 21.9, 22.0, 22.05, 22.0]);
        let report = trend_report(&rs, 5);
        assert_eq!(report.direction, TrendDirection::Stable);
    }

    #[test]
    fn empty_input_yields_stable_zero_report() {
        let report = trend_report(&[], 5);
        assert_eq!(report.direction, TrendDirection::Stable);
        assert_eq!(report.rate, 0.0);
        assert!(report.moving_average.is_empty());
    }

    #[test]
    fn report_carries_smoothed_points() {
        let rs = readings(&[20.0, 21.0, 22.0]);
        let report = trend_report(&rs, 2);
        assert_eq!(report.moving_average.len(), 3);
        assert_eq!(report.moving_average[0].timestamp, rs[0].timestamp);
    }
}
