//! Template-based report fallback
//!
//! Produces a readable report with actual metric values when the language
//! model is unavailable, timed out, or returned garbage. Template reports are
//! tagged `model_available: false` so the dashboard can show a banner.

use crate::report::ReportKind;
use crate::types::{Device, DeviceOverview, TrendDirection};

/// Generate a deterministic report for the given kind.
pub fn template_report(kind: ReportKind, device: &Device, overview: &DeviceOverview) -> String {
    match kind {
        ReportKind::Comprehensive => comprehensive(device, overview),
        ReportKind::Anomaly => anomaly(device, overview),
        ReportKind::Trend => trend(device, overview),
        ReportKind::Recommendation => recommendation(device, overview),
    }
}

fn comprehensive(device: &Device, overview: &DeviceOverview) -> String {
    let stats = &overview.statistics;
    let mut out = format!(
        "{} recorded {} readings averaging {:.1}C, ranging from {:.1}C to {:.1}C \
         (stdev {:.2}).",
        device.name, stats.count, stats.mean, stats.min, stats.max, stats.stdev
    );

    if overview.outliers_count > 0 {
        out.push_str(&format!(
            " {} reading(s) deviated sharply from the norm and deserve review.",
            overview.outliers_count
        ));
    } else {
        out.push_str(" No anomalous readings were detected.");
    }

    out.push(' ');
    out.push_str(&trend_sentence(overview));

    if stats.alert_count > 0 {
        out.push_str(&format!(
            " {} reading(s) arrived with alert status; check the device log.",
            stats.alert_count
        ));
    }
    out
}

fn anomaly(device: &Device, overview: &DeviceOverview) -> String {
    if overview.outliers_count == 0 {
        return format!(
            "No anomalous readings detected for {}. All {} readings stayed within \
             {:.2} standard deviations of the {:.1}C mean.",
            device.name, overview.statistics.count, overview.statistics.stdev, overview.statistics.mean
        );
    }

    let mut out = format!(
        "{} anomalous reading(s) detected for {} (mean {:.1}C, stdev {:.2}).",
        overview.outliers_count, device.name, overview.statistics.mean, overview.statistics.stdev
    );
    for o in &overview.outliers {
        out.push_str(&format!(
            " {:.1}C at {} (z-score {:.2}).",
            o.temperature,
            o.timestamp.format("%H:%M"),
            o.z_score
        ));
    }
    out.push_str(
        " Sudden deviations of this size usually point to airflow changes, \
         equipment cycling, or a sensor fault.",
    );
    out
}

fn trend(device: &Device, overview: &DeviceOverview) -> String {
    let t = &overview.trend;
    let movement = match t.direction {
        TrendDirection::Rising => format!(
            "Temperature at {} is rising at roughly {:.2}C per reading",
            device.name,
            t.rate.abs()
        ),
        TrendDirection::Falling => format!(
            "Temperature at {} is falling at roughly {:.2}C per reading",
            device.name,
            t.rate.abs()
        ),
        TrendDirection::Stable => {
            format!("Temperature at {} is holding steady", device.name)
        }
    };
    format!(
        "{}, currently {:.1}C against a {:.1}C average. Recent volatility is {:.2}, \
         which is {} for this window.",
        movement,
        t.current,
        t.mean,
        t.volatility,
        if t.volatility > overview.statistics.stdev {
            "elevated"
        } else {
            "unremarkable"
        }
    )
}

fn recommendation(device: &Device, overview: &DeviceOverview) -> String {
    let stats = &overview.statistics;
    let mut items: Vec<String> = Vec::new();

    if stats.alert_count > 0 {
        items.push(format!(
            "Investigate the {} alert-status reading(s) from {} first.",
            stats.alert_count, device.name
        ));
    }
    if overview.outliers_count > 0 {
        items.push(format!(
            "Review the {} statistical outlier(s); confirm whether the sensor or the \
             environment caused them.",
            overview.outliers_count
        ));
    }
    match overview.trend.direction {
        TrendDirection::Rising => items.push(
            "Temperature is trending upward; verify cooling capacity before it \
             drifts out of range."
                .to_string(),
        ),
        TrendDirection::Falling => items.push(
            "Temperature is trending downward; confirm this matches expected \
             operating conditions."
                .to_string(),
        ),
        TrendDirection::Stable => {}
    }
    if items.is_empty() {
        items.push(format!(
            "{} looks healthy. Continue routine monitoring; no action needed.",
            device.name
        ));
    }
    items.join(" ")
}

fn trend_sentence(overview: &DeviceOverview) -> String {
    let t = &overview.trend;
    match t.direction {
        TrendDirection::Rising => format!(
            "The recent trend is rising ({:+.2}C per reading, now {:.1}C).",
            t.rate, t.current
        ),
        TrendDirection::Falling => format!(
            "The recent trend is falling ({:+.2}C per reading, now {:.1}C).",
            t.rate, t.current
        ),
        TrendDirection::Stable => format!("The recent trend is stable around {:.1}C.", t.current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Outlier, OutlierKind, ReadingStats, TrendReport};

    fn overview(outliers: usize, direction: TrendDirection) -> DeviceOverview {
        DeviceOverview {
            device_id: "sensor-01".into(),
            statistics: ReadingStats {
                count: 24,
                mean: 22.0,
                min: 20.0,
                max: 35.0,
                range: 15.0,
                stdev: 2.1,
                normal_count: 23,
                warning_count: 0,
                alert_count: 1,
            },
            latest_reading: None,
            trend: TrendReport {
                direction,
                rate: match direction {
                    TrendDirection::Rising => 0.5,
                    TrendDirection::Falling => -0.5,
                    TrendDirection::Stable => 0.0,
                },
                current: 23.0,
                mean: 22.0,
                volatility: 1.0,
                moving_average: Vec::new(),
            },
            outliers_count: outliers,
            outliers: (0..outliers)
                .map(|i| Outlier {
                    timestamp: "2024-03-01T09:30:00".parse().unwrap(),
                    temperature: 35.0 + i as f64,
                    z_score: 6.19,
                    kind: OutlierKind::High,
                })
                .collect(),
        }
    }

    fn device() -> Device {
        Device {
            device_id: "sensor-01".into(),
            name: "Server Room".into(),
            location: "basement".into(),
        }
    }

    #[test]
    fn all_kinds_produce_output_with_metrics() {
        let ov = overview(1, TrendDirection::Rising);
        for kind in [
            ReportKind::Comprehensive,
            ReportKind::Anomaly,
            ReportKind::Trend,
            ReportKind::Recommendation,
        ] {
            let text = template_report(kind, &device(), &ov);
            assert!(!text.is_empty(), "empty report for {kind:?}");
            assert!(text.contains("Server Room"), "missing device name for {kind:?}");
        }
    }

    #[test]
    fn anomaly_report_lists_z_scores() {
        let text = template_report(ReportKind::Anomaly, &device(), &overview(2, TrendDirection::Stable));
        assert!(text.contains("z-score 6.19"));
        assert!(text.starts_with("2 anomalous"));
    }

    #[test]
    fn clean_anomaly_report_says_none() {
        let text = template_report(ReportKind::Anomaly, &device(), &overview(0, TrendDirection::Stable));
        assert!(text.starts_with("No anomalous readings"));
    }

    #[test]
    fn recommendation_prioritizes_alerts() {
        let text = template_report(
            ReportKind::Recommendation,
            &device(),
            &overview(1, TrendDirection::Rising),
        );
        assert!(text.starts_with("Investigate the 1 alert-status"));
        assert!(text.contains("cooling capacity"));
    }

    #[test]
    fn trend_report_names_direction() {
        let text = template_report(ReportKind::Trend, &device(), &overview(0, TrendDirection::Falling));
        assert!(text.contains("falling"));
    }
}
