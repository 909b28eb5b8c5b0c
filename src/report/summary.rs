//! Data summary and prompt construction.

use serde::Deserialize;

use crate::config::defaults;
use crate::types::{Device, DeviceOverview, TimeRange};

/// Which angle the generated report should take.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Full picture: statistics, anomalies, trend, and advice.
    #[default]
    Comprehensive,
    /// Focus on flagged outliers and their likely causes.
    Anomaly,
    /// Focus on where the temperature is heading.
    Trend,
    /// Focus on operational next steps.
    Recommendation,
}

/// Render the analysis into the plain-text block fed to the model.
///
/// Quotes at most [`defaults::SUMMARY_OUTLIER_LIMIT`] outliers so the prompt
/// stays short even when a device misbehaves badly. Also returned verbatim
/// in the analysis payload so the dashboard can show exactly what the model
/// saw.
pub fn build_data_summary(device: &Device, overview: &DeviceOverview, range: &TimeRange) -> String {
    let stats = &overview.statistics;
    let trend = &overview.trend;

    let mut out = String::new();
    out.push_str(&format!(
        "Device: {} ({}), location: {}\n",
        device.name,
        device.device_id,
        if device.location.is_empty() {
            "unknown"
        } else {
            &device.location
        }
    ));
    out.push_str(&format!("Readings analyzed: {}\n", stats.count));
    match (range.start, range.end) {
        (Some(start), Some(end)) => out.push_str(&format!(
            "Date range: {} to {}\n",
            start.format("%Y-%m-%d %H:%M:%S"),
            end.format("%Y-%m-%d %H:%M:%S")
        )),
        (Some(start), None) => out.push_str(&format!(
            "Date range: from {}\n",
            start.format("%Y-%m-%d %H:%M:%S")
        )),
        (None, Some(end)) => out.push_str(&format!(
            "Date range: until {}\n",
            end.format("%Y-%m-%d %H:%M:%S")
        )),
        (None, None) => {}
    }
    out.push_str(&format!(
        "Temperature: mean {:.2}C, min {:.2}C, max {:.2}C, range {:.2}C, stdev {:.2}\n",
        stats.mean, stats.min, stats.max, stats.range, stats.stdev
    ));
    out.push_str(&format!(
        "Status counts: {} normal, {} warning, {} alert\n",
        stats.normal_count, stats.warning_count, stats.alert_count
    ));

    if let Some(latest) = &overview.latest_reading {
        out.push_str(&format!(
            "Latest reading: {:.2}C / {:.1}% humidity at {} ({})\n",
            latest.temperature,
            latest.humidity,
            latest.timestamp.format("%Y-%m-%d %H:%M:%S"),
            latest.status
        ));
    }

    out.push_str(&format!(
        "Trend: {} at {:+.3}C per reading, current {:.2}C, volatility {:.2}\n",
        trend.direction, trend.rate, trend.current, trend.volatility
    ));

    if overview.outliers_count == 0 {
        out.push_str("Outliers: none detected\n");
    } else {
        out.push_str(&format!(
            "Outliers: {} detected (showing up to {})\n",
            overview.outliers_count,
            overview.outliers.len().min(defaults::SUMMARY_OUTLIER_LIMIT)
        ));
        for o in overview.outliers.iter().take(defaults::SUMMARY_OUTLIER_LIMIT) {
            out.push_str(&format!(
                "  - {} at {}: {:.2}C (z-score {:.2})\n",
                kind_label(o.kind),
                o.timestamp.format("%Y-%m-%d %H:%M:%S"),
                o.temperature,
                o.z_score
            ));
        }
    }

    out
}

/// Wrap the data summary in kind-specific instructions.
pub fn build_prompt(kind: ReportKind, data_summary: &str) -> String {
    let instruction = match kind {
        ReportKind::Comprehensive => {
            "Write a concise monitoring report covering overall temperature behavior, \
             any anomalies, the recent trend, and one or two practical recommendations."
        }
        ReportKind::Anomaly => {
            "Focus on the flagged outlier readings. Explain how far they deviate from \
             normal behavior and suggest likely causes worth checking."
        }
        ReportKind::Trend => {
            "Focus on the temperature trend. Say where the temperature is heading, \
             how fast, and whether the movement looks significant or routine."
        }
        ReportKind::Recommendation => {
            "Give short, actionable recommendations for the operator based on this \
             data. Lead with the most urgent item."
        }
    };

    format!(
        "You are an IoT monitoring assistant analyzing temperature sensor data.\n\n\
         Sensor data summary:\n{data_summary}\n\
         {instruction}\n\
         Keep the response under 200 words and avoid repeating the raw numbers verbatim."
    )
}

fn kind_label(kind: crate::types::OutlierKind) -> &'static str {
    match kind {
        crate::types::OutlierKind::High => "high spike",
        crate::types::OutlierKind::Low => "low dip",
    }
}
