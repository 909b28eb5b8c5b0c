//! Sensor reading and analysis types

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Operational status attached to each reading by the edge device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadingStatus {
    #[default]
    Normal,
    Warning,
    Alert,
}

impl std::fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::Warning => write!(f, "warning"),
            Self::Alert => write!(f, "alert"),
        }
    }
}

/// One timestamped sensor sample.
///
/// Immutable once recorded. Readings are ordered by timestamp within a device;
/// the data sources guarantee ascending order on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub device_id: String,
    /// Naive local datetime — matches both the ISO strings in the JSON file
    /// and the MySQL DATETIME column.
    pub timestamp: NaiveDateTime,
    /// Temperature (°C)
    pub temperature: f64,
    /// Relative humidity (%)
    pub humidity: f64,
    pub status: ReadingStatus,
}

/// A registered sensor device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub name: String,
    pub location: String,
}

/// Inclusive time range filter for reading queries.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TimeRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    /// Whether a timestamp falls inside the range (both bounds inclusive).
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        if let Some(start) = self.start {
            if ts < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if ts > end {
                return false;
            }
        }
        true
    }

    /// True when neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }
}

// ============================================================================
// Derived analysis types (non-persistent, recomputed per request)
// ============================================================================

/// Descriptive statistics over one device's readings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    /// Sample standard deviation (n−1). Zero for a single reading.
    pub stdev: f64,
    pub normal_count: usize,
    pub warning_count: usize,
    pub alert_count: usize,
}

/// Whether an outlier sits above or below the mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierKind {
    High,
    Low,
}

/// One reading flagged by the z-score test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlier {
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    /// |temperature − mean| / stdev, rounded to 2 decimals for display.
    pub z_score: f64,
    pub kind: OutlierKind,
}

/// Direction of the recent temperature trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rising => write!(f, "rising"),
            Self::Falling => write!(f, "falling"),
            Self::Stable => write!(f, "stable"),
        }
    }
}

/// One point of the moving-average series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: NaiveDateTime,
    pub average: f64,
}

/// Sliding-window trend analysis for one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendReport {
    pub direction: TrendDirection,
    /// Temperature change per reading over the trailing window (°C).
    pub rate: f64,
    pub current: f64,
    pub mean: f64,
    /// Sample standard deviation over the full series.
    pub volatility: f64,
    pub moving_average: Vec<TrendPoint>,
}

/// Device list entry with its reading count.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSummary {
    pub device_id: String,
    pub name: String,
    pub location: String,
    pub readings_count: usize,
}

/// Per-device overview: statistics, outliers, and trend — no LLM involved.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceOverview {
    pub device_id: String,
    pub statistics: ReadingStats,
    pub latest_reading: Option<Reading>,
    pub trend: TrendReport,
    pub outliers_count: usize,
    /// First few outliers for display (the capped list the dashboard shows).
    pub outliers: Vec<Outlier>,
}

/// Full analysis result including the generated report text.
///
/// Derived and non-persistent; freshness is whatever the last poll or request
/// loaded from the source.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub overview: DeviceOverview,
    pub llm_text: String,
    pub data_summary: String,
    /// False when the report came from the deterministic template fallback.
    pub model_available: bool,
}

/// Chart-ready series for the dashboard.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChartData {
    pub timestamps: Vec<String>,
    pub temperatures: Vec<f64>,
    pub humidity: Vec<f64>,
    pub status: Vec<ReadingStatus>,
}
