//! Thermowatch: edge IoT temperature analysis dashboard
//!
//! Loads sensor readings from a JSON file or a MySQL table, runs descriptive
//! statistics with z-score outlier flagging and moving-average trends, and
//! generates plain-language reports via a local GGUF model, a remote
//! OpenAI-compatible API, or deterministic templates.
//!
//! ## Architecture
//!
//! - **source**: pluggable reading backends with bounded retry
//! - **stats**: summaries, outlier detection, trend classification
//! - **report**: data summaries, prompts, and template fallbacks
//! - **llm**: model backends (never fatal; failure degrades to templates)
//! - **analyzer**: orchestration shared by the API and the poller
//! - **api**: axum dashboard with SSE streaming

pub mod analyzer;
pub mod api;
pub mod config;
pub mod llm;
pub mod poller;
pub mod report;
pub mod source;
pub mod stats;
pub mod types;

// Re-export the engine and its error
pub use analyzer::{Analyzer, AnalyzerError};

// Re-export commonly used types
pub use types::{
    AnalysisResult, ChartData, Device, DeviceOverview, DeviceSummary, Outlier, OutlierKind,
    Reading, ReadingStats, ReadingStatus, TimeRange, TrendDirection, TrendReport,
};

// Re-export the source seam
pub use source::{DataSource, FileSource, SourceError, TableSource};

// Re-export report entry points
pub use report::ReportKind;
