//! Analysis orchestration
//!
//! Pulls readings from the configured source, runs the statistics layer, and
//! produces report text. Model failures downgrade to template reports; only
//! source failures and empty datasets surface to the caller.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::warn;

use crate::config::defaults;
use crate::config::settings::AnalysisConfig;
use crate::llm::{LlmBackend, TextStream};
use crate::report::{build_data_summary, build_prompt, template_report, ReportKind};
use crate::source::{DataSource, SourceError};
use crate::stats::{self, StatsError};
use crate::types::{
    AnalysisResult, ChartData, Device, DeviceOverview, DeviceSummary, TimeRange,
};

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// Shared analysis engine behind the API and the background poller.
pub struct Analyzer {
    source: Arc<dyn DataSource>,
    model: Option<Arc<dyn LlmBackend>>,
    outlier_threshold: f64,
    window_size: usize,
}

impl Analyzer {
    pub fn new(
        source: Arc<dyn DataSource>,
        model: Option<Arc<dyn LlmBackend>>,
        cfg: &AnalysisConfig,
    ) -> Self {
        Self {
            source,
            model,
            outlier_threshold: cfg.outlier_threshold,
            window_size: cfg.window_size,
        }
    }

    pub fn model_name(&self) -> Option<&'static str> {
        self.model.as_ref().map(|m| m.name())
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Devices with their reading counts, for the dashboard selector.
    pub async fn device_list(&self) -> Result<Vec<DeviceSummary>, AnalyzerError> {
        let devices = self.source.devices().await?;
        let mut out = Vec::with_capacity(devices.len());
        for device in devices {
            let readings = self
                .source
                .readings(&device.device_id, &TimeRange::default())
                .await?;
            out.push(DeviceSummary {
                device_id: device.device_id,
                name: device.name,
                location: device.location,
                readings_count: readings.len(),
            });
        }
        Ok(out)
    }

    /// Statistics, outliers, and trend for one device. No model involved.
    pub async fn overview(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<DeviceOverview, AnalyzerError> {
        let readings = self.source.readings(device_id, range).await?;
        let statistics = stats::summarize(&readings)?;
        let outliers = stats::detect_outliers(&readings, self.outlier_threshold);
        let trend = stats::trend_report(&readings, self.window_size);

        Ok(DeviceOverview {
            device_id: device_id.to_string(),
            statistics,
            latest_reading: readings.last().cloned(),
            trend,
            outliers_count: outliers.len(),
            outliers: outliers
                .into_iter()
                .take(defaults::OVERVIEW_OUTLIER_LIMIT)
                .collect(),
        })
    }

    /// Chart-ready series for one device.
    pub async fn chart_data(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<ChartData, AnalyzerError> {
        let readings = self.source.readings(device_id, range).await?;
        let mut chart = ChartData::default();
        for r in &readings {
            chart
                .timestamps
                .push(r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
            chart.temperatures.push(r.temperature);
            chart.humidity.push(r.humidity);
            chart.status.push(r.status);
        }
        Ok(chart)
    }

    /// Full analysis with generated report text.
    pub async fn analyze_device(
        &self,
        device_id: &str,
        kind: ReportKind,
        range: &TimeRange,
    ) -> Result<AnalysisResult, AnalyzerError> {
        let device = self.source.device(device_id).await?;
        let overview = self.overview(device_id, range).await?;
        let data_summary = build_data_summary(&device, &overview, range);

        let (llm_text, model_available) = match &self.model {
            Some(model) => {
                let prompt = build_prompt(kind, &data_summary);
                match model.generate(&prompt).await {
                    Ok(text) if !text.is_empty() => (text, true),
                    Ok(_) => {
                        warn!(%device_id, "model returned empty text, using template");
                        (template_report(kind, &device, &overview), false)
                    }
                    Err(e) => {
                        warn!(%device_id, error = %e, "model failed, using template");
                        (template_report(kind, &device, &overview), false)
                    }
                }
            }
            None => (template_report(kind, &device, &overview), false),
        };

        Ok(AnalysisResult {
            overview,
            llm_text,
            data_summary,
            model_available,
        })
    }

    /// Streaming variant for the SSE endpoint. The returned stream yields
    /// report fragments; template fallbacks stream one sentence-line at a
    /// time so the dashboard renders both paths the same way.
    pub async fn analyze_device_stream(
        &self,
        device_id: &str,
        kind: ReportKind,
        range: &TimeRange,
    ) -> Result<(DeviceOverview, TextStream), AnalyzerError> {
        let device = self.source.device(device_id).await?;
        let overview = self.overview(device_id, range).await?;
        let data_summary = build_data_summary(&device, &overview, range);

        if let Some(model) = &self.model {
            let prompt = build_prompt(kind, &data_summary);
            match model.generate_stream(&prompt).await {
                Ok(stream) => return Ok((overview, stream)),
                Err(e) => {
                    warn!(%device_id, error = %e, "model stream failed, using template");
                }
            }
        }

        let fragments: Vec<_> = template_report(kind, &device, &overview)
            .split_inclusive('\n')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok((overview, stream::iter(fragments).boxed()))
    }

    /// Analyze every device in one pass, skipping those with no readings in
    /// the range. Backs the fleet-wide analysis endpoint.
    pub async fn analyze_all(
        &self,
        kind: ReportKind,
        range: &TimeRange,
    ) -> Result<Vec<AnalysisResult>, AnalyzerError> {
        let devices = self.source.devices().await?;
        let mut results = Vec::with_capacity(devices.len());
        for device in devices {
            match self.analyze_device(&device.device_id, kind, range).await {
                Ok(result) => results.push(result),
                Err(AnalyzerError::Stats(StatsError::EmptyInput)) => {
                    warn!(device_id = %device.device_id, "device has no readings, skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// Device metadata passthrough for handlers that need it.
    pub async fn device(&self, device_id: &str) -> Result<Device, AnalyzerError> {
        Ok(self.source.device(device_id).await?)
    }

    /// Raw readings passthrough.
    pub async fn readings(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<crate::types::Reading>, AnalyzerError> {
        Ok(self.source.readings(device_id, range).await?)
    }
}
