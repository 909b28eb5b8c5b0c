//! Background refresh task
//!
//! Recomputes the per-device overviews on a fixed interval so the dashboard
//! status endpoint always has a recent snapshot, and so source outages show
//! up in the logs before a user hits them. Report text is not regenerated
//! here; model calls only happen on demand.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analyzer::{Analyzer, AnalyzerError};
use crate::stats::StatsError;
use crate::types::{DeviceOverview, TimeRange};

/// Last completed refresh, shared with the API.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub updated_at: Option<DateTime<Utc>>,
    pub device_count: usize,
    pub total_outliers: usize,
    pub refresh_failures: u64,
}

pub type SharedSnapshot = Arc<RwLock<Snapshot>>;

/// Run the refresh loop until the token is cancelled.
pub async fn run(
    analyzer: Arc<Analyzer>,
    snapshot: SharedSnapshot,
    refresh_interval_secs: u64,
    shutdown: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(refresh_interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = refresh_interval_secs, "snapshot poller started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                refresh(&analyzer, &snapshot).await;
            }
            () = shutdown.cancelled() => {
                info!("snapshot poller stopping");
                return;
            }
        }
    }
}

async fn refresh(analyzer: &Analyzer, snapshot: &SharedSnapshot) {
    match collect_overviews(analyzer).await {
        Ok(overviews) => {
            let total_outliers: usize = overviews.iter().map(|o| o.outliers_count).sum();
            if total_outliers > 0 {
                info!(
                    devices = overviews.len(),
                    outliers = total_outliers,
                    "refresh found outliers"
                );
            } else {
                debug!(devices = overviews.len(), "refresh complete");
            }
            let mut guard = snapshot.write().await;
            guard.updated_at = Some(Utc::now());
            guard.device_count = overviews.len();
            guard.total_outliers = total_outliers;
        }
        Err(e) => {
            warn!(error = %e, "snapshot refresh failed");
            snapshot.write().await.refresh_failures += 1;
        }
    }
}

async fn collect_overviews(analyzer: &Analyzer) -> Result<Vec<DeviceOverview>, AnalyzerError> {
    let devices = analyzer.device_list().await?;
    let mut overviews = Vec::with_capacity(devices.len());
    for device in devices {
        match analyzer.overview(&device.device_id, &TimeRange::default()).await {
            Ok(overview) => overviews.push(overview),
            Err(AnalyzerError::Stats(StatsError::EmptyInput)) => {
                debug!(device_id = %device.device_id, "no readings yet, skipped");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(overviews)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::AnalysisConfig;
    use crate::source::{DataSource, SourceError};
    use crate::types::{Device, Reading, ReadingStatus};
    use async_trait::async_trait;

    struct OneDevice;

    #[async_trait]
    impl DataSource for OneDevice {
        async fn devices(&self) -> Result<Vec<Device>, SourceError> {
            Ok(vec![Device {
                device_id: "s1".into(),
                name: "S1".into(),
                location: String::new(),
            }])
        }
        async fn device(&self, _: &str) -> Result<Device, SourceError> {
            Ok(Device {
                device_id: "s1".into(),
                name: "S1".into(),
                location: String::new(),
            })
        }
        async fn readings(&self, _: &str, _: &TimeRange) -> Result<Vec<Reading>, SourceError> {
            Ok(vec![
                Reading {
                    device_id: "s1".into(),
                    timestamp: "2024-03-01T08:00:00".parse().unwrap(),
                    temperature: 20.0,
                    humidity: 50.0,
                    status: ReadingStatus::Normal,
                },
                Reading {
                    device_id: "s1".into(),
                    timestamp: "2024-03-01T08:01:00".parse().unwrap(),
                    temperature: 21.0,
                    humidity: 51.0,
                    status: ReadingStatus::Normal,
                },
            ])
        }
        async fn latest_reading(&self, _: &str) -> Result<Option<Reading>, SourceError> {
            Ok(None)
        }
        fn describe(&self) -> String {
            "test".into()
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl DataSource for BrokenSource {
        async fn devices(&self) -> Result<Vec<Device>, SourceError> {
            Err(SourceError::Unavailable("down".into()))
        }
        async fn device(&self, _: &str) -> Result<Device, SourceError> {
            Err(SourceError::Unavailable("down".into()))
        }
        async fn readings(&self, _: &str, _: &TimeRange) -> Result<Vec<Reading>, SourceError> {
            Err(SourceError::Unavailable("down".into()))
        }
        async fn latest_reading(&self, _: &str) -> Result<Option<Reading>, SourceError> {
            Err(SourceError::Unavailable("down".into()))
        }
        fn describe(&self) -> String {
            "broken".into()
        }
    }

    fn analyzer(source: Arc<dyn DataSource>) -> Arc<Analyzer> {
        Arc::new(Analyzer::new(source, None, &AnalysisConfig::default()))
    }

    #[tokio::test]
    async fn refresh_updates_snapshot() {
        let snapshot: SharedSnapshot = Arc::default();
        refresh(&analyzer(Arc::new(OneDevice)), &snapshot).await;
        let guard = snapshot.read().await;
        assert!(guard.updated_at.is_some());
        assert_eq!(guard.device_count, 1);
        assert_eq!(guard.refresh_failures, 0);
    }

    #[tokio::test]
    async fn failed_refresh_is_counted() {
        let snapshot: SharedSnapshot = Arc::default();
        refresh(&analyzer(Arc::new(BrokenSource)), &snapshot).await;
        let guard = snapshot.read().await;
        assert!(guard.updated_at.is_none());
        assert_eq!(guard.refresh_failures, 1);
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let snapshot: SharedSnapshot = Arc::default();
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(analyzer(Arc::new(OneDevice)), snapshot, 3600, token.clone()));
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
    }
}
