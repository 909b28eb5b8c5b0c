//! Reading sources
//!
//! A [`DataSource`] hides where readings come from: a JSON file on disk or a
//! MySQL table. Every operation is wrapped in bounded retry with exponential
//! backoff; an operation that keeps failing surfaces as
//! [`SourceError::Unavailable`] and maps to a 503 at the API edge.

mod db;
mod file;

pub use db::TableSource;
pub use file::{DeviceBlock, DeviceDocument, FileSource, InlineReading};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::settings::{DataConfig, SourceKind};
use crate::types::{Device, Reading, TimeRange};

/// Data-source errors.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be reached or read after retries.
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    /// The store was reachable but its contents did not parse.
    #[error("malformed source data: {0}")]
    Malformed(String),
    /// The requested device does not exist.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

impl SourceError {
    /// Whether a retry could plausibly succeed.
    fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// Uniform async access to sensor readings, regardless of backing store.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// All known devices, ordered by id.
    async fn devices(&self) -> Result<Vec<Device>, SourceError>;

    /// Metadata for one device.
    async fn device(&self, device_id: &str) -> Result<Device, SourceError>;

    /// Readings for one device within `range`, oldest first.
    async fn readings(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<Reading>, SourceError>;

    /// The most recent reading for one device, if any exist.
    async fn latest_reading(&self, device_id: &str) -> Result<Option<Reading>, SourceError>;

    /// Human-readable backend description for the status endpoint.
    fn describe(&self) -> String;
}

/// Retry policy applied around each source operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &DataConfig) -> Self {
        Self {
            max_attempts: cfg.max_retries.max(1),
            backoff: Duration::from_millis(cfg.retry_backoff_ms),
        }
    }
}

/// Run `op` up to `policy.max_attempts` times, doubling the backoff after
/// each transient failure. Non-transient errors surface immediately.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, op: F) -> Result<T, SourceError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut delay = policy.backoff;
    let mut last_err = None;
    for attempt in 1..=policy.max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                warn!(%what, attempt, error = %e, "source operation failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    // max_attempts >= 1, so at least one iteration ran.
    Err(last_err.unwrap_or_else(|| SourceError::Unavailable(what.to_string())))
}

/// Construct the configured source backend.
pub async fn build_source(cfg: &DataConfig) -> Result<Arc<dyn DataSource>, SourceError> {
    match cfg.source {
        SourceKind::File => Ok(Arc::new(FileSource::new(
            cfg.file_path.clone(),
            RetryPolicy::from_config(cfg),
        ))),
        SourceKind::Table => {
            if cfg.database_url.is_empty() {
                return Err(SourceError::Unavailable(
                    "table source selected but database_url is unset".into(),
                ));
            }
            let source = TableSource::connect(&cfg.database_url, cfg).await?;
            Ok(Arc::new(source))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts: attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(policy(3), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SourceError::Unavailable("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(policy(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SourceError::Unavailable("down".into())) }
        })
        .await;
        assert!(matches!(result, Err(SourceError::Unavailable(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_does_not_repeat_permanent_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(policy(5), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SourceError::UnknownDevice("ghost".into())) }
        })
        .await;
        assert!(matches!(result, Err(SourceError::UnknownDevice(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
