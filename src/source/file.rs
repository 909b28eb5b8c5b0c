//! JSON file source
//!
//! Accepts two on-disk layouts: a document with a `devices` array where each
//! device carries its readings inline, or a flat array of reading records
//! keyed by `device_id`. The file is re-read on every call so external edits
//! show up on the next poll.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{with_retry, DataSource, RetryPolicy, SourceError};
use crate::types::{Device, Reading, ReadingStatus, TimeRange};

/// One reading inside a device block, without the redundant device id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineReading {
    pub timestamp: chrono::NaiveDateTime,
    pub temperature: f64,
    pub humidity: f64,
    #[serde(default)]
    pub status: ReadingStatus,
}

/// A device and its readings, as stored in the nested layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceBlock {
    pub device_id: String,
    pub device_name: String,
    pub location: String,
    pub readings: Vec<InlineReading>,
}

/// Top-level nested document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDocument {
    pub devices: Vec<DeviceBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDataset {
    Nested(DeviceDocument),
    Flat(Vec<Reading>),
}

#[derive(Debug, Default)]
struct Loaded {
    devices: Vec<Device>,
    readings: BTreeMap<String, Vec<Reading>>,
}

/// Readings backed by a JSON file on disk.
pub struct FileSource {
    path: PathBuf,
    retry: RetryPolicy,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, retry: RetryPolicy) -> Self {
        Self {
            path: path.into(),
            retry,
        }
    }

    async fn load(&self) -> Result<Loaded, SourceError> {
        let path = self.path.clone();
        with_retry(self.retry, "file read", || {
            let path = path.clone();
            async move { read_dataset(&path).await }
        })
        .await
    }
}

async fn read_dataset(path: &Path) -> Result<Loaded, SourceError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?;
    let raw: RawDataset = serde_json::from_slice(&bytes)
        .map_err(|e| SourceError::Malformed(format!("{}: {e}", path.display())))?;

    let mut loaded = Loaded::default();
    match raw {
        RawDataset::Nested(doc) => {
            for block in doc.devices {
                let readings = block
                    .readings
                    .into_iter()
                    .map(|r| Reading {
                        device_id: block.device_id.clone(),
                        timestamp: r.timestamp,
                        temperature: r.temperature,
                        humidity: r.humidity,
                        status: r.status,
                    })
                    .collect();
                loaded.readings.insert(block.device_id.clone(), readings);
                loaded.devices.push(Device {
                    device_id: block.device_id,
                    name: block.device_name,
                    location: block.location,
                });
            }
        }
        RawDataset::Flat(records) => {
            // Flat records carry no device metadata, so synthesize it.
            for r in records {
                loaded
                    .readings
                    .entry(r.device_id.clone())
                    .or_default()
                    .push(r);
            }
            for device_id in loaded.readings.keys() {
                loaded.devices.push(Device {
                    device_id: device_id.clone(),
                    name: device_id.clone(),
                    location: String::new(),
                });
            }
        }
    }

    for readings in loaded.readings.values_mut() {
        readings.sort_by_key(|r| r.timestamp);
    }
    loaded.devices.sort_by(|a, b| a.device_id.cmp(&b.device_id));
    debug!(
        path = %path.display(),
        devices = loaded.devices.len(),
        "loaded dataset"
    );
    Ok(loaded)
}

#[async_trait]
impl DataSource for FileSource {
    async fn devices(&self) -> Result<Vec<Device>, SourceError> {
        Ok(self.load().await?.devices)
    }

    async fn device(&self, device_id: &str) -> Result<Device, SourceError> {
        self.load()
            .await?
            .devices
            .into_iter()
            .find(|d| d.device_id == device_id)
            .ok_or_else(|| SourceError::UnknownDevice(device_id.to_string()))
    }

    async fn readings(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<Reading>, SourceError> {
        let loaded = self.load().await?;
        let Some(readings) = loaded.readings.get(device_id) else {
            return Err(SourceError::UnknownDevice(device_id.to_string()));
        };
        Ok(readings
            .iter()
            .filter(|r| range.contains(r.timestamp))
            .cloned()
            .collect())
    }

    async fn latest_reading(&self, device_id: &str) -> Result<Option<Reading>, SourceError> {
        let loaded = self.load().await?;
        let Some(readings) = loaded.readings.get(device_id) else {
            return Err(SourceError::UnknownDevice(device_id.to_string()));
        };
        Ok(readings.last().cloned())
    }

    fn describe(&self) -> String {
        format!("json file ({})", self.path.display())
    }
}
