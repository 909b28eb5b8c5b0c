//! MySQL table source
//!
//! Two tables: `devices` holds metadata, `readings` holds the samples.
//! Temperature and humidity are stored as DOUBLE so rows map straight to
//! `f64` without a decimal conversion step. The schema is created on connect
//! when missing.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use sqlx::QueryBuilder;
use tracing::info;

use super::{with_retry, DataSource, RetryPolicy, SourceError};
use crate::config::settings::DataConfig;
use crate::types::{Device, Reading, ReadingStatus, TimeRange};

const CREATE_DEVICES: &str = r#"
CREATE TABLE IF NOT EXISTS devices (
    device_id   VARCHAR(64)  NOT NULL PRIMARY KEY,
    device_name VARCHAR(128) NOT NULL,
    location    VARCHAR(128) NOT NULL
)
"#;

const CREATE_READINGS: &str = r#"
CREATE TABLE IF NOT EXISTS readings (
    id          BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
    device_id   VARCHAR(64) NOT NULL,
    ts          DATETIME    NOT NULL,
    temperature DOUBLE      NOT NULL,
    humidity    DOUBLE      NOT NULL,
    status      VARCHAR(16) NOT NULL DEFAULT 'normal',
    INDEX idx_device_ts (device_id, ts)
)
"#;

#[derive(sqlx::FromRow)]
struct ReadingRow {
    device_id: String,
    ts: NaiveDateTime,
    temperature: f64,
    humidity: f64,
    status: String,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            device_id: row.device_id,
            timestamp: row.ts,
            temperature: row.temperature,
            humidity: row.humidity,
            status: parse_status(&row.status),
        }
    }
}

#[derive(sqlx::FromRow)]
struct DeviceRow {
    device_id: String,
    device_name: String,
    location: String,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            device_id: row.device_id,
            name: row.device_name,
            location: row.location,
        }
    }
}

/// Unknown status strings degrade to Normal rather than failing the query.
fn parse_status(s: &str) -> ReadingStatus {
    match s {
        "warning" => ReadingStatus::Warning,
        "alert" => ReadingStatus::Alert,
        _ => ReadingStatus::Normal,
    }
}

fn db_err(e: sqlx::Error) -> SourceError {
    SourceError::Unavailable(format!("mysql: {e}"))
}

/// Readings backed by a MySQL table pair.
pub struct TableSource {
    pool: MySqlPool,
    retry: RetryPolicy,
    readings_limit: u32,
    database: String,
}

impl TableSource {
    /// Connect, bootstrap the schema, and return a ready source.
    pub async fn connect(url: &str, cfg: &DataConfig) -> Result<Self, SourceError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .connect(url)
            .await
            .map_err(db_err)?;

        sqlx::query(CREATE_DEVICES)
            .execute(&pool)
            .await
            .map_err(db_err)?;
        sqlx::query(CREATE_READINGS)
            .execute(&pool)
            .await
            .map_err(db_err)?;

        let database = url
            .rsplit('/')
            .next()
            .and_then(|tail| tail.split('?').next())
            .unwrap_or("mysql")
            .to_string();
        info!(%database, "mysql source ready");

        Ok(Self {
            pool,
            retry: RetryPolicy::from_config(cfg),
            readings_limit: cfg.readings_limit,
            database,
        })
    }

    /// Insert or update a device row.
    pub async fn upsert_device(&self, device: &Device) -> Result<(), SourceError> {
        sqlx::query(
            "INSERT INTO devices (device_id, device_name, location) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE device_name = VALUES(device_name), \
             location = VALUES(location)",
        )
        .bind(&device.device_id)
        .bind(&device.name)
        .bind(&device.location)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Append one reading.
    pub async fn insert_reading(&self, reading: &Reading) -> Result<(), SourceError> {
        sqlx::query(
            "INSERT INTO readings (device_id, ts, temperature, humidity, status) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&reading.device_id)
        .bind(reading.timestamp)
        .bind(reading.temperature)
        .bind(reading.humidity)
        .bind(reading.status.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// A query returning no rows is ambiguous: the device may be unknown, or
    /// known with nothing in the range. The file backend errors on unknown
    /// devices, so the table backend checks the devices relation to match.
    async fn ensure_device_known(&self, device_id: &str) -> Result<(), SourceError> {
        let known: Option<String> =
            sqlx::query_scalar("SELECT device_id FROM devices WHERE device_id = ?")
                .bind(device_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        match known {
            Some(_) => Ok(()),
            None => Err(SourceError::UnknownDevice(device_id.to_string())),
        }
    }

    async fn fetch_readings(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<Reading>, SourceError> {
        let mut qb = QueryBuilder::new(
            "SELECT device_id, ts, temperature, humidity, status FROM readings WHERE device_id = ",
        );
        qb.push_bind(device_id);
        if let Some(start) = range.start {
            qb.push(" AND ts >= ").push_bind(start);
        }
        if let Some(end) = range.end {
            qb.push(" AND ts <= ").push_bind(end);
        }
        // Most recent rows first, capped, then reversed back to ascending.
        qb.push(" ORDER BY ts DESC LIMIT ");
        qb.push_bind(self.readings_limit);

        let rows: Vec<ReadingRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        if rows.is_empty() {
            self.ensure_device_known(device_id).await?;
        }
        let mut readings: Vec<Reading> = rows.into_iter().map(Reading::from).collect();
        readings.reverse();
        Ok(readings)
    }
}

#[async_trait]
impl DataSource for TableSource {
    async fn devices(&self) -> Result<Vec<Device>, SourceError> {
        with_retry(self.retry, "devices query", || async {
            let rows: Vec<DeviceRow> =
                sqlx::query_as("SELECT device_id, device_name, location FROM devices ORDER BY device_id")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(db_err)?;
            Ok(rows.into_iter().map(Device::from).collect())
        })
        .await
    }

    async fn device(&self, device_id: &str) -> Result<Device, SourceError> {
        with_retry(self.retry, "device query", || async {
            let row: Option<DeviceRow> = sqlx::query_as(
                "SELECT device_id, device_name, location FROM devices WHERE device_id = ?",
            )
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            row.map(Device::from)
                .ok_or_else(|| SourceError::UnknownDevice(device_id.to_string()))
        })
        .await
    }

    async fn readings(
        &self,
        device_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<Reading>, SourceError> {
        with_retry(self.retry, "readings query", || {
            self.fetch_readings(device_id, range)
        })
        .await
    }

    async fn latest_reading(&self, device_id: &str) -> Result<Option<Reading>, SourceError> {
        with_retry(self.retry, "latest reading query", || async {
            let row: Option<ReadingRow> = sqlx::query_as(
                "SELECT device_id, ts, temperature, humidity, status FROM readings \
                 WHERE device_id = ? ORDER BY ts DESC LIMIT 1",
            )
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
            if row.is_none() {
                self.ensure_device_known(device_id).await?;
            }
            Ok(row.map(Reading::from))
        })
        .await
    }

    fn describe(&self) -> String {
        format!("mysql ({})", self.database)
    }
}
