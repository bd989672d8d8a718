//! Repository Implementation

use crate::clock::{Clock, SystemClock};
use crate::reading::{ceil_millis, truncate_to_millis};
use crate::{Aggregate, AggregateStats, Reading, ReadingId, StorageError};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const SELECT_COLUMNS: &str = "SELECT id, timestamp_ms, temperature, moisture FROM sensor_readings";

/// Store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,
    /// Upper bound on waiting for a lock or a pooled connection
    pub busy_timeout: Duration,
    /// Pool size (one writer plus concurrent readers)
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sensor_data.db"),
            busy_timeout: Duration::from_millis(5000),
            max_connections: 4,
        }
    }
}

/// Append-only time series of readings
///
/// Cheap to clone; clones share the connection pool and clock.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl Store {
    /// Open (creating if needed) the database file and initialize the schema
    pub async fn open(config: &StoreConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(config.busy_timeout)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.ensure_schema().await?;
        info!(path = %config.path.display(), "Opened sensor store");
        Ok(store)
    }

    /// Create a private in-memory store
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is its own database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        let store = Self {
            pool,
            clock: Arc::new(SystemClock),
        };
        store.ensure_schema().await?;
        debug!("Created in-memory sensor store");
        Ok(store)
    }

    /// Replace the clock used for default insert timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create the table and its time index (idempotent)
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sensor_readings (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp_ms INTEGER NOT NULL,
                temperature  REAL    NOT NULL,
                moisture     INTEGER NOT NULL
            )
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Schema(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_sensor_readings_timestamp
                ON sensor_readings (timestamp_ms, id)
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Schema(e.to_string()))?;

        tx.commit().await?;
        Ok(())
    }

    /// Append a reading; the timestamp defaults to the store clock's now
    pub async fn insert(
        &self,
        temperature: f64,
        moisture: i64,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<ReadingId, StorageError> {
        let timestamp = truncate_to_millis(timestamp.unwrap_or_else(|| self.clock.now()));

        match self.insert_row(temperature, moisture, timestamp).await {
            Err(e) if e.is_missing_schema() => {
                warn!("Readings table missing on insert, recreating schema: {}", e);
                self.ensure_schema().await?;
                self.insert_row(temperature, moisture, timestamp).await
            }
            result => result,
        }
    }

    async fn insert_row(
        &self,
        temperature: f64,
        moisture: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<ReadingId, StorageError> {
        let result = sqlx::query(
            "INSERT INTO sensor_readings (timestamp_ms, temperature, moisture) VALUES (?, ?, ?)",
        )
        .bind(timestamp.timestamp_millis())
        .bind(temperature)
        .bind(moisture)
        .execute(&self.pool)
        .await?;

        let id = ReadingId(result.last_insert_rowid());
        debug!(%id, temperature, moisture, "Inserted reading");
        Ok(id)
    }

    /// Row with the greatest (timestamp, id), if any
    pub async fn latest(&self) -> Result<Option<Reading>, StorageError> {
        let query = format!("{SELECT_COLUMNS} ORDER BY timestamp_ms DESC, id DESC LIMIT 1");
        let row = sqlx::query(&query).fetch_optional(&self.pool).await?;

        row.as_ref().map(reading_from_row).transpose()
    }

    /// All rows with `timestamp >= since`, ascending by (timestamp, id)
    pub async fn range(&self, since: DateTime<Utc>) -> Result<Vec<Reading>, StorageError> {
        let query =
            format!("{SELECT_COLUMNS} WHERE timestamp_ms >= ? ORDER BY timestamp_ms ASC, id ASC");
        let rows = sqlx::query(&query)
            .bind(ceil_millis(since))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(reading_from_row).collect()
    }

    /// Delete rows with `timestamp < cutoff`, returning how many were removed
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM sensor_readings WHERE timestamp_ms < ?")
            .bind(ceil_millis(cutoff))
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(%cutoff, removed, "Deleted old readings");
        }
        Ok(removed)
    }

    /// Count/avg/min/max over `timestamp >= since`, computed by SQLite in one pass
    pub async fn aggregate(&self, since: DateTime<Utc>) -> Result<Aggregate, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*)         AS count,
                AVG(temperature) AS avg_temp,
                MIN(temperature) AS min_temp,
                MAX(temperature) AS max_temp,
                AVG(moisture)    AS avg_moisture,
                MIN(moisture)    AS min_moisture,
                MAX(moisture)    AS max_moisture
            FROM sensor_readings
            WHERE timestamp_ms >= ?
            "#,
        )
        .bind(ceil_millis(since))
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("count")?;
        if count == 0 {
            return Ok(Aggregate::EmptyWindow);
        }

        Ok(Aggregate::Window(AggregateStats {
            count: count as u64,
            temperature_avg: non_null(&row, "avg_temp")?,
            temperature_min: non_null(&row, "min_temp")?,
            temperature_max: non_null(&row, "max_temp")?,
            moisture_avg: non_null(&row, "avg_moisture")?,
            moisture_min: non_null(&row, "min_moisture")?,
            moisture_max: non_null(&row, "max_moisture")?,
        }))
    }

    /// Total number of stored readings
    pub async fn count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sensor_readings")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    /// Close the pool, waiting for in-flight queries
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn non_null<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StorageError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    let value: Option<T> = row.try_get(column)?;
    value.ok_or_else(|| StorageError::DatabaseError(format!("{column} is NULL in non-empty window")))
}

fn reading_from_row(row: &SqliteRow) -> Result<Reading, StorageError> {
    let id: i64 = row.try_get("id")?;
    let timestamp_ms: i64 = row.try_get("timestamp_ms")?;
    let timestamp = DateTime::from_timestamp_millis(timestamp_ms)
        .ok_or(StorageError::CorruptTimestamp { id, timestamp_ms })?;

    Ok(Reading {
        id: ReadingId(id),
        timestamp,
        temperature: row.try_get("temperature")?,
        moisture: row.try_get("moisture")?,
    })
}
