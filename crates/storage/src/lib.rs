//! Storage Layer
//!
//! Append-only SQLite table of soil sensor readings keyed by time, with
//! retention deletes and single-pass window aggregates.

mod clock;
mod present;
mod reading;
mod repository;

pub use clock::{Clock, ManualClock, SystemClock};
pub use present::{celsius_to_fahrenheit, round_dp, PresentedReading};
pub use reading::{truncate_to_millis, Aggregate, AggregateStats, Reading, ReadingId};
pub use repository::{Store, StoreConfig};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backing database could not be reached (pool closed, I/O, timeout)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    /// The readings table is missing or could not be created
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    /// A stored timestamp is outside the representable range
    #[error("Corrupt timestamp in row {id}: {timestamp_ms}")]
    CorruptTimestamp { id: i64, timestamp_ms: i64 },
}

impl StorageError {
    /// True when the failure means the schema has to be (re)created
    pub fn is_missing_schema(&self) -> bool {
        matches!(self, StorageError::Schema(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.message().starts_with("no such table") => {
                StorageError::Schema(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StorageError::Unavailable(err.to_string()),
            _ => StorageError::DatabaseError(err.to_string()),
        }
    }
}
