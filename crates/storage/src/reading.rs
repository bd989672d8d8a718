//! Reading and aggregate types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate key assigned by the store on insert, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReadingId(pub i64);

impl fmt::Display for ReadingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One timestamped soil sample as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: ReadingId,
    pub timestamp: DateTime<Utc>,
    /// Degrees Celsius, unvalidated range
    pub temperature: f64,
    /// Raw capacitive moisture count (observed 0-1023)
    pub moisture: i64,
}

impl Reading {
    /// Ordering key of the table: timestamp first, id breaks ties
    pub fn sort_key(&self) -> (DateTime<Utc>, ReadingId) {
        (self.timestamp, self.id)
    }
}

/// Raw-precision statistics over a non-empty window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateStats {
    pub count: u64,
    pub temperature_avg: f64,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub moisture_avg: f64,
    pub moisture_min: i64,
    pub moisture_max: i64,
}

/// Result of a window aggregate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    /// No rows matched the window
    EmptyWindow,
    Window(AggregateStats),
}

impl Aggregate {
    pub fn count(&self) -> u64 {
        match self {
            Aggregate::EmptyWindow => 0,
            Aggregate::Window(stats) => stats.count,
        }
    }
}

/// Drop sub-millisecond precision, matching what the table stores
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

/// Smallest stored millisecond not earlier than `ts`.
///
/// Window bounds compare against millisecond columns, so a bound with a
/// sub-millisecond fraction rounds up rather than down.
pub(crate) fn ceil_millis(ts: DateTime<Utc>) -> i64 {
    let millis = ts.timestamp_millis();
    if ts.timestamp_subsec_nanos() % 1_000_000 == 0 {
        millis
    } else {
        millis.saturating_add(1)
    }
}
