//! Soil Reading Ingestion
//!
//! Drives the single-writer cycle: read the sensor, validate the sample,
//! persist it, retire rows past the retention horizon, and publish the
//! latest-reading snapshot.

mod cycle;
mod retention;
mod snapshot;
mod trigger;

pub use cycle::{CycleOutcome, CycleState, IngestionLoop, LoopSummary};
pub use retention::{Retention, RetentionPolicy, DEFAULT_RETENTION_DAYS};
pub use snapshot::{FileSnapshotPublisher, PublishError, SnapshotPublisher};
pub use trigger::{ChannelTrigger, IntervalTrigger, Trigger};
