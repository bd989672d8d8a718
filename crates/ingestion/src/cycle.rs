//! Ingestion Loop Implementation

use crate::retention::{Retention, RetentionPolicy};
use crate::snapshot::SnapshotPublisher;
use crate::trigger::Trigger;
use data_validator::{ValidationError, Validator};
use soil_sensor::{Sensor, SensorError};
use storage::{truncate_to_millis, Reading, StorageError, Store};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Where the loop is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Reading,
    Validating,
    Persisting,
    Publishing,
}

/// Result of one tick. Every variant leaves the loop ready for the next tick.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Reading persisted. `retired` is `None` when the retention delete failed.
    Stored {
        reading: Reading,
        retired: Option<u64>,
        published: bool,
    },
    /// Sensor failed; store untouched
    SensorFailed(SensorError),
    /// Sample malformed; store untouched
    Rejected(ValidationError),
    /// Insert failed; the next tick retries independently
    PersistFailed(StorageError),
}

impl CycleOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, CycleOutcome::Stored { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Stored { .. } => "stored",
            CycleOutcome::SensorFailed(_) => "sensor_error",
            CycleOutcome::Rejected(_) => "rejected",
            CycleOutcome::PersistFailed(_) => "persist_error",
        }
    }
}

/// Counts of what `run` did before it stopped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: u64,
    pub stored: u64,
}

/// The single writer of the readings table
pub struct IngestionLoop<S, P, R = RetentionPolicy> {
    sensor: S,
    store: Store,
    validator: Validator,
    retention: R,
    publisher: P,
    state: CycleState,
}

impl<S: Sensor, P: SnapshotPublisher, R: Retention> IngestionLoop<S, P, R> {
    /// Timestamps come from the store's clock
    pub fn new(sensor: S, store: Store, retention: R, publisher: P) -> Self {
        Self {
            sensor,
            store,
            validator: Validator::new(),
            retention,
            publisher,
            state: CycleState::Idle,
        }
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Run one full cycle to completion
    pub async fn tick(&mut self) -> CycleOutcome {
        let outcome = self.run_cycle().await;
        self.state = CycleState::Idle;

        metrics::counter!("ingest_cycles_total", "outcome" => outcome.label()).increment(1);
        if let CycleOutcome::Stored {
            reading, retired, ..
        } = &outcome
        {
            metrics::gauge!("last_temperature_celsius").set(reading.temperature);
            metrics::gauge!("last_moisture").set(reading.moisture as f64);
            metrics::counter!("readings_retired_total").increment(retired.unwrap_or(0));
        }

        outcome
    }

    async fn run_cycle(&mut self) -> CycleOutcome {
        self.state = CycleState::Reading;
        let raw = match self.sensor.read().await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(sensor = self.sensor.name(), error = %e, "Sensor read failed, skipping cycle");
                return CycleOutcome::SensorFailed(e);
            }
        };

        self.state = CycleState::Validating;
        let sample = match self.validator.validate(&raw) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(?raw, error = %e, "Rejected sensor sample");
                return CycleOutcome::Rejected(e);
            }
        };

        self.state = CycleState::Persisting;
        let now = truncate_to_millis(self.store.now());
        let id = match self
            .store
            .insert(sample.temperature, sample.moisture, Some(now))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(
                    temperature = sample.temperature,
                    moisture = sample.moisture,
                    error = %e,
                    "Failed to persist reading"
                );
                return CycleOutcome::PersistFailed(e);
            }
        };
        let reading = Reading {
            id,
            timestamp: now,
            temperature: sample.temperature,
            moisture: sample.moisture,
        };

        self.state = CycleState::Publishing;
        let retired = match self.retention.apply(&self.store, now).await {
            Ok(removed) => Some(removed),
            Err(e) => {
                warn!(%now, error = %e, "Retention delete failed");
                None
            }
        };

        let published = match self.publisher.publish(&reading).await {
            Ok(()) => true,
            Err(e) => {
                warn!(id = %reading.id, error = %e, "Snapshot publish failed");
                false
            }
        };

        info!(
            id = %reading.id,
            temperature = format_args!("{:.1}", reading.temperature),
            moisture = reading.moisture,
            "Stored sensor reading"
        );
        CycleOutcome::Stored {
            reading,
            retired,
            published,
        }
    }

    /// Tick until the trigger is exhausted or `shutdown` flips to true.
    ///
    /// Shutdown is observed only between cycles; a started cycle always finishes.
    pub async fn run<T: Trigger>(
        &mut self,
        mut trigger: T,
        mut shutdown: watch::Receiver<bool>,
    ) -> LoopSummary {
        info!(sensor = self.sensor.name(), "Starting ingestion loop");
        let mut summary = LoopSummary::default();

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                more = trigger.next_tick() => {
                    if !more {
                        debug!("Trigger exhausted");
                        break;
                    }
                    let outcome = self.tick().await;
                    summary.cycles += 1;
                    if outcome.is_stored() {
                        summary.stored += 1;
                    }
                }
            }
        }

        info!(
            cycles = summary.cycles,
            stored = summary.stored,
            "Ingestion loop stopped"
        );
        summary
    }
}
