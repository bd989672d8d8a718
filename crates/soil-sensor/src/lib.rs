//! Soil Sensor Port
//!
//! The ingestion pipeline talks to hardware only through [`Sensor`]. This
//! crate provides the port plus adapters that need no hardware: a drifting
//! simulation, a scripted replay for tests, and a timeout wrapper that keeps
//! every read bounded.

mod error;
mod scripted;
mod simulated;
mod timed;

pub use data_validator::RawSample;
pub use error::SensorError;
pub use scripted::ScriptedSensor;
pub use simulated::SimulatedSensor;
pub use timed::TimedSensor;

use std::future::Future;

/// Port for reading one (temperature, moisture) sample
pub trait Sensor: Send {
    /// Take a single reading
    fn read(&mut self) -> impl Future<Output = Result<RawSample, SensorError>> + Send;

    /// Short identifier for logs
    fn name(&self) -> &str;
}
