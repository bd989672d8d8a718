//! Sensor Error Types

use thiserror::Error;

/// Errors that can occur while reading the sensor
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// I2C bus or transport failure
    #[error("Bus error: {0}")]
    Bus(String),

    /// Read did not complete in time
    #[error("Timeout waiting for sensor after {0}ms")]
    Timeout(u64),

    /// Device is absent or not acknowledging
    #[error("Sensor not responding")]
    NotResponding,
}
