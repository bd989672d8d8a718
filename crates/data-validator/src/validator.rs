//! Sample Validator

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A sample as read from the sensor, any field possibly absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Degrees Celsius
    pub temperature: Option<f64>,
    /// Raw moisture count
    pub moisture: Option<i64>,
}

impl RawSample {
    pub fn new(temperature: f64, moisture: i64) -> Self {
        Self {
            temperature: Some(temperature),
            moisture: Some(moisture),
        }
    }
}

/// A complete, numeric sample ready to persist
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub temperature: f64,
    pub moisture: i64,
}

/// Validator for raw soil samples
#[derive(Debug, Clone, Default)]
pub struct Validator;

impl Validator {
    pub fn new() -> Self {
        Self
    }

    /// Accept any present, finite values; reject the rest
    pub fn validate(&self, raw: &RawSample) -> Result<Sample, ValidationError> {
        let temperature = raw
            .temperature
            .ok_or(ValidationError::MissingField("temperature"))?;
        let moisture = raw.moisture.ok_or(ValidationError::MissingField("moisture"))?;

        if !temperature.is_finite() {
            return Err(ValidationError::NotFinite {
                field: "temperature",
                value: temperature,
            });
        }

        debug!(temperature, moisture, "Sample validated");
        Ok(Sample {
            temperature,
            moisture,
        })
    }
}
