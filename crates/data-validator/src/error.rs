//! Validation Error Types

use thiserror::Error;

/// Reasons a raw sample is rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Sensor returned no value for a field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// NaN or infinite value
    #[error("{field} is not a finite number: {value}")]
    NotFinite { field: &'static str, value: f64 },
}
