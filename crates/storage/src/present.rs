//! Presentation boundary: unit conversion and rounding

use crate::Reading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// °C to °F
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Round to a fixed number of decimal places.
///
/// Rounds the exact binary value, ties to even, so 21.25 gives 21.2 and
/// 1.15 (stored as 1.1499...) gives 1.1.
pub fn round_dp(value: f64, places: usize) -> f64 {
    format!("{value:.places$}").parse().unwrap_or(value)
}

/// A reading as shown to consumers: °C and °F at one decimal place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentedReading {
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub moisture: i64,
    pub temperature_f: f64,
}

impl From<&Reading> for PresentedReading {
    fn from(reading: &Reading) -> Self {
        Self {
            timestamp: reading.timestamp,
            temperature: round_dp(reading.temperature, 1),
            moisture: reading.moisture,
            temperature_f: round_dp(celsius_to_fahrenheit(reading.temperature), 1),
        }
    }
}
