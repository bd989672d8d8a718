//! Simulated probe for running without hardware

use crate::{RawSample, Sensor, SensorError};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Deterministic drifting soil readings
///
/// Temperature wanders around 18-26°C and moisture around 350-650,
/// moving a small step per read.
#[derive(Debug, Clone)]
pub struct SimulatedSensor {
    seed: u64,
    reads: u64,
    temperature: f64,
    moisture: i64,
}

impl SimulatedSensor {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            reads: 0,
            temperature: 22.0,
            moisture: 500,
        }
    }

    fn noise(&self, channel: u8) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        self.reads.hash(&mut hasher);
        channel.hash(&mut hasher);
        hasher.finish()
    }
}

impl Sensor for SimulatedSensor {
    async fn read(&mut self) -> Result<RawSample, SensorError> {
        self.reads += 1;

        // Step in [-0.25, 0.25] °C and [-10, 10] counts
        let temp_step = (self.noise(0) % 51) as f64 / 100.0 - 0.25;
        let moisture_step = (self.noise(1) % 21) as i64 - 10;

        self.temperature = (self.temperature + temp_step).clamp(18.0, 26.0);
        self.moisture = (self.moisture + moisture_step).clamp(350, 650);

        debug!(
            temperature = self.temperature,
            moisture = self.moisture,
            "Simulated sensor read"
        );
        Ok(RawSample::new(self.temperature, self.moisture))
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_stays_in_band() {
        let mut sensor = SimulatedSensor::new(42);
        for _ in 0..500 {
            let sample = sensor.read().await.unwrap();
            let temp = sample.temperature.unwrap();
            let moisture = sample.moisture.unwrap();
            assert!((18.0..=26.0).contains(&temp));
            assert!((350..=650).contains(&moisture));
        }
    }

    #[tokio::test]
    async fn test_simulated_is_deterministic() {
        let mut a = SimulatedSensor::new(7);
        let mut b = SimulatedSensor::new(7);
        for _ in 0..20 {
            assert_eq!(a.read().await.unwrap(), b.read().await.unwrap());
        }
    }
}
