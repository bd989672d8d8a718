//! Bounded reads

use crate::{RawSample, Sensor, SensorError};
use std::time::Duration;
use tracing::warn;

/// Default read timeout
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Wraps a sensor so a hung read surfaces as `SensorError::Timeout`
#[derive(Debug, Clone)]
pub struct TimedSensor<S> {
    inner: S,
    timeout: Duration,
}

impl<S: Sensor> TimedSensor<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn with_default_timeout(inner: S) -> Self {
        Self::new(inner, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

impl<S: Sensor> Sensor for TimedSensor<S> {
    async fn read(&mut self) -> Result<RawSample, SensorError> {
        match tokio::time::timeout(self.timeout, self.inner.read()).await {
            Ok(result) => result,
            Err(_) => {
                let ms = self.timeout.as_millis() as u64;
                warn!(sensor = self.inner.name(), timeout_ms = ms, "Sensor read timed out");
                Err(SensorError::Timeout(ms))
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScriptedSensor;

    struct HungSensor;

    impl Sensor for HungSensor {
        async fn read(&mut self) -> Result<RawSample, SensorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(RawSample::new(0.0, 0))
        }

        fn name(&self) -> &str {
            "hung"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_read_times_out() {
        let mut sensor = TimedSensor::new(HungSensor, Duration::from_millis(250));
        assert_eq!(sensor.read().await, Err(SensorError::Timeout(250)));
    }

    #[tokio::test]
    async fn test_fast_read_passes_through() {
        let inner = ScriptedSensor::new([Ok(RawSample::new(19.5, 420))]);
        let mut sensor = TimedSensor::with_default_timeout(inner);
        assert_eq!(sensor.read().await, Ok(RawSample::new(19.5, 420)));
        assert_eq!(sensor.name(), "scripted");
    }
}
