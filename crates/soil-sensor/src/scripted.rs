//! Replays a fixed script of results

use crate::{RawSample, Sensor, SensorError};
use std::collections::VecDeque;

/// Sensor that returns queued results in order, then `NotResponding`
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    script: VecDeque<Result<RawSample, SensorError>>,
    reads: usize,
}

impl ScriptedSensor {
    pub fn new(script: impl IntoIterator<Item = Result<RawSample, SensorError>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            reads: 0,
        }
    }

    /// Number of reads performed so far
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Sensor for ScriptedSensor {
    async fn read(&mut self) -> Result<RawSample, SensorError> {
        self.reads += 1;
        self.script
            .pop_front()
            .unwrap_or(Err(SensorError::NotResponding))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
