//! Tick sources for the ingestion loop

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Yields ticks; `false` means the trigger is exhausted and the loop should stop
pub trait Trigger: Send {
    fn next_tick(&mut self) -> impl Future<Output = bool> + Send;
}

/// Fixed-period ticks; ticks missed while a cycle overran are dropped
#[derive(Debug)]
pub struct IntervalTrigger {
    interval: Interval,
}

impl IntervalTrigger {
    /// First tick fires immediately
    pub fn new(period: Duration) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

impl Trigger for IntervalTrigger {
    async fn next_tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Externally fired ticks; ticks queued during a cycle coalesce into one
#[derive(Debug)]
pub struct ChannelTrigger {
    rx: mpsc::Receiver<()>,
}

impl ChannelTrigger {
    /// Returns the firing handle and the trigger. Dropping every sender ends the trigger.
    pub fn channel(buffer: usize) -> (mpsc::Sender<()>, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (tx, Self { rx })
    }
}

impl Trigger for ChannelTrigger {
    async fn next_tick(&mut self) -> bool {
        if self.rx.recv().await.is_none() {
            return false;
        }
        while self.rx.try_recv().is_ok() {}
        true
    }
}
