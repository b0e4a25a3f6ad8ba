use std::time::Duration;

use anyhow::Context;
use jiff::Timestamp;
use tokio::{
    sync::watch,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{key::TickKey, producer::Producer, recorder::Recorder, DeviceSample, OsSnapshot};

type Clock = Box<dyn FnMut() -> Timestamp + Send>;

/// Samples both producers every `interval` and records them as one tick.
pub struct Scheduler<H, D> {
    recorder: Recorder,
    host: H,
    device: D,
    interval: Duration,
    clock: Clock,
}
impl<H, D> Scheduler<H, D>
where
    H: Producer<Output = OsSnapshot>,
    D: Producer<Output = DeviceSample>,
{
    pub fn new(recorder: Recorder, host: H, device: D, interval: Duration) -> Self {
        Self {
            recorder,
            host,
            device,
            interval,
            clock: Box::new(Timestamp::now),
        }
    }
    pub fn with_clock(mut self, clock: impl FnMut() -> Timestamp + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn tick(&mut self) -> anyhow::Result<TickKey> {
        let os = self.host.sample().context("sampling host")?;
        let device = self.device.sample().context("sampling device")?;
        let at = (self.clock)();
        let key = self
            .recorder
            .record_tick_at(at, &os, &device)
            .context("recording tick")?;
        Ok(key)
    }

    /// Runs until `shutdown` turns true or its sender is dropped.
    /// Returns the number of ticks recorded.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(
            interval = %humantime::format_duration(self.interval),
            "sampling started"
        );
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        let mut recorded = 0;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick() {
                        Ok(key) => {
                            recorded += 1;
                            debug!(%key, "tick");
                        }
                        Err(err) => warn!("tick dropped: {err:#}"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(recorded, "sampling stopped");
        recorded
    }
}
