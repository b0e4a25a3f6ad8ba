use jiff::Timestamp;
use tracing::trace;

use crate::{
    codec::{encode_device, encode_os},
    key::{TickKey, TICK_KEY_FORMAT},
    store::{Store, StoreError},
    Config, DeviceSample, OsSnapshot,
};

/// The write path: one key per tick, shared by both logs.
#[derive(Debug, Clone)]
pub struct Recorder {
    store: Store,
}
impl Recorder {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn record_tick(
        &self,
        os: &OsSnapshot,
        device: &DeviceSample,
    ) -> Result<TickKey, StoreError> {
        self.record_tick_at(Timestamp::now(), os, device)
    }
    pub fn record_tick_at(
        &self,
        at: Timestamp,
        os: &OsSnapshot,
        device: &DeviceSample,
    ) -> Result<TickKey, StoreError> {
        let key = TickKey::from_timestamp(at);
        self.store
            .append_tick(&key, &encode_os(os), &encode_device(device))?;
        trace!(%key, "tick recorded");
        Ok(key)
    }

    /// Records the session start in the config slot.
    pub fn stamp_config(&self, at: Timestamp) -> Result<Config, StoreError> {
        let config = Config {
            last_access_time: at.strftime(TICK_KEY_FORMAT).to_string(),
        };
        self.store.put_config(&config)?;
        Ok(config)
    }
}
