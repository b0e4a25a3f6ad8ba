pub mod aggregate;
pub mod codec;
pub mod console;
#[cfg(test)]
mod fixtures;
pub mod key;
pub mod logging;
pub mod producer;
pub mod query;
pub mod recorder;
pub mod scheduler;
pub mod selection;
pub mod settings;
pub mod store;
pub mod table;

pub const OS_SNAPSHOT_SIZE: usize = 8 + 8 + 8;
pub const DEVICE_SAMPLE_SIZE: usize = 4 * 4;

/// One reading of the host's CPU and memory counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OsSnapshot {
    pub cpu_percent: f64,
    pub total_ram_mb: u64,
    pub used_ram_mb: u64,
}

/// Four channel readings from the external device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSample {
    pub s1: i32,
    pub s2: i32,
    pub s3: i32,
    pub s4: i32,
}
impl DeviceSample {
    pub fn new([s1, s2, s3, s4]: [i32; 4]) -> Self {
        Self { s1, s2, s3, s4 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub last_access_time: String,
}
