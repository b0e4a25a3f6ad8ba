use rand::{rngs::StdRng, Rng, SeedableRng};
use sysinfo::System;

use crate::{DeviceSample, OsSnapshot};

const MIB: u64 = 1024 * 1024;
/// Simulated channels read in `0..CHANNEL_LIMIT`.
pub const CHANNEL_LIMIT: i32 = 10;

/// A metric source sampled once per tick.
pub trait Producer {
    type Output;
    fn sample(&mut self) -> anyhow::Result<Self::Output>;
}

#[derive(Debug)]
pub struct HostProbe {
    system: System,
}
impl HostProbe {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta; the first refresh only sets the baseline.
        system.refresh_cpu_usage();
        Self { system }
    }
}
impl Default for HostProbe {
    fn default() -> Self {
        Self::new()
    }
}
impl Producer for HostProbe {
    type Output = OsSnapshot;

    fn sample(&mut self) -> anyhow::Result<OsSnapshot> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        let total = self.system.total_memory();
        if total == 0 {
            anyhow::bail!("host reported no memory");
        }
        Ok(OsSnapshot {
            cpu_percent: f64::from(self.system.global_cpu_usage()),
            total_ram_mb: total / MIB,
            used_ram_mb: self.system.used_memory() / MIB,
        })
    }
}

/// Stand-in for the external device: four uniform readings per tick.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    rng: StdRng,
}
impl SimulatedDevice {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}
impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}
impl Producer for SimulatedDevice {
    type Output = DeviceSample;

    fn sample(&mut self) -> anyhow::Result<DeviceSample> {
        let channels = core::array::from_fn(|_| self.rng.random_range(0..CHANNEL_LIMIT));
        Ok(DeviceSample::new(channels))
    }
}
