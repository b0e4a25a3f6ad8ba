use jiff::Timestamp;

use crate::{recorder::Recorder, store::Store, DeviceSample, OsSnapshot};

/// 2020-06-15 10:00:00 UTC
const BASE_SECOND: i64 = 1_592_215_200;

pub fn at(offset: i64) -> Timestamp {
    Timestamp::from_second(BASE_SECOND + offset).unwrap()
}

pub fn open_temp() -> (tempfile::TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path().join("db")).unwrap();
    (dir, store)
}

pub fn os(cpu_percent: f64, used_ram_mb: u64) -> OsSnapshot {
    OsSnapshot {
        cpu_percent,
        total_ram_mb: 16_000,
        used_ram_mb,
    }
}

/// Three ticks, oldest first: cpu 10/20/30 and device tuples 1..=12.
pub fn three_ticks() -> (tempfile::TempDir, Store) {
    let (dir, store) = open_temp();
    let recorder = Recorder::new(store.clone());
    let ticks = [
        (os(10.0, 1000), DeviceSample::new([1, 2, 3, 4])),
        (os(20.0, 2000), DeviceSample::new([5, 6, 7, 8])),
        (os(30.0, 3000), DeviceSample::new([9, 10, 11, 12])),
    ];
    for (i, (snapshot, sample)) in ticks.iter().enumerate() {
        recorder
            .record_tick_at(at(i as i64), snapshot, sample)
            .unwrap();
    }
    (dir, store)
}
