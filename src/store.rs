use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use sled::{
    transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError},
    IVec, Transactional, Tree,
};
use thiserror::Error;
use tracing::debug;

use crate::{
    codec::{decode_config, encode_config, CodecError},
    key::TickKey,
    Config,
};

const ROOT_TREE: &str = "DB";
const CONFIG_KEY: &[u8] = b"CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Log {
    Os,
    Samples,
}
impl Log {
    pub fn name(&self) -> &'static str {
        match self {
            Log::Os => "OS",
            Log::Samples => "SAMPLES",
        }
    }
    fn tree_name(&self) -> String {
        format!("{ROOT_TREE}/{}", self.name())
    }
}
impl core::fmt::Display for Log {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store at {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: sled::Error,
    },
    #[error("storage failure: {0}")]
    Sled(#[from] sled::Error),
    #[error("key {key} already exists in log {log}")]
    DuplicateKey { log: Log, key: TickKey },
    #[error("key {key} is older than the newest key {last} in log {log}")]
    OutOfOrder { log: Log, key: TickKey, last: String },
    #[error("malformed key {key:?} in log {log}")]
    InvalidKey { log: Log, key: String },
    #[error("config record: {0}")]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub key: TickKey,
    pub value: IVec,
}
impl LogEntry {
    fn new(log: Log, key: IVec, value: IVec) -> Result<Self, StoreError> {
        let Some(key) = TickKey::parse(&key) else {
            return Err(StoreError::InvalidKey {
                log,
                key: String::from_utf8_lossy(&key).into_owned(),
            });
        };
        Ok(Self { key, value })
    }
}

/// Handle to the on-disk database. Clones share the same underlying store
/// and the same write lock.
#[derive(Debug, Clone)]
pub struct Store {
    db: sled::Db,
    root: Tree,
    os: Tree,
    samples: Tree,
    writer: Arc<Mutex<()>>,
}
impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let open_err = |source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        };
        let db = sled::Config::new().path(path).open().map_err(open_err)?;
        let root = db.open_tree(ROOT_TREE).map_err(open_err)?;
        let os = db.open_tree(Log::Os.tree_name()).map_err(open_err)?;
        let samples = db.open_tree(Log::Samples.tree_name()).map_err(open_err)?;
        debug!(path = %path.display(), "store opened");
        Ok(Self {
            db,
            root,
            os,
            samples,
            writer: Arc::new(Mutex::new(())),
        })
    }

    /// Held from the ordering check until the write lands, so concurrent
    /// appends cannot slip a key below one that is already visible.
    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn tree(&self, log: Log) -> &Tree {
        match log {
            Log::Os => &self.os,
            Log::Samples => &self.samples,
        }
    }

    /// Overwrites the config slot and waits for it to reach disk.
    pub fn put_config(&self, config: &Config) -> Result<(), StoreError> {
        let value = encode_config(config)?;
        self.root.insert(CONFIG_KEY, value)?;
        self.db.flush()?;
        Ok(())
    }
    pub fn config(&self) -> Result<Option<Config>, StoreError> {
        let Some(value) = self.root.get(CONFIG_KEY)? else {
            return Ok(None);
        };
        Ok(Some(decode_config(&value)?))
    }

    /// Keys must be strictly increasing within a log.
    fn check_next(&self, log: Log, key: &TickKey) -> Result<(), StoreError> {
        let tree = self.tree(log);
        if tree.contains_key(key.as_bytes())? {
            return Err(StoreError::DuplicateKey {
                log,
                key: key.clone(),
            });
        }
        if let Some((last, _)) = tree.last()? {
            if key.as_bytes() < &last[..] {
                return Err(StoreError::OutOfOrder {
                    log,
                    key: key.clone(),
                    last: String::from_utf8_lossy(&last).into_owned(),
                });
            }
        }
        Ok(())
    }

    pub fn append(&self, log: Log, key: &TickKey, value: &[u8]) -> Result<(), StoreError> {
        let _writer = self.lock_writer();
        self.check_next(log, key)?;
        self.tree(log)
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(value))?
            .map_err(|_| StoreError::DuplicateKey {
                log,
                key: key.clone(),
            })
    }

    /// Writes one entry to each log under the same key, atomically.
    pub fn append_tick(
        &self,
        key: &TickKey,
        os_value: &[u8],
        samples_value: &[u8],
    ) -> Result<(), StoreError> {
        let _writer = self.lock_writer();
        self.check_next(Log::Os, key)?;
        self.check_next(Log::Samples, key)?;
        (&self.os, &self.samples)
            .transaction(|(os, samples)| -> ConflictableTransactionResult<(), Log> {
                if os.get(key.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(Log::Os));
                }
                if samples.get(key.as_bytes())?.is_some() {
                    return Err(ConflictableTransactionError::Abort(Log::Samples));
                }
                os.insert(key.as_bytes(), os_value)?;
                samples.insert(key.as_bytes(), samples_value)?;
                Ok(())
            })
            .map_err(|err| match err {
                TransactionError::Abort(log) => StoreError::DuplicateKey {
                    log,
                    key: key.clone(),
                },
                TransactionError::Storage(err) => StoreError::Sled(err),
            })
    }

    pub fn len(&self, log: Log) -> usize {
        self.tree(log).len()
    }
    pub fn is_empty(&self, log: Log) -> bool {
        self.tree(log).is_empty()
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Pins the newest tick present in both logs. Anything written after
    /// this call, including the second half of an in-flight tick, stays
    /// invisible to cursors and scans opened from the view.
    pub fn read_view(&self) -> Result<ReadView, StoreError> {
        let os_last = self.os.last()?.map(|(key, _)| key);
        let samples_last = self.samples.last()?.map(|(key, _)| key);
        let horizon = match (os_last, samples_last) {
            (Some(os), Some(samples)) => Some(os.min(samples)),
            _ => None,
        };
        Ok(ReadView {
            os: self.os.clone(),
            samples: self.samples.clone(),
            os_horizon: horizon.clone(),
            samples_horizon: horizon,
        })
    }

    /// Pins each log at its own newest key, without pairing the two.
    pub fn log_view(&self) -> Result<ReadView, StoreError> {
        Ok(ReadView {
            os: self.os.clone(),
            samples: self.samples.clone(),
            os_horizon: self.os.last()?.map(|(key, _)| key),
            samples_horizon: self.samples.last()?.map(|(key, _)| key),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReadView {
    os: Tree,
    samples: Tree,
    os_horizon: Option<IVec>,
    samples_horizon: Option<IVec>,
}
impl ReadView {
    fn range(&self, log: Log) -> Option<sled::Iter> {
        let (tree, horizon) = match log {
            Log::Os => (&self.os, &self.os_horizon),
            Log::Samples => (&self.samples, &self.samples_horizon),
        };
        let horizon: &[u8] = horizon.as_ref()?;
        Some(tree.range::<&[u8], _>(..=horizon))
    }

    /// Newest key of `log` visible through this view.
    pub fn horizon(&self, log: Log) -> Option<TickKey> {
        let horizon = match log {
            Log::Os => &self.os_horizon,
            Log::Samples => &self.samples_horizon,
        };
        horizon.as_ref().and_then(TickKey::parse)
    }

    /// Cursor positioned at the newest visible entry of `log`.
    pub fn cursor_last(&self, log: Log) -> Result<LogCursor, StoreError> {
        let mut cursor = LogCursor {
            log,
            iter: self.range(log),
            current: None,
        };
        cursor.step()?;
        Ok(cursor)
    }

    /// Forward, oldest first. Each call starts a fresh scan.
    pub fn scan_all(&self, log: Log) -> impl Iterator<Item = Result<LogEntry, StoreError>> {
        self.range(log).into_iter().flatten().map(move |item| {
            let (key, value) = item?;
            LogEntry::new(log, key, value)
        })
    }
}

pub struct LogCursor {
    log: Log,
    iter: Option<sled::Iter>,
    current: Option<LogEntry>,
}
impl LogCursor {
    fn step(&mut self) -> Result<(), StoreError> {
        let next = self.iter.as_mut().and_then(|iter| iter.next_back());
        self.current = match next {
            Some(item) => {
                let (key, value) = item?;
                Some(LogEntry::new(self.log, key, value)?)
            }
            None => {
                self.iter = None;
                None
            }
        };
        Ok(())
    }

    pub fn entry(&self) -> Option<&LogEntry> {
        self.current.as_ref()
    }

    /// Moves one entry back in time. `None` once the start of the log is passed.
    pub fn prev(&mut self) -> Result<Option<&LogEntry>, StoreError> {
        self.step()?;
        Ok(self.current.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::open_temp;

    fn key(text: &str) -> TickKey {
        TickKey::parse(text).unwrap()
    }

    #[test]
    fn open_is_idempotent_across_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        {
            let store = Store::open(&path).unwrap();
            store
                .append_tick(&key("20/06/15 10:00:00"), b"os", b"samples")
                .unwrap();
            store.flush().unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.len(Log::Os), 1);
        assert_eq!(store.len(Log::Samples), 1);
    }

    #[test]
    fn open_fails_below_a_regular_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = Store::open(file.path().join("db")).unwrap_err();
        assert!(matches!(err, StoreError::Open { .. }), "{err}");
    }

    #[test]
    fn config_slot_is_overwritten() {
        let (_dir, store) = open_temp();
        assert_eq!(store.config().unwrap(), None);
        for time in ["20/06/15 10:00:00", "20/06/16 11:00:00"] {
            store
                .put_config(&Config {
                    last_access_time: time.into(),
                })
                .unwrap();
        }
        let config = store.config().unwrap().unwrap();
        assert_eq!(config.last_access_time, "20/06/16 11:00:00");
    }

    #[test]
    fn append_rejects_duplicate_key() {
        let (_dir, store) = open_temp();
        let k = key("20/06/15 10:00:00");
        store.append(Log::Os, &k, b"first").unwrap();
        let err = store.append(Log::Os, &k, b"second").unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { log: Log::Os, .. }));
        let view = store.read_view().unwrap();
        assert!(view.horizon(Log::Os).is_none());
        assert_eq!(store.len(Log::Os), 1);
    }

    #[test]
    fn append_rejects_key_older_than_newest() {
        let (_dir, store) = open_temp();
        store
            .append(Log::Samples, &key("20/06/15 10:00:05"), b"a")
            .unwrap();
        let err = store
            .append(Log::Samples, &key("20/06/15 10:00:01"), b"b")
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfOrder { .. }), "{err}");
    }

    #[test]
    fn append_tick_writes_neither_log_on_collision() {
        let (_dir, store) = open_temp();
        let k = key("20/06/15 10:00:00");
        store.append(Log::Samples, &k, b"taken").unwrap();
        let err = store.append_tick(&k, b"os", b"samples").unwrap_err();
        assert!(matches!(
            err,
            StoreError::DuplicateKey {
                log: Log::Samples,
                ..
            }
        ));
        assert!(store.is_empty(Log::Os));
    }

    #[test]
    fn cursor_walks_newest_to_oldest() {
        let (_dir, store) = open_temp();
        let keys = ["20/06/15 10:00:00", "20/06/15 10:00:01", "20/06/15 10:00:02"];
        for (i, k) in keys.iter().enumerate() {
            store.append_tick(&key(k), &[i as u8], &[i as u8]).unwrap();
        }
        let view = store.read_view().unwrap();
        let mut cursor = view.cursor_last(Log::Os).unwrap();
        let mut seen = vec![];
        let mut entry = cursor.entry().cloned();
        while let Some(e) = entry {
            seen.push(e.key.to_string());
            entry = cursor.prev().unwrap().cloned();
        }
        assert_eq!(seen, ["20/06/15 10:00:02", "20/06/15 10:00:01", "20/06/15 10:00:00"]);
        assert!(cursor.prev().unwrap().is_none());
    }

    #[test]
    fn cursor_on_empty_log_has_no_entry() {
        let (_dir, store) = open_temp();
        let view = store.read_view().unwrap();
        let mut cursor = view.cursor_last(Log::Samples).unwrap();
        assert!(cursor.entry().is_none());
        assert!(cursor.prev().unwrap().is_none());
    }

    #[test]
    fn view_hides_half_written_tick() {
        let (_dir, store) = open_temp();
        store
            .append_tick(&key("20/06/15 10:00:00"), b"os0", b"s0")
            .unwrap();
        store
            .append(Log::Os, &key("20/06/15 10:00:01"), b"os1")
            .unwrap();
        let view = store.read_view().unwrap();
        assert_eq!(view.horizon(Log::Os), Some(key("20/06/15 10:00:00")));
        assert_eq!(view.horizon(Log::Samples), Some(key("20/06/15 10:00:00")));
        let cursor = view.cursor_last(Log::Os).unwrap();
        assert_eq!(cursor.entry().unwrap().value, IVec::from(&b"os0"[..]));
        assert_eq!(view.scan_all(Log::Os).count(), 1);
    }

    #[test]
    fn view_is_not_affected_by_later_writes() {
        let (_dir, store) = open_temp();
        store
            .append_tick(&key("20/06/15 10:00:00"), b"os0", b"s0")
            .unwrap();
        let view = store.read_view().unwrap();
        store
            .append_tick(&key("20/06/15 10:00:01"), b"os1", b"s1")
            .unwrap();
        let keys: Vec<_> = view
            .scan_all(Log::Samples)
            .map(|entry| entry.unwrap().key.to_string())
            .collect();
        assert_eq!(keys, ["20/06/15 10:00:00"]);
    }

    #[test]
    fn log_view_bounds_each_log_by_its_own_newest_key() {
        let (_dir, store) = open_temp();
        for k in ["20/06/15 10:00:00", "20/06/15 10:00:01", "20/06/15 10:00:02"] {
            store.append(Log::Os, &key(k), b"os").unwrap();
        }
        let view = store.log_view().unwrap();
        assert_eq!(view.horizon(Log::Os), Some(key("20/06/15 10:00:02")));
        assert_eq!(view.horizon(Log::Samples), None);
        store
            .append(Log::Os, &key("20/06/15 10:00:03"), b"late")
            .unwrap();
        assert_eq!(view.scan_all(Log::Os).count(), 3);
        assert_eq!(view.scan_all(Log::Samples).count(), 0);
        assert!(store.read_view().unwrap().horizon(Log::Os).is_none());
    }

    #[test]
    fn concurrent_appends_never_land_below_a_pinned_view() {
        const WRITERS: usize = 4;
        const ROUNDS: usize = 50;
        let (_dir, store) = open_temp();
        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for round in 0..ROUNDS {
                        let offset = (round * WRITERS + w) as i64;
                        let key = TickKey::from_timestamp(crate::fixtures::at(offset));
                        let _ = store.append(Log::Os, &key, b"os");
                    }
                })
            })
            .collect();

        let mut pinned = vec![];
        while writers.iter().any(|writer| !writer.is_finished()) {
            let view = store.log_view().unwrap();
            let seen = view.scan_all(Log::Os).count();
            pinned.push((view, seen));
        }
        for writer in writers {
            writer.join().unwrap();
        }
        for (view, seen) in pinned {
            assert_eq!(view.scan_all(Log::Os).count(), seen);
        }
        let keys: Vec<_> = store
            .log_view()
            .unwrap()
            .scan_all(Log::Os)
            .map(|entry| entry.unwrap().key)
            .collect();
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn scan_all_is_chronological_and_restartable() {
        let (_dir, store) = open_temp();
        for k in ["20/06/15 10:00:00", "20/06/15 10:00:01"] {
            store.append_tick(&key(k), b"os", b"s").unwrap();
        }
        let view = store.read_view().unwrap();
        let first: Vec<_> = view.scan_all(Log::Os).map(|e| e.unwrap().key).collect();
        let second: Vec<_> = view.scan_all(Log::Os).map(|e| e.unwrap().key).collect();
        assert_eq!(first, second);
        assert!(first[0] < first[1]);
    }
}
