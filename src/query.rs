use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    codec::{decode_device, decode_os},
    key::TickKey,
    selection::{Field, FieldValue, Selection},
    store::{Log, LogEntry, Store, StoreError},
};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("logs diverge at rank {rank}: OS has {os}, SAMPLES has {samples}")]
    Diverged {
        rank: usize,
        os: TickKey,
        samples: TickKey,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRecord {
    /// 1 is the newest tick.
    pub rank: usize,
    pub key: TickKey,
    pub values: Vec<(Field, FieldValue)>,
}
impl ProjectedRecord {
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, value)| *value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LastN {
    pub requested: usize,
    pub records: Vec<ProjectedRecord>,
    /// The logs ran out before `requested` records were found.
    pub truncated: bool,
}

fn project(
    selection: &Selection,
    rank: usize,
    os: &LogEntry,
    samples: &LogEntry,
) -> Option<ProjectedRecord> {
    let snapshot = match decode_os(&os.value) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            warn!(key = %os.key, log = %Log::Os, %err, "skipping undecodable entry");
            return None;
        }
    };
    let sample = match decode_device(&samples.value) {
        Ok(sample) => sample,
        Err(err) => {
            warn!(key = %samples.key, log = %Log::Samples, %err, "skipping undecodable entry");
            return None;
        }
    };
    let values = selection
        .fields()
        .iter()
        .filter_map(|field| Some((*field, field.extract(&snapshot, &sample)?)))
        .collect();
    Some(ProjectedRecord {
        rank,
        key: os.key.clone(),
        values,
    })
}

/// Walks both logs backwards in lockstep and projects the newest
/// `selection.count()` ticks.
pub fn last_n(store: &Store, selection: &Selection) -> Result<LastN, QueryError> {
    let requested = selection.count();
    let mut records = vec![];
    if requested == 0 {
        return Ok(LastN {
            requested,
            records,
            truncated: false,
        });
    }
    let view = store.read_view()?;
    let mut os = view.cursor_last(Log::Os)?;
    let mut samples = view.cursor_last(Log::Samples)?;
    let mut truncated = false;
    while records.len() < requested {
        let (Some(os_entry), Some(samples_entry)) = (os.entry(), samples.entry()) else {
            truncated = true;
            break;
        };
        let rank = records.len() + 1;
        if os_entry.key != samples_entry.key {
            return Err(QueryError::Diverged {
                rank,
                os: os_entry.key.clone(),
                samples: samples_entry.key.clone(),
            });
        }
        if let Some(record) = project(selection, rank, os_entry, samples_entry) {
            records.push(record);
        }
        os.prev()?;
        samples.prev()?;
    }
    debug!(requested, returned = records.len(), truncated, "last n");
    Ok(LastN {
        requested,
        records,
        truncated,
    })
}
