use tracing::{debug, warn};

use crate::{
    codec::{decode_device, decode_os},
    query::QueryError,
    selection::{Field, FieldValue, Selection},
    store::{Log, LogEntry, Store},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldAverage {
    pub field: Field,
    pub count: u64,
    /// `None` when the owning log holds no decodable entries.
    pub mean: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Averages(Vec<FieldAverage>);
impl Averages {
    pub fn get(&self, field: Field) -> Option<&FieldAverage> {
        self.0.iter().find(|average| average.field == field)
    }
    pub fn as_slice(&self) -> &[FieldAverage] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Running {
    sum: f64,
    count: u64,
}
impl Running {
    fn push(&mut self, value: FieldValue) {
        self.sum += value.as_f64();
        self.count += 1;
    }
    fn mean(&self) -> Option<f64> {
        (self.count != 0).then(|| self.sum / self.count as f64)
    }
}

fn extract(log: Log, entry: &LogEntry, fields: &[Field]) -> Option<Vec<FieldValue>> {
    let values: Result<Vec<FieldValue>, _> = match log {
        Log::Os => decode_os(&entry.value)
            .map(|os| fields.iter().filter_map(|f| f.os_value(&os)).collect()),
        Log::Samples => decode_device(&entry.value)
            .map(|device| fields.iter().filter_map(|f| f.device_value(&device)).collect()),
    };
    match values {
        Ok(values) => Some(values),
        Err(err) => {
            warn!(key = %entry.key, %log, %err, "skipping undecodable entry");
            None
        }
    }
}

/// Mean of every selected field over the full history of its owning log,
/// one scan per log.
pub fn average(store: &Store, selection: &Selection) -> Result<Averages, QueryError> {
    let view = store.log_view()?;
    let mut totals: Vec<(Field, Running)> = selection
        .fields()
        .iter()
        .map(|field| (*field, Running::default()))
        .collect();
    for log in [Log::Os, Log::Samples] {
        if !selection.uses(log) {
            continue;
        }
        let fields: Vec<Field> = selection
            .fields()
            .iter()
            .copied()
            .filter(|field| field.log() == log)
            .collect();
        let mut scanned = 0;
        for entry in view.scan_all(log) {
            let entry = entry?;
            scanned += 1;
            let Some(values) = extract(log, &entry, &fields) else {
                continue;
            };
            for (field, value) in fields.iter().zip(values) {
                if let Some((_, running)) = totals.iter_mut().find(|(f, _)| f == field) {
                    running.push(value);
                }
            }
        }
        debug!(%log, scanned, "averaged");
    }
    let averages = totals
        .into_iter()
        .map(|(field, running)| FieldAverage {
            field,
            count: running.count,
            mean: running.mean(),
        })
        .collect();
    Ok(Averages(averages))
}
