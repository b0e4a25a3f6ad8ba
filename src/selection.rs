use std::str::FromStr;

use thiserror::Error;

use crate::{store::Log, DeviceSample, OsSnapshot};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("unknown field {0:?}")]
    UnknownField(String),
    #[error("invalid count {0:?}")]
    InvalidCount(String),
    #[error("no fields selected")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Cpu,
    UsedRam,
    S1,
    S2,
    S3,
    S4,
}
impl Field {
    pub const ALL: [Field; 6] = [
        Field::Cpu,
        Field::UsedRam,
        Field::S1,
        Field::S2,
        Field::S3,
        Field::S4,
    ];

    pub fn log(&self) -> Log {
        match self {
            Field::Cpu | Field::UsedRam => Log::Os,
            Field::S1 | Field::S2 | Field::S3 | Field::S4 => Log::Samples,
        }
    }

    /// Short code used on the console: `c`, `r`, `1`..`4`.
    pub fn code(&self) -> &'static str {
        match self {
            Field::Cpu => "c",
            Field::UsedRam => "r",
            Field::S1 => "1",
            Field::S2 => "2",
            Field::S3 => "3",
            Field::S4 => "4",
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Field::Cpu => "cpu",
            Field::UsedRam => "usedRam",
            Field::S1 => "s1",
            Field::S2 => "s2",
            Field::S3 => "s3",
            Field::S4 => "s4",
        }
    }
    pub fn label(&self) -> &'static str {
        match self {
            Field::Cpu => "CPU (%)",
            Field::UsedRam => "RAM (Mb)",
            Field::S1 => "Sample 1",
            Field::S2 => "Sample 2",
            Field::S3 => "Sample 3",
            Field::S4 => "Sample 4",
        }
    }

    pub fn os_value(&self, os: &OsSnapshot) -> Option<FieldValue> {
        match self {
            Field::Cpu => Some(FieldValue::Percent(os.cpu_percent)),
            Field::UsedRam => Some(FieldValue::Megabytes(os.used_ram_mb)),
            _ => None,
        }
    }
    pub fn device_value(&self, device: &DeviceSample) -> Option<FieldValue> {
        match self {
            Field::S1 => Some(FieldValue::Channel(device.s1)),
            Field::S2 => Some(FieldValue::Channel(device.s2)),
            Field::S3 => Some(FieldValue::Channel(device.s3)),
            Field::S4 => Some(FieldValue::Channel(device.s4)),
            _ => None,
        }
    }
    /// Reads the field from whichever record owns it.
    pub fn extract(&self, os: &OsSnapshot, device: &DeviceSample) -> Option<FieldValue> {
        match self.log() {
            Log::Os => self.os_value(os),
            Log::Samples => self.device_value(device),
        }
    }
}
impl FromStr for Field {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Field::ALL
            .into_iter()
            .find(|field| field.code() == s || field.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SelectionError::UnknownField(s.to_owned()))
    }
}
impl core::fmt::Display for Field {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Percent(f64),
    Megabytes(u64),
    Channel(i32),
}
impl FieldValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Percent(v) => v,
            FieldValue::Megabytes(v) => v as f64,
            FieldValue::Channel(v) => f64::from(v),
        }
    }
}
impl core::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            FieldValue::Percent(v) => write!(f, "{v:.2}"),
            FieldValue::Megabytes(v) => write!(f, "{v}"),
            FieldValue::Channel(v) => write!(f, "{v}"),
        }
    }
}

/// Which fields to project, in request order, and how many ticks to return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    fields: Vec<Field>,
    count: usize,
}
impl Selection {
    pub fn new(
        fields: impl IntoIterator<Item = Field>,
        count: usize,
    ) -> Result<Self, SelectionError> {
        let mut selected = vec![];
        for field in fields {
            if !selected.contains(&field) {
                selected.push(field);
            }
        }
        if selected.is_empty() {
            return Err(SelectionError::Empty);
        }
        Ok(Self {
            fields: selected,
            count,
        })
    }
    pub fn all(count: usize) -> Self {
        Self {
            fields: Field::ALL.to_vec(),
            count,
        }
    }

    /// Parses `"<count>,<field>,<field>,..."`, e.g. `"5,c,1,s4"`.
    pub fn parse(text: &str) -> Result<Self, SelectionError> {
        let mut parts = text.split(',');
        let count = parts.next().unwrap_or_default();
        let count = parse_count(count)?;
        let fields = parts
            .filter(|part| !part.trim().is_empty())
            .map(Field::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields, count)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
    pub fn count(&self) -> usize {
        self.count
    }
    pub fn uses(&self, log: Log) -> bool {
        self.fields.iter().any(|field| field.log() == log)
    }
}

pub fn parse_count(text: &str) -> Result<usize, SelectionError> {
    let text = text.trim();
    text.parse()
        .map_err(|_| SelectionError::InvalidCount(text.to_owned()))
}
