use std::io::Read;

use thiserror::Error;

use crate::{Config, DeviceSample, OsSnapshot, DEVICE_SAMPLE_SIZE, OS_SNAPSHOT_SIZE};

const LEN_PREFIX_SIZE: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("buffer of {actual} bytes has no room for the length prefix")]
    MissingPrefix { actual: usize },
    #[error("declared payload length {declared} does not match record size {expected}")]
    LengthMismatch { declared: usize, expected: usize },
    #[error("payload truncated: declared {declared} bytes, found {actual}")]
    Truncated { declared: usize, actual: usize },
    #[error("{extra} trailing bytes after payload")]
    TrailingBytes { extra: usize },
    #[error("payload of {len} bytes does not fit the length prefix")]
    TooLong { len: usize },
    #[error("payload ended early")]
    UnexpectedEof,
    #[error("payload is not valid UTF-8")]
    Utf8,
}

fn encode_len(len: usize) -> Result<[u8; LEN_PREFIX_SIZE], CodecError> {
    let len = u16::try_from(len).map_err(|_| CodecError::TooLong { len })?;
    Ok(len.to_be_bytes())
}

/// Strips the length prefix and checks the payload against it.
fn unframe(buf: &[u8], expected: Option<usize>) -> Result<&[u8], CodecError> {
    let Some((prefix, payload)) = buf.split_first_chunk::<LEN_PREFIX_SIZE>() else {
        return Err(CodecError::MissingPrefix { actual: buf.len() });
    };
    let declared = usize::from(u16::from_be_bytes(*prefix));
    if let Some(expected) = expected {
        if declared != expected {
            return Err(CodecError::LengthMismatch { declared, expected });
        }
    }
    match payload.len().cmp(&declared) {
        core::cmp::Ordering::Less => Err(CodecError::Truncated {
            declared,
            actual: payload.len(),
        }),
        core::cmp::Ordering::Greater => Err(CodecError::TrailingBytes {
            extra: payload.len() - declared,
        }),
        core::cmp::Ordering::Equal => Ok(payload),
    }
}

fn read_be<const N: usize>(rdr: &mut impl Read) -> Result<[u8; N], CodecError> {
    let mut buf = [0; N];
    rdr.read_exact(&mut buf)
        .map_err(|_| CodecError::UnexpectedEof)?;
    Ok(buf)
}

pub fn encode_os(snapshot: &OsSnapshot) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LEN_PREFIX_SIZE + OS_SNAPSHOT_SIZE);
    buf.extend_from_slice(&(OS_SNAPSHOT_SIZE as u16).to_be_bytes());
    buf.extend_from_slice(&snapshot.cpu_percent.to_be_bytes());
    buf.extend_from_slice(&snapshot.total_ram_mb.to_be_bytes());
    buf.extend_from_slice(&snapshot.used_ram_mb.to_be_bytes());
    buf
}
pub fn decode_os(buf: &[u8]) -> Result<OsSnapshot, CodecError> {
    let mut rdr = unframe(buf, Some(OS_SNAPSHOT_SIZE))?;
    let cpu_percent = f64::from_be_bytes(read_be(&mut rdr)?);
    let total_ram_mb = u64::from_be_bytes(read_be(&mut rdr)?);
    let used_ram_mb = u64::from_be_bytes(read_be(&mut rdr)?);
    Ok(OsSnapshot {
        cpu_percent,
        total_ram_mb,
        used_ram_mb,
    })
}

pub fn encode_device(sample: &DeviceSample) -> Vec<u8> {
    let mut buf = Vec::with_capacity(LEN_PREFIX_SIZE + DEVICE_SAMPLE_SIZE);
    buf.extend_from_slice(&(DEVICE_SAMPLE_SIZE as u16).to_be_bytes());
    for channel in [sample.s1, sample.s2, sample.s3, sample.s4] {
        buf.extend_from_slice(&channel.to_be_bytes());
    }
    buf
}
pub fn decode_device(buf: &[u8]) -> Result<DeviceSample, CodecError> {
    let mut rdr = unframe(buf, Some(DEVICE_SAMPLE_SIZE))?;
    let mut channels = [0; 4];
    for channel in &mut channels {
        *channel = i32::from_be_bytes(read_be(&mut rdr)?);
    }
    Ok(DeviceSample::new(channels))
}

pub fn encode_config(config: &Config) -> Result<Vec<u8>, CodecError> {
    let text = config.last_access_time.as_bytes();
    let mut buf = Vec::with_capacity(LEN_PREFIX_SIZE + text.len());
    buf.extend_from_slice(&encode_len(text.len())?);
    buf.extend_from_slice(text);
    Ok(buf)
}
pub fn decode_config(buf: &[u8]) -> Result<Config, CodecError> {
    let payload = unframe(buf, None)?;
    let last_access_time = std::str::from_utf8(payload)
        .map_err(|_| CodecError::Utf8)?
        .to_owned();
    Ok(Config { last_access_time })
}
