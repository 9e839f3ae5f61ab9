//! Table-driven payload decoding.
//!
//! Telemetry payloads are packed little-endian records. A layout is a list of
//! [`Field`]s read back to back; decoding stops as soon as the payload is
//! exhausted, so older firmware that sends shorter records still yields the
//! leading fields.

use std::time::Duration;

use crate::value::{FieldValue, Snapshot};

/// How a field's bytes turn into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decode {
    /// Little-endian unsigned integer.
    Int,
    /// Little-endian unsigned integer divided by a scale.
    Scaled(u32),
    /// Little-endian IEEE-754 single.
    Float,
    /// Bytes in reverse order joined by dots (`[3, 2, 0, 1]` -> `1.0.2.3`).
    Version,
    /// Little-endian integer count of minutes.
    Minutes,
    /// Little-endian integer count of seconds.
    Seconds,
    /// UTF-8 text, trailing NULs trimmed.
    Text,
    /// Space-separated hex dump of an unknown region.
    Hex,
    /// Raw byte list.
    Raw,
    /// Reserved bytes, not reported.
    Skip,
}

/// One field of a packed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub size: usize,
    pub decode: Decode,
}

impl Field {
    pub const fn int(name: &'static str, size: usize) -> Self {
        Self::new(name, size, Decode::Int)
    }

    pub const fn scaled(name: &'static str, size: usize, scale: u32) -> Self {
        Self::new(name, size, Decode::Scaled(scale))
    }

    pub const fn float(name: &'static str) -> Self {
        Self::new(name, 4, Decode::Float)
    }

    pub const fn version(name: &'static str) -> Self {
        Self::new(name, 4, Decode::Version)
    }

    pub const fn minutes(name: &'static str) -> Self {
        Self::new(name, 4, Decode::Minutes)
    }

    pub const fn seconds(name: &'static str) -> Self {
        Self::new(name, 4, Decode::Seconds)
    }

    pub const fn text(name: &'static str, size: usize) -> Self {
        Self::new(name, size, Decode::Text)
    }

    pub const fn hex(name: &'static str, size: usize) -> Self {
        Self::new(name, size, Decode::Hex)
    }

    pub const fn raw(name: &'static str, size: usize) -> Self {
        Self::new(name, size, Decode::Raw)
    }

    pub const fn skip(size: usize) -> Self {
        Self::new("", size, Decode::Skip)
    }

    const fn new(name: &'static str, size: usize, decode: Decode) -> Self {
        Self { name, size, decode }
    }

    /// Decode this field from `bytes`, which may be shorter than `size` for
    /// the last field of a truncated payload.
    fn decode(&self, bytes: &[u8]) -> Option<FieldValue> {
        if bytes.is_empty() {
            return None;
        }
        let complete = bytes.len() == self.size;
        match self.decode {
            Decode::Int => Some(FieldValue::Int(le_uint(bytes))),
            Decode::Scaled(scale) => Some(FieldValue::Float(
                le_uint(bytes) as f64 / f64::from(scale.max(1)),
            )),
            Decode::Float => {
                let raw: [u8; 4] = bytes.try_into().ok()?;
                Some(FieldValue::Float(f64::from(f32::from_le_bytes(raw))))
            }
            Decode::Version => Some(FieldValue::Text(
                bytes
                    .iter()
                    .rev()
                    .map(u8::to_string)
                    .collect::<Vec<_>>()
                    .join("."),
            )),
            Decode::Minutes => Some(FieldValue::Duration(Duration::from_secs(
                le_uint(bytes).saturating_mul(60),
            ))),
            Decode::Seconds => Some(FieldValue::Duration(Duration::from_secs(le_uint(bytes)))),
            Decode::Text if complete => std::str::from_utf8(bytes)
                .ok()
                .map(|s| FieldValue::Text(s.trim_end_matches('\0').to_string())),
            Decode::Text => None,
            Decode::Hex => Some(FieldValue::Text(
                bytes
                    .iter()
                    .map(|b| format!("0x{b:02x}"))
                    .collect::<Vec<_>>()
                    .join(" "),
            )),
            Decode::Raw => Some(FieldValue::Bytes(bytes.to_vec())),
            Decode::Skip => None,
        }
    }
}

/// Little-endian unsigned integer of up to eight bytes.
pub fn le_uint(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .take(8)
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

/// Decode `payload` against `layout`.
pub fn parse_fields(payload: &[u8], layout: &[Field]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    let mut offset = 0usize;

    for field in layout {
        if offset >= payload.len() {
            break;
        }
        let end = (offset + field.size).min(payload.len());
        if let Some(value) = field.decode(&payload[offset..end]) {
            snapshot.insert(field.name, value);
        }
        offset += field.size;
    }

    snapshot
}
