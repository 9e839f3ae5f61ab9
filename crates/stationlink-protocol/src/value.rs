use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::ser::{Serialize, SerializeSeq, Serializer};

/// One decoded telemetry field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(u64),
    /// Integer scaled to engineering units, or a raw IEEE float.
    Float(f64),
    Duration(Duration),
    Text(String),
    Bytes(Vec<u8>),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of integer and float fields.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Duration(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Duration(v) => write!(f, "{}s", v.as_secs()),
            Self::Text(v) => f.write_str(v),
            Self::Bytes(v) => write!(f, "{v:?}"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Int(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            // Seconds keep JSON dumps readable.
            Self::Duration(v) => serializer.serialize_u64(v.as_secs()),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Bytes(v) => {
                let mut seq = serializer.serialize_seq(Some(v.len()))?;
                for byte in v {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
        }
    }
}

/// Named fields decoded from one telemetry payload.
///
/// Snapshots are immutable once produced; a newer snapshot replaces the
/// previous one for its channel.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    fields: BTreeMap<String, FieldValue>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(FieldValue::as_u64)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_f64)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, FieldValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (K, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let snap: Snapshot = [
            ("battery_level", FieldValue::Int(87)),
            ("voltage", FieldValue::Float(12.5)),
            ("pd_version", FieldValue::Text("1.0.2.3".into())),
        ]
        .into_iter()
        .collect();

        assert_eq!(snap.u64("battery_level"), Some(87));
        assert_eq!(snap.f64("battery_level"), Some(87.0));
        assert_eq!(snap.f64("voltage"), Some(12.5));
        assert_eq!(snap.text("pd_version"), Some("1.0.2.3"));
        assert_eq!(snap.u64("voltage"), None);
        assert_eq!(snap.len(), 3);
    }

    #[test]
    fn serializes_as_flat_object() {
        let snap: Snapshot = [
            ("remain", FieldValue::Duration(Duration::from_secs(600))),
            ("color", FieldValue::Bytes(vec![1, 2, 255])),
            ("model", FieldValue::Int(2)),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"remain": 600, "color": [1, 2, 255], "model": 2})
        );
    }

    #[test]
    fn display_values() {
        assert_eq!(FieldValue::Int(5).to_string(), "5");
        assert_eq!(
            FieldValue::Duration(Duration::from_secs(90)).to_string(),
            "90s"
        );
        assert_eq!(FieldValue::Bytes(vec![1, 2]).to_string(), "[1, 2]");
    }
}
