use crate::takeoutsort_core::dates::{Provenance, ResolvedDate, from_unix_timestamp};
use crate::takeoutsort_core::error::{Result, TakeoutError};
use serde_json::Value;
use std::borrow::Cow;
use std::fs;
use std::path::Path;

/// A geographic point. `(0, 0)` is never constructed; the export uses it for "unknown".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Decoded sidecar record. Every field is optional and extracted independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataRecord {
    pub taken_at: Option<i64>,
    pub created_at: Option<i64>,
    pub geo: Option<GeoPoint>,
    pub people: Vec<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
}

impl MetadataRecord {
    /// Read and decode a record file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| TakeoutError::UnparseableRecord {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_bytes(&bytes).map_err(|e| TakeoutError::UnparseableRecord {
            path: path.to_path_buf(),
            reason: match e {
                TakeoutError::UnparseableRecord { reason, .. } => reason,
                other => other.to_string(),
            },
        })
    }

    /// Decode raw bytes (UTF-8, falling back to Latin-1) and extract the known fields.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = decode_text(bytes);
        let value: Value = serde_json::from_str(&text)?;
        if !value.is_object() {
            return Err(TakeoutError::UnparseableRecord {
                path: Default::default(),
                reason: "record is not a JSON object".to_string(),
            });
        }
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        MetadataRecord {
            taken_at: nested_timestamp(value, "photoTakenTime"),
            created_at: nested_timestamp(value, "creationTime"),
            geo: extract_geo(value),
            people: extract_people(value),
            description: extract_text(value, "description"),
            url: extract_text(value, "url"),
            title: extract_title(value),
        }
    }

    /// The primary capture time, else the creation time.
    pub fn timestamp(&self) -> Option<i64> {
        self.taken_at.or(self.created_at)
    }

    /// Record-based date resolution.
    pub fn resolved_date(&self) -> Option<ResolvedDate> {
        if let Some(at) = self.taken_at.and_then(from_unix_timestamp) {
            return Some(ResolvedDate::new(at, Provenance::RecordPrimary));
        }
        self.created_at
            .and_then(from_unix_timestamp)
            .map(|at| ResolvedDate::new(at, Provenance::RecordFallback))
    }
}

/// Decode record bytes as UTF-8, or as Latin-1 when that fails.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            log::debug!("Record is not valid UTF-8, decoding as Latin-1");
            encoding_rs::mem::decode_latin1(bytes)
        }
    }
}

/// Primary timestamp, else the fallback creation timestamp.
pub fn extract_timestamp(value: &Value) -> Option<i64> {
    nested_timestamp(value, "photoTakenTime").or_else(|| nested_timestamp(value, "creationTime"))
}

/// `{"<key>": {"timestamp": "1609459200"}}`; the timestamp may also be a number.
fn nested_timestamp(value: &Value, key: &str) -> Option<i64> {
    let raw = value.get(key)?.get("timestamp")?;
    let seconds = match raw {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    // Reject values that cannot be represented as a date.
    from_unix_timestamp(seconds).map(|_| seconds)
}

/// Helper to extract f64 from Value (handles both string and number)
fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn extract_geo(value: &Value) -> Option<GeoPoint> {
    let geo = value.get("geoData")?.as_object()?;
    let coordinate = |key: &str| match geo.get(key) {
        None | Some(Value::Null) => Some(0.0),
        Some(v) => value_to_f64(v),
    };

    let latitude = coordinate("latitude")?;
    let longitude = coordinate("longitude")?;
    let altitude = coordinate("altitude").unwrap_or(0.0);

    if latitude == 0.0 && longitude == 0.0 {
        return None;
    }
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }

    Some(GeoPoint {
        latitude,
        longitude,
        altitude: if altitude.is_finite() { altitude } else { 0.0 },
    })
}

pub fn extract_people(value: &Value) -> Vec<String> {
    let Some(people) = value.get("people").and_then(Value::as_array) else {
        return Vec::new();
    };

    people
        .iter()
        .filter_map(|p| p.get("name")?.as_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn extract_description(value: &Value) -> Option<String> {
    extract_text(value, "description")
}

pub fn extract_url(value: &Value) -> Option<String> {
    extract_text(value, "url")
}

/// The original media filename the record was written for.
pub fn extract_title(value: &Value) -> Option<String> {
    extract_text(value, "title")
}

fn extract_text(value: &Value, key: &str) -> Option<String> {
    let text = value.get(key)?.as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
